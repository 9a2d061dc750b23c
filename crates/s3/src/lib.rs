//! gsc-s3: storage adapter for the gsc CLI
//!
//! This crate provides the implementation of the ObjectStore trait
//! using the aws-sdk-s3 crate. It is the only crate that directly
//! depends on the AWS SDK.

pub mod client;

use std::sync::Arc;

use gsc_core::{Config, Result, StoreRegistry};

pub use client::S3Client;

/// Build one client per configured provider
pub async fn connect(config: &Config) -> Result<StoreRegistry> {
    let mut registry = StoreRegistry::new();
    for entry in &config.providers {
        let provider = entry.provider;
        let client = S3Client::new(entry.clone()).await?;
        registry.insert(provider, Arc::new(client));
    }
    Ok(registry)
}
