//! gsc-core: Core library for the gsc cloud storage CLI
//!
//! This crate provides the SDK-independent parts of gsc:
//! - Resource locators for `gs://`, `s3://` and local paths
//! - Wildcard pattern compilation
//! - Listing adapters over the local filesystem and remote buckets
//! - The wildcard expansion engine
//! - Multi-source resolution and `cp`-style destination naming
//! - Configuration and provider management
//! - The ObjectStore trait implemented by storage adapters

pub mod config;
pub mod error;
pub mod expand;
pub mod listing;
pub mod locator;
pub mod pattern;
pub mod provider;
pub mod resolve;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::{Config, ConfigManager};
pub use error::{Error, Result};
pub use expand::{Expander, Expansion, ExpansionRequest, MatchedResource, ResultType};
pub use listing::{ListMode, Lister, LocalLister, RemoteLister};
pub use locator::{Provider, ResourceLocator};
pub use pattern::Matcher;
pub use provider::{ProviderConfig, ProviderManager};
pub use resolve::{
    Destination, NamingDecision, Resolution, ResolvedSource, Resolver, SourceRoot,
};
pub use traits::{
    AccessControlPolicy, CANNED_ACLS, Grant, ListOptions, ListResult, ObjectInfo, ObjectStore,
    StoreRegistry,
};
