//! ObjectStore trait definition
//!
//! This trait defines the transport contract for cloud storage operations.
//! It keeps the expansion engine and the CLI decoupled from any SDK.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::locator::Provider;

/// Metadata for an object, a common prefix, or a bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object key, prefix (ending in `/`), or bucket name
    pub key: String,

    /// Size in bytes (None for buckets and prefixes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,

    /// Human-readable size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_human: Option<String>,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,

    /// ETag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Storage class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,

    /// Content type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Whether this is a common prefix or bucket
    pub is_dir: bool,
}

impl ObjectInfo {
    /// Create a new ObjectInfo for an object
    pub fn file(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size_bytes: Some(size),
            size_human: Some(humansize::format_size(size, humansize::BINARY)),
            last_modified: None,
            etag: None,
            storage_class: None,
            content_type: None,
            is_dir: false,
        }
    }

    /// Create a new ObjectInfo for a common prefix
    pub fn dir(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size_bytes: None,
            size_human: None,
            last_modified: None,
            etag: None,
            storage_class: None,
            content_type: None,
            is_dir: true,
        }
    }

    /// Create a new ObjectInfo for a bucket
    pub fn bucket(name: impl Into<String>) -> Self {
        Self::dir(name)
    }

    /// Attach a modification time
    pub fn with_last_modified(mut self, ts: Timestamp) -> Self {
        self.last_modified = Some(ts);
        self
    }
}

/// One page of a list operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListResult {
    /// Objects and common prefixes on this page
    pub items: Vec<ObjectInfo>,

    /// Whether more pages follow
    pub truncated: bool,

    /// Continuation token for the next page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

/// Options for list operations
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Maximum number of keys to return per request
    pub max_keys: Option<i32>,

    /// Delimiter for grouping; `None` lists the whole subtree flat
    pub delimiter: Option<String>,

    /// Prefix to filter by
    pub prefix: Option<String>,

    /// Continuation token for pagination
    pub continuation_token: Option<String>,
}

/// Canned ACLs understood by both GCS interop and S3
pub const CANNED_ACLS: &[&str] = &[
    "private",
    "public-read",
    "public-read-write",
    "authenticated-read",
    "bucket-owner-read",
    "bucket-owner-full-control",
];

/// One grant in an access control policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Grantee id, email, or group URI
    pub grantee: String,

    /// Permission such as `READ` or `FULL_CONTROL`
    pub permission: String,
}

/// Access control policy of a bucket or object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlPolicy {
    /// Owner id or display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Grants in service order
    pub grants: Vec<Grant>,
}

/// Transport operations for one storage provider
///
/// Implemented by the S3 adapter; mocked or replaced by an in-memory store
/// in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List buckets visible to the credentials
    async fn list_buckets(&self) -> Result<Vec<ObjectInfo>>;

    /// List one page of objects in a bucket
    async fn list_objects(&self, bucket: &str, options: ListOptions) -> Result<ListResult>;

    /// Get object metadata
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo>;

    /// Get object content as bytes
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Upload object content
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<ObjectInfo>;

    /// Delete an object
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Server-side copy within this provider
    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<ObjectInfo>;

    /// Get a bucket's ACL
    async fn get_bucket_acl(&self, bucket: &str) -> Result<AccessControlPolicy>;

    /// Apply a canned ACL to a bucket
    async fn set_bucket_acl(&self, bucket: &str, canned: &str) -> Result<()>;

    /// Get an object's ACL
    async fn get_object_acl(&self, bucket: &str, key: &str) -> Result<AccessControlPolicy>;

    /// Apply a canned ACL to an object
    async fn set_object_acl(&self, bucket: &str, key: &str, canned: &str) -> Result<()>;
}

/// Stores keyed by URL scheme
#[derive(Clone, Default)]
pub struct StoreRegistry {
    stores: HashMap<Provider, Arc<dyn ObjectStore>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the store serving a provider, replacing any previous one
    pub fn insert(&mut self, provider: Provider, store: Arc<dyn ObjectStore>) {
        self.stores.insert(provider, store);
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, provider: Provider, store: Arc<dyn ObjectStore>) -> Self {
        self.insert(provider, store);
        self
    }

    /// Store for a provider
    pub fn get(&self, provider: Provider) -> Result<Arc<dyn ObjectStore>> {
        self.stores
            .get(&provider)
            .cloned()
            .ok_or_else(|| Error::ProviderNotFound(provider.to_string()))
    }

    pub fn contains(&self, provider: Provider) -> bool {
        self.stores.contains_key(&provider)
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("providers", &self.stores.keys().collect::<Vec<_>>())
            .finish()
    }
}
