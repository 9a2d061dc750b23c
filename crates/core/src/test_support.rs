//! In-memory object store for engine tests

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use jiff::Timestamp;

use crate::error::{Error, Result};
use crate::traits::{AccessControlPolicy, Grant, ListOptions, ListResult, ObjectInfo, ObjectStore};

/// A recorded `list_objects` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListCall {
    pub bucket: String,
    pub prefix: String,
    pub delimiter: Option<String>,
}

/// Buckets of objects held in memory, with every listing call recorded
#[derive(Default)]
pub struct MemoryStore {
    buckets: Mutex<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
    acls: Mutex<BTreeMap<String, String>>,
    calls: Mutex<Vec<ListCall>>,
    page_size: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split listings into pages of `size` entries
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn with_bucket(self, bucket: &str) -> Self {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default();
        self
    }

    pub fn with_object(self, bucket: &str, key: &str, data: &[u8]) -> Self {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.to_vec());
        self
    }

    pub fn calls(&self) -> Vec<ListCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn listed_prefixes(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.prefix).collect()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.buckets.lock().unwrap().get(bucket)?.get(key).cloned()
    }

    fn info(key: &str, data: &[u8]) -> ObjectInfo {
        ObjectInfo::file(key, data.len() as u64).with_last_modified(Timestamp::UNIX_EPOCH)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_buckets(&self) -> Result<Vec<ObjectInfo>> {
        Ok(self
            .buckets
            .lock()
            .unwrap()
            .keys()
            .map(ObjectInfo::bucket)
            .collect())
    }

    async fn list_objects(&self, bucket: &str, options: ListOptions) -> Result<ListResult> {
        let prefix = options.prefix.clone().unwrap_or_default();
        if options.continuation_token.is_none() {
            self.calls.lock().unwrap().push(ListCall {
                bucket: bucket.to_string(),
                prefix: prefix.clone(),
                delimiter: options.delimiter.clone(),
            });
        }

        let buckets = self.buckets.lock().unwrap();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| Error::NotFound(format!("Bucket not found: {bucket}")))?;

        let mut entries: BTreeMap<String, ObjectInfo> = BTreeMap::new();
        for (key, data) in objects.range(prefix.clone()..) {
            let Some(rest) = key.strip_prefix(&prefix) else {
                break;
            };
            match options.delimiter.as_deref().and_then(|d| rest.find(d).map(|p| (d, p))) {
                Some((d, pos)) => {
                    let common = format!("{prefix}{}{d}", &rest[..pos]);
                    entries.entry(common.clone()).or_insert_with(|| ObjectInfo::dir(common));
                }
                None => {
                    entries.insert(key.clone(), Self::info(key, data));
                }
            }
        }

        let start: usize = options
            .continuation_token
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or(0);
        let page = self
            .page_size
            .or(options.max_keys.map(|m| m as usize))
            .unwrap_or(usize::MAX);
        let all: Vec<ObjectInfo> = entries.into_values().collect();
        let end = start.saturating_add(page).min(all.len());
        let truncated = end < all.len();

        Ok(ListResult {
            items: all[start.min(end)..end].to_vec(),
            truncated,
            continuation_token: truncated.then(|| end.to_string()),
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        self.object(bucket, key)
            .map(|data| Self::info(key, &data))
            .ok_or_else(|| Error::NotFound(format!("{bucket}/{key}")))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.object(bucket, key)
            .ok_or_else(|| Error::NotFound(format!("{bucket}/{key}")))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        _content_type: Option<String>,
    ) -> Result<ObjectInfo> {
        let info = Self::info(key, &data);
        let mut buckets = self.buckets.lock().unwrap();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::NotFound(format!("Bucket not found: {bucket}")))?;
        objects.insert(key.to_string(), data);
        Ok(info)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.buckets
            .lock()
            .unwrap()
            .get_mut(bucket)
            .and_then(|objects| objects.remove(key))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("{bucket}/{key}")))
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<ObjectInfo> {
        let data = self.get_object(src_bucket, src_key).await?;
        self.put_object(dst_bucket, dst_key, data, None).await
    }

    async fn get_bucket_acl(&self, bucket: &str) -> Result<AccessControlPolicy> {
        let canned = self.acls.lock().unwrap().get(bucket).cloned();
        Ok(policy(canned))
    }

    async fn set_bucket_acl(&self, bucket: &str, canned: &str) -> Result<()> {
        self.acls
            .lock()
            .unwrap()
            .insert(bucket.to_string(), canned.to_string());
        Ok(())
    }

    async fn get_object_acl(&self, bucket: &str, key: &str) -> Result<AccessControlPolicy> {
        let canned = self.acls.lock().unwrap().get(&format!("{bucket}/{key}")).cloned();
        Ok(policy(canned))
    }

    async fn set_object_acl(&self, bucket: &str, key: &str, canned: &str) -> Result<()> {
        self.acls
            .lock()
            .unwrap()
            .insert(format!("{bucket}/{key}"), canned.to_string());
        Ok(())
    }
}

fn policy(canned: Option<String>) -> AccessControlPolicy {
    AccessControlPolicy {
        owner: Some("owner".to_string()),
        grants: vec![Grant {
            grantee: canned.unwrap_or_else(|| "private".to_string()),
            permission: "FULL_CONTROL".to_string(),
        }],
    }
}
