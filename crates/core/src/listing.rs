//! Namespace listing adapters
//!
//! Both adapters answer the same question: given a literal prefix, which
//! leaves and which containers sit directly under it (or, in flat mode,
//! anywhere under it). Containers are always reported with a trailing `/`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;

use crate::error::{Error, Result};
use crate::locator::DELIMITER;
use crate::traits::{ListOptions, ObjectStore};

/// How far below the prefix a listing reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// One level; deeper entries are folded into common prefixes
    Delimited,
    /// The whole subtree, no common prefixes
    Flat,
}

/// A leaf entry returned by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedLeaf {
    pub name: String,
    pub size: Option<u64>,
    pub last_modified: Option<Timestamp>,
}

/// Result of one listing call
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub leaves: Vec<ListedLeaf>,
    /// Container names, each ending in `/`
    pub prefixes: Vec<String>,
}

/// Lists a namespace by literal prefix
#[async_trait]
pub trait Lister: Send + Sync {
    async fn list(&self, prefix: &str, mode: ListMode) -> Result<Listing>;

    /// Whether [`ListMode::Flat`] is served in one call
    fn supports_flat_listing(&self) -> bool;
}

/// Lister over one bucket of an [`ObjectStore`]
pub struct RemoteLister {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl RemoteLister {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl Lister for RemoteLister {
    async fn list(&self, prefix: &str, mode: ListMode) -> Result<Listing> {
        let delimiter = match mode {
            ListMode::Delimited => Some(DELIMITER.to_string()),
            ListMode::Flat => None,
        };
        tracing::debug!(
            bucket = %self.bucket,
            prefix,
            delimiter = ?delimiter,
            "listing objects"
        );

        let mut listing = Listing::default();
        let mut continuation_token = None;
        loop {
            let options = ListOptions {
                prefix: (!prefix.is_empty()).then(|| prefix.to_string()),
                delimiter: delimiter.clone(),
                continuation_token,
                ..Default::default()
            };
            let page = self.store.list_objects(&self.bucket, options).await?;

            for item in page.items {
                if item.is_dir {
                    listing.prefixes.push(item.key);
                } else {
                    listing.leaves.push(ListedLeaf {
                        name: item.key,
                        size: item.size_bytes,
                        last_modified: item.last_modified,
                    });
                }
            }

            if !page.truncated {
                break;
            }
            continuation_token = page.continuation_token;
            if continuation_token.is_none() {
                break;
            }
        }
        Ok(listing)
    }

    fn supports_flat_listing(&self) -> bool {
        true
    }
}

/// Lister over the local filesystem.
///
/// A prefix `a/b/c` lists directory `a/b/` and keeps the entries whose full
/// path starts with `a/b/c`. An empty directory part lists `.`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalLister;

#[async_trait]
impl Lister for LocalLister {
    async fn list(&self, prefix: &str, mode: ListMode) -> Result<Listing> {
        if mode == ListMode::Flat {
            return Err(Error::UnsupportedFeature(
                "flat listing of a local directory".into(),
            ));
        }

        let dir_part = match prefix.rfind(DELIMITER) {
            Some(pos) => &prefix[..=pos],
            None => "",
        };
        let dir = if dir_part.is_empty() { "." } else { dir_part };
        tracing::debug!(dir, prefix, "listing directory");

        let mut reader = match tokio::fs::read_dir(dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("Directory not found: {dir}")));
            }
            Err(e) => return Err(e.into()),
        };

        let mut listing = Listing::default();
        while let Some(entry) = reader.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let full = format!("{dir_part}{file_name}");
            if !full.starts_with(prefix) {
                continue;
            }

            // follows symlinks; dangling links are reported as leaves
            let metadata = match tokio::fs::metadata(entry.path()).await {
                Ok(metadata) => Some(metadata),
                Err(_) => entry.metadata().await.ok(),
            };
            match metadata {
                Some(m) if m.is_dir() => listing.prefixes.push(format!("{full}/")),
                other => listing.leaves.push(ListedLeaf {
                    name: full,
                    size: other.as_ref().map(|m| m.len()),
                    last_modified: other.as_ref().and_then(modified),
                }),
            }
        }

        listing.leaves.sort_by(|a, b| a.name.cmp(&b.name));
        listing.prefixes.sort();
        Ok(listing)
    }

    fn supports_flat_listing(&self) -> bool {
        false
    }
}

/// Best-effort stat of a single local path
pub async fn stat_local(path: &str) -> Option<ListedLeaf> {
    let metadata = tokio::fs::metadata(Path::new(path)).await.ok()?;
    Some(ListedLeaf {
        name: path.to_string(),
        size: Some(metadata.len()),
        last_modified: modified(&metadata),
    })
}

fn modified(metadata: &std::fs::Metadata) -> Option<Timestamp> {
    let time = metadata.modified().ok()?;
    Timestamp::try_from(time).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryStore;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f0"), b"0").unwrap();
        std::fs::write(dir.path().join("abc"), b"abc").unwrap();
        std::fs::create_dir_all(dir.path().join("dir0/dir1")).unwrap();
        std::fs::write(dir.path().join("dir0/f1"), b"1").unwrap();
        dir
    }

    fn root(dir: &tempfile::TempDir) -> String {
        format!("{}/", dir.path().display())
    }

    #[tokio::test]
    async fn test_local_lists_one_level() {
        let dir = tree();
        let base = root(&dir);
        let listing = LocalLister.list(&base, ListMode::Delimited).await.unwrap();

        let leaves: Vec<_> = listing.leaves.iter().map(|l| l.name.clone()).collect();
        assert_eq!(leaves, vec![format!("{base}abc"), format!("{base}f0")]);
        assert_eq!(listing.prefixes, vec![format!("{base}dir0/")]);
        assert_eq!(listing.leaves[0].size, Some(3));
        assert!(listing.leaves[0].last_modified.is_some());
    }

    #[tokio::test]
    async fn test_local_filters_by_partial_name() {
        let dir = tree();
        let base = root(&dir);
        let listing = LocalLister
            .list(&format!("{base}d"), ListMode::Delimited)
            .await
            .unwrap();
        assert!(listing.leaves.is_empty());
        assert_eq!(listing.prefixes, vec![format!("{base}dir0/")]);
    }

    #[tokio::test]
    async fn test_local_empty_dir_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let listing = LocalLister.list(&root(&dir), ListMode::Delimited).await.unwrap();
        assert!(listing.leaves.is_empty());
        assert!(listing.prefixes.is_empty());
    }

    #[tokio::test]
    async fn test_local_missing_dir_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = format!("{}missing/", root(&dir));
        let result = LocalLister.list(&missing, ListMode::Delimited).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_local_flat_is_unsupported() {
        let result = LocalLister.list("x/", ListMode::Flat).await;
        assert!(matches!(result, Err(Error::UnsupportedFeature(_))));
        assert!(!LocalLister.supports_flat_listing());
    }

    #[tokio::test]
    async fn test_remote_splits_leaves_and_prefixes() {
        let store = Arc::new(
            MemoryStore::new()
                .with_object("b", "a/f1", b"1")
                .with_object("b", "a/sub/f2", b"22")
                .with_object("b", "other", b""),
        );
        let lister = RemoteLister::new(store.clone(), "b");
        let listing = lister.list("a/", ListMode::Delimited).await.unwrap();

        assert_eq!(listing.leaves.len(), 1);
        assert_eq!(listing.leaves[0].name, "a/f1");
        assert_eq!(listing.leaves[0].size, Some(1));
        assert_eq!(listing.prefixes, vec!["a/sub/".to_string()]);
        assert_eq!(store.listed_prefixes(), vec!["a/".to_string()]);
    }

    #[tokio::test]
    async fn test_remote_drains_pages_in_one_logical_call() {
        let mut store = MemoryStore::new().with_page_size(1);
        for i in 0..5 {
            store = store.with_object("b", &format!("k{i}"), b"x");
        }
        let store = Arc::new(store);
        let lister = RemoteLister::new(store.clone(), "b");
        let listing = lister.list("", ListMode::Flat).await.unwrap();

        assert_eq!(listing.leaves.len(), 5);
        assert_eq!(store.calls().len(), 1);
        assert_eq!(store.calls()[0].delimiter, None);
    }

    #[tokio::test]
    async fn test_remote_propagates_transient_errors() {
        let mut mock = crate::traits::MockObjectStore::new();
        mock.expect_list_objects()
            .times(1)
            .returning(|_, _| Err(Error::Network("connection reset".into())));
        let lister = RemoteLister::new(Arc::new(mock), "b");

        let result = lister.list("x/", ListMode::Delimited).await;
        assert!(matches!(result, Err(e) if e.is_retryable()));
    }
}
