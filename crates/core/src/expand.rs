//! Wildcard expansion engine
//!
//! Turns one pattern (local or cloud, possibly wildcarded, possibly naming a
//! container) into a lazy sequence of concrete resources. Work is kept on an
//! explicit stack of literal-prefix/remaining-pattern items; each item costs
//! at most one listing call, and subtrees whose names cannot satisfy the next
//! bounded segment are never listed.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::Stream;
use jiff::Timestamp;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::listing::{ListMode, ListedLeaf, Lister, Listing, LocalLister, RemoteLister, stat_local};
use crate::locator::{DELIMITER, Provider, ResourceLocator, contains_wildcard, strip_one_slash};
use crate::pattern::{Matcher, literal_prefix};
use crate::traits::StoreRegistry;

/// Which kinds of resources an expansion yields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultType {
    /// Files and objects only
    #[default]
    LeavesOnly,
    /// Leaves plus directories, common prefixes and buckets
    All,
}

/// One call into the engine
#[derive(Debug, Clone)]
pub struct ExpansionRequest {
    pub pattern: String,
    pub result_type: ResultType,
    /// Expand a bare container name as `container/**`
    pub recursive_containers: bool,
}

impl ExpansionRequest {
    /// Leaves-only, non-recursive request
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            result_type: ResultType::LeavesOnly,
            recursive_containers: false,
        }
    }

    pub fn with_result_type(mut self, result_type: ResultType) -> Self {
        self.result_type = result_type;
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive_containers = recursive;
        self
    }
}

/// One concrete result of an expansion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedResource {
    #[serde(rename = "url", serialize_with = "serialize_locator")]
    pub locator: ResourceLocator,
    pub is_container: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,
    /// Concrete container whose expansion produced this match
    #[serde(skip)]
    pub container_root: Option<ResourceLocator>,
}

fn serialize_locator<S: serde::Serializer>(
    locator: &ResourceLocator,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(locator)
}

impl MatchedResource {
    /// A leaf with no metadata attached
    pub fn literal(locator: ResourceLocator) -> Self {
        Self {
            locator,
            is_container: false,
            size: None,
            last_modified: None,
            container_root: None,
        }
    }

    /// Produced by expanding a container into its contents
    pub fn expanded_from_container(&self) -> bool {
        self.container_root.is_some()
    }

    /// A directory, common prefix or bucket
    pub fn container(locator: ResourceLocator) -> Self {
        Self {
            is_container: true,
            ..Self::literal(locator)
        }
    }

    fn leaf(
        locator: ResourceLocator,
        leaf: &ListedLeaf,
        from_container: &Option<ResourceLocator>,
    ) -> Self {
        Self {
            locator,
            is_container: false,
            size: leaf.size,
            last_modified: leaf.last_modified,
            container_root: from_container.clone(),
        }
    }
}

/// Namespace a work item lists in
#[derive(Debug, Clone)]
enum Target {
    Local,
    Cloud { provider: Provider, bucket: String },
}

impl Target {
    fn locator(&self, name: impl Into<String>) -> ResourceLocator {
        match self {
            Target::Local => ResourceLocator::local(name),
            Target::Cloud { provider, bucket } => {
                ResourceLocator::cloud(*provider, bucket.clone(), name)
            }
        }
    }
}

#[derive(Debug)]
enum WorkItem {
    /// A locator whose bucket is concrete, not yet planned
    Root(ResourceLocator),
    /// Expand a wildcarded bucket name with one bucket listing
    Buckets(ResourceLocator),
    /// Match a full path pattern under a target
    Pattern {
        target: Target,
        pattern: String,
        from_container: Option<ResourceLocator>,
    },
    /// Walk every level under a prefix, matching leaves against a `**` pattern
    Recursive {
        target: Target,
        list_prefix: String,
        matcher: Arc<Matcher>,
        from_container: Option<ResourceLocator>,
    },
}

/// Builds expansions against a set of stores
#[derive(Debug, Clone)]
pub struct Expander {
    stores: StoreRegistry,
}

impl Expander {
    pub fn new(stores: StoreRegistry) -> Self {
        Self { stores }
    }

    pub fn stores(&self) -> &StoreRegistry {
        &self.stores
    }

    /// Start an expansion.
    ///
    /// Parsing, wildcard validation and the leaves-only-on-a-bucket check
    /// happen here, before any listing call.
    pub fn expand(&self, request: ExpansionRequest) -> Result<Expansion> {
        let root = ResourceLocator::parse(&request.pattern)?;

        if let Some(provider) = root.provider() {
            self.stores.get(provider)?;
        }
        if root.is_bucket()
            && request.result_type == ResultType::LeavesOnly
            && !request.recursive_containers
        {
            return Err(Error::InvalidResultType(format!(
                "{} names a bucket; listing leaves requires a wildcard or recursion",
                request.pattern
            )));
        }
        if let Some(bucket) = root.bucket().filter(|b| contains_wildcard(b)) {
            Matcher::compile(bucket)?;
        }
        if contains_wildcard(root.path()) {
            Matcher::compile(root.path())?;
        }

        let first = if root.bucket().is_some_and(contains_wildcard) {
            WorkItem::Buckets(root)
        } else {
            WorkItem::Root(root)
        };

        Ok(Expansion {
            stores: self.stores.clone(),
            request,
            work: vec![first],
            ready: VecDeque::new(),
            yielded: 0,
            listings: 0,
            finished: false,
        })
    }
}

/// Lazy cursor over the results of one expansion.
///
/// Not resumable after an error: the first error ends the sequence.
pub struct Expansion {
    stores: StoreRegistry,
    request: ExpansionRequest,
    work: Vec<WorkItem>,
    ready: VecDeque<MatchedResource>,
    yielded: usize,
    listings: usize,
    finished: bool,
}

impl Expansion {
    /// The request this expansion serves
    pub fn request(&self) -> &ExpansionRequest {
        &self.request
    }

    /// Next match, `Ok(None)` once exhausted.
    ///
    /// An expansion that yields nothing reports [`Error::NoMatches`] once.
    pub async fn next(&mut self) -> Result<Option<MatchedResource>> {
        loop {
            if let Some(matched) = self.ready.pop_front() {
                self.yielded += 1;
                return Ok(Some(matched));
            }
            if self.finished {
                return Ok(None);
            }
            let Some(item) = self.work.pop() else {
                self.finished = true;
                if self.yielded == 0 {
                    return Err(Error::NoMatches(self.request.pattern.clone()));
                }
                return Ok(None);
            };
            if let Err(e) = self.process(item).await {
                self.finished = true;
                self.work.clear();
                self.ready.clear();
                return Err(e);
            }
        }
    }

    /// Drain the expansion into a vector
    pub async fn try_collect(mut self) -> Result<Vec<MatchedResource>> {
        let mut matches = Vec::new();
        while let Some(matched) = self.next().await? {
            matches.push(matched);
        }
        Ok(matches)
    }

    /// Expose the cursor as a stream for a single consumer
    pub fn into_stream(self) -> impl Stream<Item = Result<MatchedResource>> + Send {
        futures::stream::unfold(Some(self), |state| async move {
            let mut expansion = state?;
            match expansion.next().await {
                Ok(Some(matched)) => Some((Ok(matched), Some(expansion))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    async fn process(&mut self, item: WorkItem) -> Result<()> {
        match item {
            WorkItem::Root(root) => self.plan_root(root).await,
            WorkItem::Buckets(template) => self.expand_buckets(template).await,
            WorkItem::Pattern {
                target,
                pattern,
                from_container,
            } => self.expand_pattern(target, pattern, from_container).await,
            WorkItem::Recursive {
                target,
                list_prefix,
                matcher,
                from_container,
            } => {
                let listing = self.list(&target, &list_prefix, ListMode::Delimited).await?;
                for leaf in &listing.leaves {
                    if matcher.is_match(&leaf.name) {
                        let locator = target.locator(leaf.name.clone());
                        self.ready
                            .push_back(MatchedResource::leaf(locator, leaf, &from_container));
                    }
                }
                for prefix in listing.prefixes.into_iter().rev() {
                    self.work.push(WorkItem::Recursive {
                        target: target.clone(),
                        list_prefix: prefix,
                        matcher: matcher.clone(),
                        from_container: from_container.clone(),
                    });
                }
                Ok(())
            }
        }
    }

    async fn plan_root(&mut self, root: ResourceLocator) -> Result<()> {
        let target = match root.provider() {
            Some(provider) => Target::Cloud {
                provider,
                bucket: root.bucket().unwrap_or_default().to_string(),
            },
            None => Target::Local,
        };

        if root.has_wildcard() {
            self.work.push(WorkItem::Pattern {
                target,
                pattern: strip_one_slash(root.path()).to_string(),
                from_container: None,
            });
            return Ok(());
        }

        if !root.names_container() {
            let mut matched = MatchedResource::literal(root);
            if matched.locator.is_local()
                && let Some(stat) = stat_local(matched.locator.path()).await
            {
                matched.size = stat.size;
                matched.last_modified = stat.last_modified;
            }
            self.ready.push_back(matched);
            return Ok(());
        }

        if self.request.recursive_containers {
            self.work.push(WorkItem::Pattern {
                target,
                pattern: recursive_pattern(strip_one_slash(root.path())),
                from_container: Some(root),
            });
        } else if self.request.result_type == ResultType::All {
            self.ready.push_back(MatchedResource::container(root));
        } else {
            tracing::warn!("Omitting container {root} (recursion not requested)");
        }
        Ok(())
    }

    async fn expand_buckets(&mut self, template: ResourceLocator) -> Result<()> {
        let (Some(provider), Some(pattern)) = (template.provider(), template.bucket()) else {
            return Err(Error::General(format!("{template} has no bucket")));
        };
        let matcher = Matcher::compile(pattern)?;
        let store = self.stores.get(provider)?;
        tracing::debug!(%provider, pattern, "listing buckets");

        let buckets = store.list_buckets().await?;
        let roots: Vec<ResourceLocator> = buckets
            .into_iter()
            .filter(|b| matcher.is_match(&b.key))
            .map(|b| template.with_bucket(b.key))
            .collect();
        for root in roots.into_iter().rev() {
            self.work.push(WorkItem::Root(root));
        }
        Ok(())
    }

    async fn expand_pattern(
        &mut self,
        target: Target,
        pattern: String,
        from_container: Option<ResourceLocator>,
    ) -> Result<()> {
        let literal = literal_prefix(&pattern);

        if literal.len() == pattern.len() {
            return self.resolve_literal(target, pattern, from_container).await;
        }

        let seg_start = literal.rfind(DELIMITER).map_or(0, |p| p + 1);
        let seg_end = pattern[seg_start..]
            .find(DELIMITER)
            .map_or(pattern.len(), |p| seg_start + p);
        let segment = &pattern[seg_start..seg_end];

        if segment.contains("**") {
            let matcher = Matcher::compile(&pattern)?;
            if self.lister(&target)?.supports_flat_listing() {
                let listing = self.list(&target, literal, ListMode::Flat).await?;
                for leaf in &listing.leaves {
                    if matcher.is_match(&leaf.name) {
                        let locator = target.locator(leaf.name.clone());
                        self.ready
                            .push_back(MatchedResource::leaf(locator, leaf, &from_container));
                    }
                }
            } else {
                self.work.push(WorkItem::Recursive {
                    target,
                    list_prefix: literal.to_string(),
                    matcher: Arc::new(matcher),
                    from_container,
                });
            }
            return Ok(());
        }

        let head = &pattern[..seg_end];
        let rest = pattern.get(seg_end + 1..);
        let matcher = Matcher::compile(head)?;
        let listing = self.list(&target, literal, ListMode::Delimited).await?;

        if rest.is_none() {
            for leaf in &listing.leaves {
                if matcher.is_match(&leaf.name) {
                    let locator = target.locator(leaf.name.clone());
                    self.ready
                        .push_back(MatchedResource::leaf(locator, leaf, &from_container));
                }
            }
        }

        let mut descend = Vec::new();
        for prefix in &listing.prefixes {
            let name = strip_one_slash(prefix);
            if !matcher.is_match(name) {
                tracing::trace!(prefix = %prefix, "pruned");
                continue;
            }
            match rest {
                Some(rest) => descend.push(WorkItem::Pattern {
                    target: target.clone(),
                    pattern: format!("{name}{DELIMITER}{rest}"),
                    from_container: from_container.clone(),
                }),
                None => {
                    if let Some(item) = self.container_match(&target, name, &from_container) {
                        descend.push(item);
                    }
                }
            }
        }
        self.work.extend(descend.into_iter().rev());
        Ok(())
    }

    /// A wildcard-free pattern reached by descending: check it against one
    /// listing instead of assuming it exists.
    async fn resolve_literal(
        &mut self,
        target: Target,
        name: String,
        from_container: Option<ResourceLocator>,
    ) -> Result<()> {
        let listing = self.list(&target, &name, ListMode::Delimited).await?;
        for leaf in listing.leaves.iter().filter(|l| l.name == name) {
            let locator = target.locator(leaf.name.clone());
            self.ready
                .push_back(MatchedResource::leaf(locator, leaf, &from_container));
        }
        let container = format!("{name}{DELIMITER}");
        if listing.prefixes.contains(&container)
            && let Some(item) = self.container_match(&target, &name, &from_container)
        {
            self.work.push(item);
        }
        Ok(())
    }

    /// Handle a container matched by the final pattern segment. Returns the
    /// work item to expand it, or queues it as a result.
    fn container_match(
        &mut self,
        target: &Target,
        name: &str,
        from_container: &Option<ResourceLocator>,
    ) -> Option<WorkItem> {
        if self.request.recursive_containers {
            return Some(WorkItem::Pattern {
                target: target.clone(),
                pattern: recursive_pattern(name),
                from_container: Some(target.locator(name)),
            });
        }
        let locator = target.locator(format!("{name}{DELIMITER}"));
        if self.request.result_type == ResultType::All {
            self.ready.push_back(MatchedResource {
                container_root: from_container.clone(),
                ..MatchedResource::container(locator)
            });
        } else {
            tracing::warn!("Omitting container {locator} (recursion not requested)");
        }
        None
    }

    fn lister(&self, target: &Target) -> Result<Box<dyn Lister>> {
        Ok(match target {
            Target::Local => Box::new(LocalLister),
            Target::Cloud { provider, bucket } => Box::new(RemoteLister::new(
                self.stores.get(*provider)?,
                bucket.clone(),
            )),
        })
    }

    /// List under a prefix.
    ///
    /// The first listing of an expansion is the root's, and a missing root
    /// directory is reported as [`Error::NotFound`]. A missing local directory
    /// reached while descending is empty, the way a cloud prefix with no
    /// objects is.
    async fn list(&mut self, target: &Target, prefix: &str, mode: ListMode) -> Result<Listing> {
        let descended = self.listings > 0;
        self.listings += 1;
        match self.lister(target)?.list(prefix, mode).await {
            Err(Error::NotFound(_)) if descended && matches!(target, Target::Local) => {
                tracing::debug!(prefix, "directory vanished while descending");
                Ok(Listing::default())
            }
            other => other,
        }
    }
}

/// `name/**`, or `**` for the root of a bucket
fn recursive_pattern(name: &str) -> String {
    if name.is_empty() {
        "**".to_string()
    } else {
        format!("{name}{DELIMITER}**")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryStore;
    use crate::traits::MockObjectStore;
    use futures::TryStreamExt;

    fn expander(store: Arc<MemoryStore>) -> Expander {
        Expander::new(StoreRegistry::new().with(Provider::Gs, store))
    }

    fn names(matches: &[MatchedResource]) -> Vec<String> {
        matches.iter().map(|m| m.locator.to_string()).collect()
    }

    async fn expand(
        store: &Arc<MemoryStore>,
        request: ExpansionRequest,
    ) -> Result<Vec<MatchedResource>> {
        expander(store.clone()).expand(request)?.try_collect().await
    }

    fn sample_store() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::new()
                .with_object("b", "dir/abcxyz", b"1")
                .with_object("b", "dir/abc/xyz", b"22")
                .with_object("b", "dir/abc/nested/file", b"333")
                .with_object("b", "top.txt", b"t"),
        )
    }

    #[tokio::test]
    async fn test_literal_object_needs_no_listing() {
        let store = sample_store();
        let matches = expand(&store, ExpansionRequest::new("gs://b/does/not/exist"))
            .await
            .unwrap();
        assert_eq!(names(&matches), vec!["gs://b/does/not/exist"]);
        assert!(!matches[0].is_container);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_single_star_does_not_cross_segments() {
        let store = sample_store();
        let matches = expand(&store, ExpansionRequest::new("gs://b/dir/abc*"))
            .await
            .unwrap();
        assert_eq!(names(&matches), vec!["gs://b/dir/abcxyz"]);
        assert_eq!(matches[0].size, Some(1));
        assert_eq!(store.listed_prefixes(), vec!["dir/abc"]);
    }

    #[tokio::test]
    async fn test_double_star_spans_segments_in_one_flat_listing() {
        let store = sample_store();
        let matches = expand(&store, ExpansionRequest::new("gs://b/dir/abc**"))
            .await
            .unwrap();
        assert_eq!(
            names(&matches),
            vec![
                "gs://b/dir/abc/nested/file",
                "gs://b/dir/abc/xyz",
                "gs://b/dir/abcxyz"
            ]
        );
        let calls = store.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].prefix, "dir/abc");
        assert_eq!(calls[0].delimiter, None);
    }

    #[tokio::test]
    async fn test_double_star_with_literal_suffix() {
        let store = Arc::new(
            MemoryStore::new()
                .with_object("b", "a/x.txt", b"")
                .with_object("b", "a/y/z.txt", b"")
                .with_object("b", "a/y/z.log", b""),
        );
        let matches = expand(&store, ExpansionRequest::new("gs://b/a/**.txt"))
            .await
            .unwrap();
        assert_eq!(names(&matches), vec!["gs://b/a/x.txt", "gs://b/a/y/z.txt"]);
    }

    #[tokio::test]
    async fn test_non_matching_prefixes_are_never_listed() {
        let store = Arc::new(
            MemoryStore::new()
                .with_object("b", "a1/x", b"")
                .with_object("b", "a2/x", b"")
                .with_object("b", "b1/x", b""),
        );
        let matches = expand(&store, ExpansionRequest::new("gs://b/*1/x"))
            .await
            .unwrap();
        assert_eq!(names(&matches), vec!["gs://b/a1/x", "gs://b/b1/x"]);
        assert_eq!(store.listed_prefixes(), vec!["", "a1/x", "b1/x"]);
    }

    #[tokio::test]
    async fn test_leaves_are_yielded_before_descending() {
        let store = Arc::new(
            MemoryStore::new()
                .with_object("b", "d/a/inner", b"")
                .with_object("b", "d/z", b""),
        );
        let request = ExpansionRequest::new("gs://b/d/*").recursive(true);
        let matches = expand(&store, request).await.unwrap();
        assert_eq!(names(&matches), vec!["gs://b/d/z", "gs://b/d/a/inner"]);
        assert!(!matches[0].expanded_from_container());
        assert!(matches[1].expanded_from_container());
    }

    #[tokio::test]
    async fn test_matched_container_without_recursion() {
        let store = sample_store();

        let all = ExpansionRequest::new("gs://b/dir/*").with_result_type(ResultType::All);
        let matches = expand(&store, all).await.unwrap();
        assert_eq!(names(&matches), vec!["gs://b/dir/abcxyz", "gs://b/dir/abc/"]);
        assert!(matches[1].is_container);

        let leaves = ExpansionRequest::new("gs://b/dir/*");
        let matches = expand(&store, leaves).await.unwrap();
        assert_eq!(names(&matches), vec!["gs://b/dir/abcxyz"]);
    }

    #[tokio::test]
    async fn test_trailing_slash_is_stripped_from_wildcards() {
        let store = sample_store();
        let request = ExpansionRequest::new("gs://b/dir/ab*/").with_result_type(ResultType::All);
        let matches = expand(&store, request).await.unwrap();
        assert_eq!(names(&matches), vec!["gs://b/dir/abcxyz", "gs://b/dir/abc/"]);
    }

    #[tokio::test]
    async fn test_bucket_leaves_only_fails_before_listing() {
        // any call on this mock would panic
        let registry = StoreRegistry::new().with(Provider::Gs, Arc::new(MockObjectStore::new()));
        let result = Expander::new(registry).expand(ExpansionRequest::new("gs://b"));
        assert!(matches!(result, Err(Error::InvalidResultType(_))));
    }

    #[tokio::test]
    async fn test_bucket_without_recursion_is_one_container() {
        let store = sample_store();
        let request = ExpansionRequest::new("gs://b").with_result_type(ResultType::All);
        let matches = expand(&store, request).await.unwrap();
        assert_eq!(names(&matches), vec!["gs://b/"]);
        assert!(matches[0].is_container);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_bucket_with_recursion_expands_everything() {
        let store = sample_store();
        let matches = expand(&store, ExpansionRequest::new("gs://b").recursive(true))
            .await
            .unwrap();
        assert_eq!(matches.len(), 4);
        assert!(matches.iter().all(|m| m.expanded_from_container()));
    }

    #[tokio::test]
    async fn test_prefix_container_with_recursion() {
        let store = sample_store();
        let matches = expand(&store, ExpansionRequest::new("gs://b/dir/abc/").recursive(true))
            .await
            .unwrap();
        assert_eq!(
            names(&matches),
            vec!["gs://b/dir/abc/nested/file", "gs://b/dir/abc/xyz"]
        );
    }

    #[tokio::test]
    async fn test_no_matches_is_reported_once() {
        let store = sample_store();
        let mut expansion = expander(store)
            .expand(ExpansionRequest::new("gs://b/nothing*"))
            .unwrap();
        assert!(matches!(expansion.next().await, Err(Error::NoMatches(p)) if p == "gs://b/nothing*"));
        assert!(matches!(expansion.next().await, Ok(None)));
    }

    #[tokio::test]
    async fn test_empty_bucket_raises_no_matches() {
        let store = Arc::new(MemoryStore::new().with_bucket("empty"));
        let result = expand(&store, ExpansionRequest::new("gs://empty").recursive(true)).await;
        assert!(matches!(result, Err(Error::NoMatches(_))));
    }

    #[tokio::test]
    async fn test_transient_error_aborts_sequence() {
        let mut mock = MockObjectStore::new();
        mock.expect_list_objects()
            .times(1)
            .returning(|_, _| Err(Error::Network("timeout".into())));
        let registry = StoreRegistry::new().with(Provider::Gs, Arc::new(mock));
        let mut expansion = Expander::new(registry)
            .expand(ExpansionRequest::new("gs://b/*"))
            .unwrap();

        assert!(matches!(expansion.next().await, Err(Error::Network(_))));
        assert!(matches!(expansion.next().await, Ok(None)));
    }

    #[tokio::test]
    async fn test_bucket_wildcard_lists_buckets_once() {
        let store = Arc::new(
            MemoryStore::new()
                .with_object("logs-a", "f", b"")
                .with_object("logs-b", "f", b"")
                .with_object("other", "f", b""),
        );
        let matches = expand(&store, ExpansionRequest::new("gs://logs-*/f"))
            .await
            .unwrap();
        assert_eq!(names(&matches), vec!["gs://logs-a/f", "gs://logs-b/f"]);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_wildcard_fails_eagerly() {
        let store = sample_store();
        let result = expander(store.clone()).expand(ExpansionRequest::new("gs://b/abc**/*.txt"));
        assert!(matches!(result, Err(Error::InvalidWildcard(_))));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_provider_fails_eagerly() {
        let store = sample_store();
        let result = expander(store).expand(ExpansionRequest::new("s3://b/x"));
        assert!(matches!(result, Err(Error::ProviderNotFound(_))));
    }

    #[tokio::test]
    async fn test_into_stream() {
        let store = sample_store();
        let stream = expander(store)
            .expand(ExpansionRequest::new("gs://b/*.txt"))
            .unwrap()
            .into_stream();
        let matches: Vec<MatchedResource> = stream.try_collect().await.unwrap();
        assert_eq!(names(&matches), vec!["gs://b/top.txt"]);
    }

    fn local_tree() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        std::fs::create_dir_all(dir.path().join("dir0/dir1")).unwrap();
        std::fs::create_dir_all(dir.path().join("other")).unwrap();
        std::fs::write(dir.path().join("f0"), b"f0").unwrap();
        std::fs::write(dir.path().join("dir0/f1"), b"f1").unwrap();
        std::fs::write(dir.path().join("dir0/dir1/f2"), b"f2").unwrap();
        (dir, root)
    }

    async fn expand_local(request: ExpansionRequest) -> Result<Vec<MatchedResource>> {
        Expander::new(StoreRegistry::new())
            .expand(request)?
            .try_collect()
            .await
    }

    #[tokio::test]
    async fn test_local_double_star_walks_tree() {
        let (_dir, root) = local_tree();
        let matches = expand_local(ExpansionRequest::new(format!("{root}/**")))
            .await
            .unwrap();
        let mut got = names(&matches);
        got.sort();
        assert_eq!(
            got,
            vec![
                format!("{root}/dir0/dir1/f2"),
                format!("{root}/dir0/f1"),
                format!("{root}/f0"),
            ]
        );
    }

    #[tokio::test]
    async fn test_local_star_omits_directories_without_recursion() {
        let (_dir, root) = local_tree();
        let matches = expand_local(ExpansionRequest::new(format!("{root}/*")))
            .await
            .unwrap();
        assert_eq!(names(&matches), vec![format!("{root}/f0")]);
        assert_eq!(matches[0].size, Some(2));
    }

    #[tokio::test]
    async fn test_local_directory_with_recursion() {
        let (_dir, root) = local_tree();
        let matches = expand_local(ExpansionRequest::new(root.clone()).recursive(true))
            .await
            .unwrap();
        assert_eq!(
            names(&matches),
            vec![
                format!("{root}/f0"),
                format!("{root}/dir0/f1"),
                format!("{root}/dir0/dir1/f2"),
            ]
        );
        assert!(matches.iter().all(|m| m.expanded_from_container()));
    }

    #[tokio::test]
    async fn test_local_nested_pattern_skips_missing_subdirs() {
        let (_dir, root) = local_tree();
        let matches = expand_local(ExpansionRequest::new(format!("{root}/*/dir1/*")))
            .await
            .unwrap();
        assert_eq!(names(&matches), vec![format!("{root}/dir0/dir1/f2")]);
    }

    #[tokio::test]
    async fn test_local_missing_root_is_not_found() {
        let (_dir, root) = local_tree();
        let result = expand_local(ExpansionRequest::new(format!("{root}/missing/*"))).await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        // a matched directory lacking the next component is skipped instead
        std::fs::create_dir(format!("{root}/dir9")).unwrap();
        let matches = expand_local(ExpansionRequest::new(format!("{root}/dir*/dir1/*")))
            .await
            .unwrap();
        assert_eq!(names(&matches), vec![format!("{root}/dir0/dir1/f2")]);
    }

    #[tokio::test]
    async fn test_container_root_is_the_matched_directory() {
        let (_dir, root) = local_tree();
        let request = ExpansionRequest::new(format!("{root}/d*/dir1")).recursive(true);
        let matches = expand_local(request).await.unwrap();

        assert_eq!(names(&matches), vec![format!("{root}/dir0/dir1/f2")]);
        assert_eq!(
            matches[0].container_root,
            Some(ResourceLocator::local(format!("{root}/dir0/dir1")))
        );
    }

    #[tokio::test]
    async fn test_local_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().to_string();

        let recursive = expand_local(ExpansionRequest::new(root.clone()).recursive(true)).await;
        assert!(matches!(recursive, Err(Error::NoMatches(_))));

        let request = ExpansionRequest::new(root).with_result_type(ResultType::All);
        let matches = expand_local(request).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches[0].is_container);
    }

    #[tokio::test]
    async fn test_local_literal_file_is_stat_without_listing() {
        let (_dir, root) = local_tree();
        let matches = expand_local(ExpansionRequest::new(format!("{root}/f0")))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].size, Some(2));
    }
}
