//! Multi-source resolution and destination naming
//!
//! Given N source patterns and one destination, expands every source,
//! classifies the destination (single resource or container, existing or
//! new) and computes the final name of each copied resource the way `cp`
//! and `cp -r` name things.

use std::path::Path;

use crate::error::{Error, Result};
use crate::expand::{Expander, ExpansionRequest, MatchedResource, ResultType};
use crate::locator::{DELIMITER, ResourceLocator};
use crate::traits::ListOptions;

/// A source pattern as given, before expansion
#[derive(Debug, Clone)]
pub struct SourceRoot {
    pub locator: ResourceLocator,
    /// The pattern names a directory, bucket or bucket subdirectory
    pub names_container: bool,
}

/// A source pattern and everything it expanded to
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub root: SourceRoot,
    pub matches: Vec<MatchedResource>,
}

/// The resolved destination of a copy
#[derive(Debug, Clone)]
pub struct Destination {
    pub locator: ResourceLocator,
    pub is_container: bool,
    /// The container already exists (always false for non-containers)
    pub exists: bool,
}

/// Output of [`Resolver::resolve`]
#[derive(Debug, Clone)]
pub struct Resolution {
    pub sources: Vec<ResolvedSource>,
    pub destination: Destination,
    pub is_multi_source: bool,
}

impl Resolution {
    /// Total number of matched source resources
    pub fn match_count(&self) -> usize {
        self.sources.iter().map(|s| s.matches.len()).sum()
    }
}

/// Where one matched source is written
#[derive(Debug, Clone, PartialEq)]
pub struct NamingDecision {
    pub source: MatchedResource,
    pub destination_locator: ResourceLocator,
    /// Bytes of the source URL consumed by the source root before the
    /// mirrored relative path begins
    pub strip_prefix_len: usize,
}

/// Resolves copy and move requests
#[derive(Debug, Clone)]
pub struct Resolver {
    expander: Expander,
    create_dirs: bool,
}

impl Resolver {
    pub fn new(expander: Expander) -> Self {
        Self {
            expander,
            create_dirs: true,
        }
    }

    /// Compute names without creating local destination directories
    pub fn dry_run(mut self) -> Self {
        self.create_dirs = false;
        self
    }

    pub fn expander(&self) -> &Expander {
        &self.expander
    }

    /// Expand all sources and validate the destination.
    ///
    /// Fails before anything is written when the destination is ambiguous,
    /// cannot hold several resources, or overlaps a source.
    pub async fn resolve(
        &self,
        sources: &[String],
        destination: &str,
        recursive: bool,
    ) -> Result<Resolution> {
        let mut resolved = Vec::with_capacity(sources.len());
        for raw in sources {
            resolved.push(self.expand_source(raw, recursive).await?);
        }

        let match_count: usize = resolved.iter().map(|s| s.matches.len()).sum();
        let is_multi_source = sources.len() > 1
            || match_count > 1
            || resolved.iter().any(|s| {
                s.root.names_container || s.matches.iter().any(MatchedResource::expanded_from_container)
            });
        let container_copy = resolved.iter().any(|s| s.root.names_container);

        let destination = self
            .resolve_destination(destination, is_multi_source, container_copy)
            .await?;
        if is_multi_source && !destination.is_container {
            return Err(Error::DestinationNotContainer(destination.locator.to_string()));
        }

        let resolution = Resolution {
            sources: resolved,
            destination,
            is_multi_source,
        };
        check_overlap(&resolution)?;
        Ok(resolution)
    }

    /// Name one matched source under the destination.
    ///
    /// For local destinations this also creates a new destination container
    /// and reports [`Error::DirFileConflict`] when a file occupies a needed
    /// directory or a directory occupies the target name.
    pub async fn compute_destination_name(
        &self,
        source: &MatchedResource,
        root: &SourceRoot,
        destination: &Destination,
        is_multi_source: bool,
    ) -> Result<NamingDecision> {
        let decision = name_for(source, root, destination, is_multi_source);

        if destination.locator.is_local() {
            if self.create_dirs && destination.is_container && !destination.exists {
                tokio::fs::create_dir_all(destination.locator.path()).await?;
            }
            check_dir_file_conflict(&source.locator, &decision.destination_locator).await?;
        }
        Ok(decision)
    }

    async fn expand_source(&self, raw: &str, recursive: bool) -> Result<ResolvedSource> {
        let locator = ResourceLocator::parse(raw)?;
        let mut pattern = raw.to_string();
        let mut names_container = !locator.has_wildcard() && locator.names_container();

        if recursive
            && locator.is_cloud()
            && !locator.has_wildcard()
            && !names_container
            && self.prefix_exists(&locator).await?
        {
            tracing::debug!("{raw} names a bucket subdirectory");
            names_container = true;
            pattern.push(DELIMITER);
        }

        let request = ExpansionRequest::new(pattern).recursive(recursive);
        let matches = self.expander.expand(request)?.try_collect().await?;
        Ok(ResolvedSource {
            root: SourceRoot {
                locator,
                names_container,
            },
            matches,
        })
    }

    async fn resolve_destination(
        &self,
        raw: &str,
        is_multi_source: bool,
        container_copy: bool,
    ) -> Result<Destination> {
        let locator = ResourceLocator::parse(raw)?;

        if locator.has_wildcard() {
            let request = ExpansionRequest::new(raw).with_result_type(ResultType::All);
            let matches = match self.expander.expand(request)?.try_collect().await {
                Ok(matches) => matches,
                Err(Error::NoMatches(_)) => Vec::new(),
                Err(e) => return Err(e),
            };
            let [only] = <[MatchedResource; 1]>::try_from(matches)
                .map_err(|_| Error::AmbiguousDestination(raw.to_string()))?;
            return Ok(Destination {
                exists: only.is_container,
                is_container: only.is_container,
                locator: only.locator,
            });
        }

        if locator.is_local() {
            let path = Path::new(locator.path());
            let (is_container, exists) = if path.is_dir() {
                (true, true)
            } else if locator.path().ends_with(DELIMITER) {
                (true, false)
            } else if is_multi_source && container_copy && !path.exists() {
                (true, false)
            } else {
                (false, false)
            };
            return Ok(Destination {
                locator,
                is_container,
                exists,
            });
        }

        let (is_container, exists) = if locator.names_container() {
            (true, true)
        } else if self.prefix_exists(&locator).await? {
            (true, true)
        } else {
            (is_multi_source, false)
        };
        Ok(Destination {
            locator,
            is_container,
            exists,
        })
    }

    /// Whether `object/` is a non-empty prefix; one listing call of one key
    async fn prefix_exists(&self, locator: &ResourceLocator) -> Result<bool> {
        let (Some(provider), Some(bucket)) = (locator.provider(), locator.bucket()) else {
            return Ok(false);
        };
        let store = self.expander.stores().get(provider)?;
        let prefix = format!("{}{DELIMITER}", locator.path());
        tracing::debug!(bucket, prefix = %prefix, "probing for bucket subdirectory");

        let page = store
            .list_objects(
                bucket,
                ListOptions {
                    prefix: Some(prefix),
                    delimiter: Some(DELIMITER.to_string()),
                    max_keys: Some(1),
                    continuation_token: None,
                },
            )
            .await?;
        Ok(!page.items.is_empty())
    }
}

/// Pure part of destination naming
fn name_for(
    source: &MatchedResource,
    root: &SourceRoot,
    destination: &Destination,
    is_multi_source: bool,
) -> NamingDecision {
    if !destination.is_container && !is_multi_source {
        return NamingDecision {
            source: source.clone(),
            destination_locator: destination.locator.clone(),
            strip_prefix_len: 0,
        };
    }

    let source_url = source.locator.to_string();
    let container = source
        .container_root
        .as_ref()
        .or(root.names_container.then_some(&root.locator));
    let (key, strip_prefix_len) = if let Some(container) = container {
        // mirror the tree below the parent of the concrete container
        let before = container.path_before_final_dir();
        let relative = match source_url.strip_prefix(before.as_str()) {
            Some(tail) => tail.trim_start_matches(DELIMITER),
            None => source.locator.base_name(),
        };
        let strip = source_url.len() - relative.len();

        let mut key = relative;
        if root.names_container && !destination.exists {
            // a new destination container takes the place of the source root
            if let Some((_, rest)) = key.split_once(DELIMITER) {
                key = rest;
            }
        }
        if let Some(rest) = key.strip_prefix("./") {
            key = rest;
        }
        (key.to_string(), strip)
    } else {
        let base = source.locator.base_name();
        (base.to_string(), source_url.len() - base.len())
    };

    NamingDecision {
        source: source.clone(),
        destination_locator: join(&destination.locator, &key),
        strip_prefix_len,
    }
}

fn join(container: &ResourceLocator, key: &str) -> ResourceLocator {
    let base = container.path().trim_end_matches(DELIMITER);
    let name = match (container, base.is_empty()) {
        (ResourceLocator::Cloud(_), true) => key.to_string(),
        (ResourceLocator::Local(_), true) if container.path().starts_with(DELIMITER) => {
            format!("{DELIMITER}{key}")
        }
        (ResourceLocator::Local(_), true) => key.to_string(),
        _ => format!("{base}{DELIMITER}{key}"),
    };
    container.clone_with_name(name)
}

fn same_resource(a: &ResourceLocator, b: &ResourceLocator) -> bool {
    match (a, b) {
        (ResourceLocator::Local(_), ResourceLocator::Local(_)) => a.normalized() == b.normalized(),
        _ => a.to_string() == b.to_string(),
    }
}

fn check_overlap(resolution: &Resolution) -> Result<()> {
    let destination = &resolution.destination;
    let dest_url = destination.locator.to_string();

    for source in &resolution.sources {
        let root = &source.root;
        if root.names_container && root.locator.is_cloud() && destination.locator.is_cloud() {
            let root_url = format!(
                "{}{DELIMITER}",
                root.locator.to_string().trim_end_matches(DELIMITER)
            );
            if dest_url.starts_with(&root_url) {
                return Err(Error::OverlappingSourceDest {
                    source_url: root.locator.to_string(),
                    destination: dest_url,
                });
            }
        }

        for matched in &source.matches {
            let decision = name_for(matched, root, destination, resolution.is_multi_source);
            if same_resource(&matched.locator, &destination.locator)
                || same_resource(&matched.locator, &decision.destination_locator)
            {
                return Err(Error::OverlappingSourceDest {
                    source_url: matched.locator.to_string(),
                    destination: decision.destination_locator.to_string(),
                });
            }
        }
    }
    Ok(())
}

async fn check_dir_file_conflict(source: &ResourceLocator, target: &ResourceLocator) -> Result<()> {
    let path = Path::new(target.path());
    // climb until the first existing directory; a file on the way blocks the copy
    for ancestor in path.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        match tokio::fs::metadata(ancestor).await {
            Ok(meta) if meta.is_dir() => break,
            Ok(_) => {
                return Err(Error::DirFileConflict {
                    source_url: source.to_string(),
                    reason: format!(
                        "a file exists where a directory needs to be created ({})",
                        ancestor.display()
                    ),
                });
            }
            Err(_) => continue,
        }
    }
    if let Ok(meta) = tokio::fs::metadata(path).await
        && meta.is_dir()
    {
        return Err(Error::DirFileConflict {
            source_url: source.to_string(),
            reason: format!(
                "a directory exists ({}) where the file needs to be created",
                path.display()
            ),
        });
    }
    Ok(())
}
