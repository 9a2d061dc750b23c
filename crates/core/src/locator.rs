//! Storage URL parsing
//!
//! Handles parsing of location strings in the formats:
//! - `gs://bucket[/object]` and `s3://bucket[/object]` for cloud storage
//! - `file://path` or a bare path for the local filesystem
//!
//! Object names use `/` as a hierarchy separator for display and matching
//! only; the cloud namespace itself is flat.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Separator used for both object names and local paths
pub const DELIMITER: char = '/';

/// Characters that make a string a wildcard pattern
const WILDCARD_CHARS: [char; 3] = ['*', '?', '['];

/// Check if a string contains wildcard metacharacters
pub fn contains_wildcard(s: &str) -> bool {
    s.contains(WILDCARD_CHARS)
}

/// Cloud storage provider, selected by URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google Cloud Storage (`gs://`)
    Gs,
    /// Amazon S3 or any S3-compatible service (`s3://`)
    S3,
}

impl Provider {
    /// All supported cloud providers
    pub const ALL: [Provider; 2] = [Provider::Gs, Provider::S3];

    /// URL scheme for this provider
    pub const fn scheme(self) -> &'static str {
        match self {
            Provider::Gs => "gs",
            Provider::S3 => "s3",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gs" => Ok(Provider::Gs),
            "s3" => Ok(Provider::S3),
            other => Err(Error::InvalidUrl(format!("Unrecognized scheme '{other}'"))),
        }
    }
}

/// A local filesystem location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalPath {
    path: String,
}

/// A cloud location: a bucket, or an object (or object prefix) inside one
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CloudPath {
    provider: Provider,
    bucket: String,
    /// Object name; empty for the bucket itself
    object: String,
}

/// One addressable location, parsed once and immutable afterwards
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceLocator {
    /// Local filesystem path
    Local(LocalPath),
    /// Cloud bucket or object
    Cloud(CloudPath),
}

impl LocalPath {
    /// Filesystem path as given, with `/` separators
    pub fn as_str(&self) -> &str {
        &self.path
    }
}

impl CloudPath {
    /// Provider this path belongs to
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Bucket name (may contain wildcards)
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object name (empty for a bucket)
    pub fn object(&self) -> &str {
        &self.object
    }
}

impl ResourceLocator {
    /// Parse a location string
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::InvalidUrl("URL cannot be empty".into()));
        }

        let Some((scheme, rest)) = raw.split_once("://") else {
            return Ok(Self::local(raw));
        };

        if scheme.eq_ignore_ascii_case("file") {
            if rest.is_empty() {
                return Err(Error::InvalidUrl(format!("'{raw}' names no file")));
            }
            return Ok(Self::local(rest));
        }

        let provider: Provider = scheme.parse()?;
        let (bucket, object) = rest.split_once(DELIMITER).unwrap_or((rest, ""));

        if bucket.is_empty() {
            return Err(Error::InvalidUrl(format!(
                "'{raw}' is missing a bucket name. Use format: {provider}://bucket[/object]"
            )));
        }
        if object == "." || object == ".." {
            return Err(Error::InvalidUrl(format!(
                "{object} is an invalid root-level object name"
            )));
        }

        Ok(Self::cloud(provider, bucket, object))
    }

    /// Build a local locator
    pub fn local(path: impl Into<String>) -> Self {
        ResourceLocator::Local(LocalPath { path: path.into() })
    }

    /// Build a cloud locator; an empty object names the bucket
    pub fn cloud(provider: Provider, bucket: impl Into<String>, object: impl Into<String>) -> Self {
        ResourceLocator::Cloud(CloudPath {
            provider,
            bucket: bucket.into(),
            object: object.into(),
        })
    }

    /// URL scheme (`file`, `gs` or `s3`)
    pub fn scheme(&self) -> &'static str {
        match self {
            ResourceLocator::Local(_) => "file",
            ResourceLocator::Cloud(c) => c.provider.scheme(),
        }
    }

    /// Cloud provider, if any
    pub fn provider(&self) -> Option<Provider> {
        match self {
            ResourceLocator::Local(_) => None,
            ResourceLocator::Cloud(c) => Some(c.provider),
        }
    }

    /// Bucket name; set iff this is a cloud locator
    pub fn bucket(&self) -> Option<&str> {
        match self {
            ResourceLocator::Local(_) => None,
            ResourceLocator::Cloud(c) => Some(&c.bucket),
        }
    }

    /// Object name or filesystem path
    pub fn path(&self) -> &str {
        match self {
            ResourceLocator::Local(l) => &l.path,
            ResourceLocator::Cloud(c) => &c.object,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ResourceLocator::Local(_))
    }

    pub fn is_cloud(&self) -> bool {
        matches!(self, ResourceLocator::Cloud(_))
    }

    /// Cloud locator naming a bucket with no object part
    pub fn is_bucket(&self) -> bool {
        matches!(self, ResourceLocator::Cloud(c) if c.object.is_empty())
    }

    /// Whether any part of the URL (bucket included) contains wildcards
    pub fn has_wildcard(&self) -> bool {
        match self {
            ResourceLocator::Local(l) => contains_wildcard(&l.path),
            ResourceLocator::Cloud(c) => {
                contains_wildcard(&c.bucket) || contains_wildcard(&c.object)
            }
        }
    }

    /// Whether the locator names a container.
    ///
    /// Buckets and `/`-terminated object names are containers syntactically;
    /// local paths are containers when they end in `/` or are existing
    /// directories. Cloud prefixes without a trailing slash need a listing to
    /// tell, which this method never performs.
    pub fn names_container(&self) -> bool {
        match self {
            ResourceLocator::Local(l) => {
                l.path.ends_with(DELIMITER) || Path::new(&l.path).is_dir()
            }
            ResourceLocator::Cloud(c) => c.object.is_empty() || c.object.ends_with(DELIMITER),
        }
    }

    /// Whether the locator names exactly one leaf without any expansion
    pub fn names_single_resource(&self) -> bool {
        !self.has_wildcard() && !self.names_container()
    }

    /// Same scheme and bucket, with the path replaced
    pub fn clone_with_name(&self, name: impl Into<String>) -> Self {
        match self {
            ResourceLocator::Local(_) => Self::local(name),
            ResourceLocator::Cloud(c) => Self::cloud(c.provider, c.bucket.clone(), name),
        }
    }

    /// Same scheme and path with a different bucket
    pub fn with_bucket(&self, bucket: impl Into<String>) -> Self {
        match self {
            ResourceLocator::Local(_) => self.clone(),
            ResourceLocator::Cloud(c) => Self::cloud(c.provider, bucket, c.object.clone()),
        }
    }

    /// Final path component, ignoring one trailing separator.
    /// For a bucket this is the bucket name.
    pub fn base_name(&self) -> &str {
        let path = strip_one_slash(self.path());
        if path.is_empty() {
            return self.bucket().unwrap_or_default();
        }
        path.rsplit(DELIMITER).next().unwrap_or(path)
    }

    /// Locator string with its final path component removed.
    ///
    /// `gs://bucket/dir/` gives `gs://bucket`, `gs://bucket` gives `gs://`,
    /// `a/b/c` gives `a/b` and `c` gives the empty string.
    pub fn path_before_final_dir(&self) -> String {
        match self {
            ResourceLocator::Local(l) => parent_of(strip_one_slash(&l.path)).to_string(),
            ResourceLocator::Cloud(c) if c.object.is_empty() => format!("{}://", c.provider),
            ResourceLocator::Cloud(c) => {
                let parent = parent_of(strip_one_slash(&c.object));
                if parent.is_empty() {
                    format!("{}://{}", c.provider, c.bucket)
                } else {
                    format!("{}://{}/{}", c.provider, c.bucket, parent)
                }
            }
        }
    }

    /// Locator string with local paths normalised (`a/./b` and `a//b` become `a/b`)
    pub fn normalized(&self) -> String {
        match self {
            ResourceLocator::Local(l) => normalize_local(&l.path),
            ResourceLocator::Cloud(_) => self.to_string(),
        }
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceLocator::Local(l) => f.write_str(&l.path),
            ResourceLocator::Cloud(c) if c.object.is_empty() => {
                write!(f, "{}://{}/", c.provider, c.bucket)
            }
            ResourceLocator::Cloud(c) => write!(f, "{}://{}/{}", c.provider, c.bucket, c.object),
        }
    }
}

impl FromStr for ResourceLocator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Remove a single trailing `/`, leaving any others in place so that object
/// names made of slashes survive.
pub fn strip_one_slash(s: &str) -> &str {
    s.strip_suffix(DELIMITER).unwrap_or(s)
}

fn parent_of(path: &str) -> &str {
    match path.rfind(DELIMITER) {
        Some(0) => "/",
        Some(pos) => &path[..pos],
        None => "",
    }
}

fn normalize_local(path: &str) -> String {
    let absolute = path.starts_with(DELIMITER);
    let parts: Vec<&str> = path
        .split(DELIMITER)
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cloud_object() {
        let url = ResourceLocator::parse("gs://bucket/dir/file.txt").unwrap();
        assert!(url.is_cloud());
        assert_eq!(url.provider(), Some(Provider::Gs));
        assert_eq!(url.bucket(), Some("bucket"));
        assert_eq!(url.path(), "dir/file.txt");
        assert!(!url.has_wildcard());
        assert!(!url.names_container());
        assert!(url.names_single_resource());
    }

    #[test]
    fn test_parse_bucket_only() {
        for raw in ["s3://bucket", "s3://bucket/"] {
            let url = ResourceLocator::parse(raw).unwrap();
            assert!(url.is_bucket());
            assert!(url.names_container());
            assert_eq!(url.to_string(), "s3://bucket/");
        }
    }

    #[test]
    fn test_parse_scheme_is_case_insensitive() {
        let url = ResourceLocator::parse("GS://bucket/o").unwrap();
        assert_eq!(url.scheme(), "gs");
    }

    #[test]
    fn test_parse_trailing_slash_is_container() {
        let url = ResourceLocator::parse("gs://bucket/dir/").unwrap();
        assert!(url.names_container());
        assert!(!url.names_single_resource());
    }

    #[test]
    fn test_parse_local_paths() {
        let url = ResourceLocator::parse("file:///tmp/x.txt").unwrap();
        assert!(url.is_local());
        assert_eq!(url.path(), "/tmp/x.txt");
        assert_eq!(url.bucket(), None);

        let url = ResourceLocator::parse("relative/x.txt").unwrap();
        assert!(url.is_local());
        assert_eq!(url.scheme(), "file");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(ResourceLocator::parse(""), Err(Error::InvalidUrl(_))));
        assert!(matches!(ResourceLocator::parse("ftp://host/x"), Err(Error::InvalidUrl(_))));
        assert!(matches!(ResourceLocator::parse("gs://"), Err(Error::InvalidUrl(_))));
        assert!(matches!(ResourceLocator::parse("file://"), Err(Error::InvalidUrl(_))));
        assert!(matches!(ResourceLocator::parse("gs://b/.."), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_wildcard_detection() {
        assert!(ResourceLocator::parse("gs://b/*.txt").unwrap().has_wildcard());
        assert!(ResourceLocator::parse("gs://b/f?.txt").unwrap().has_wildcard());
        assert!(ResourceLocator::parse("gs://b/[ab].txt").unwrap().has_wildcard());
        assert!(ResourceLocator::parse("gs://buck*/o").unwrap().has_wildcard());
        assert!(ResourceLocator::parse("data/**").unwrap().has_wildcard());
        assert!(!ResourceLocator::parse("gs://b/plain.txt").unwrap().has_wildcard());
    }

    #[test]
    fn test_clone_with_name() {
        let url = ResourceLocator::parse("gs://bucket/a/*").unwrap();
        let concrete = url.clone_with_name("a/b.txt");
        assert_eq!(concrete.to_string(), "gs://bucket/a/b.txt");
        assert!(!concrete.has_wildcard());

        let local = ResourceLocator::parse("dir/*").unwrap();
        assert_eq!(local.clone_with_name("dir/x").to_string(), "dir/x");
    }

    #[test]
    fn test_base_name() {
        assert_eq!(ResourceLocator::parse("gs://b/a/c.txt").unwrap().base_name(), "c.txt");
        assert_eq!(ResourceLocator::parse("gs://b/a/dir/").unwrap().base_name(), "dir");
        assert_eq!(ResourceLocator::parse("gs://bucket").unwrap().base_name(), "bucket");
        assert_eq!(ResourceLocator::parse("/tmp/src").unwrap().base_name(), "src");
    }

    #[test]
    fn test_path_before_final_dir() {
        let cases = [
            ("gs://bucket/dir/", "gs://bucket"),
            ("gs://bucket/a/b", "gs://bucket/a"),
            ("gs://bucket", "gs://"),
            ("/tmp/src", "/tmp"),
            ("/src", "/"),
            ("src", ""),
            ("a/b/", "a"),
        ];
        for (raw, expected) in cases {
            let url = ResourceLocator::parse(raw).unwrap();
            assert_eq!(url.path_before_final_dir(), expected, "for {raw}");
        }
    }

    #[test]
    fn test_normalized_local() {
        assert_eq!(ResourceLocator::local("a/./b//c").normalized(), "a/b/c");
        assert_eq!(ResourceLocator::local("/tmp/./x").normalized(), "/tmp/x");
        assert_eq!(ResourceLocator::local("./").normalized(), ".");
    }

    #[test]
    fn test_local_directory_names_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().to_string();
        assert!(ResourceLocator::local(path.clone()).names_container());
        assert!(!ResourceLocator::local(format!("{path}/missing")).names_container());
    }
}
