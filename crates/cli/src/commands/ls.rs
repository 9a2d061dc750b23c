//! ls command - List buckets, objects and files
//!
//! A bare scheme (`gs://`) lists buckets. A literal container lists one
//! level of its contents, and is allowed to be empty. Wildcards list what
//! they match, and matching nothing is an error.

use clap::Args;
use gsc_core::{
    Error, Expander, Expansion, ExpansionRequest, MatchedResource, Provider, ResourceLocator,
    Result, ResultType, locator::strip_one_slash,
};
use serde::Serialize;

use super::{Context, ops};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, format_size, format_timestamp};

const SIZE_WIDTH: usize = 10;
const DATE_WIDTH: usize = 20;

/// List buckets, objects and files
#[derive(Args, Debug)]
pub struct LsArgs {
    /// URLs to list (`gs://` alone lists buckets)
    #[arg(value_name = "URL", required = true)]
    pub urls: Vec<String>,

    /// List every level below containers
    #[arg(short, long)]
    pub recursive: bool,

    /// List buckets and directories themselves instead of their contents
    #[arg(short, long)]
    pub bucket: bool,

    /// Long listing with size and modification time
    #[arg(short, long)]
    pub long: bool,

    /// Print object and byte totals
    #[arg(long)]
    pub summarize: bool,
}

#[derive(Debug, Serialize)]
struct LsOutput {
    items: Vec<MatchedResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<Summary>,
}

#[derive(Debug, Serialize)]
struct Summary {
    total_objects: usize,
    total_size_bytes: u64,
    total_size_human: String,
}

/// Prints rows as they arrive in human mode, collects them in JSON mode
struct Sink<'a> {
    formatter: &'a Formatter,
    long: bool,
    items: Vec<MatchedResource>,
    objects: usize,
    bytes: u64,
}

impl Sink<'_> {
    fn push(&mut self, matched: MatchedResource) {
        if !matched.is_container {
            self.objects += 1;
            self.bytes += matched.size.unwrap_or_default();
        }
        if self.formatter.is_json() {
            self.items.push(matched);
        } else {
            self.formatter.println(&format_row(&matched, self.long));
        }
    }

    async fn drain(&mut self, mut expansion: Expansion) -> Result<usize> {
        let mut count = 0;
        while let Some(matched) = expansion.next().await? {
            self.push(matched);
            count += 1;
        }
        Ok(count)
    }
}

/// Execute the ls command
pub async fn execute(args: LsArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    let mut sink = Sink {
        formatter: &formatter,
        long: args.long,
        items: Vec::new(),
        objects: 0,
        bytes: 0,
    };

    let mut exit = ExitCode::Success;
    for url in &args.urls {
        if let Err(e) = list_url(url, &args, ctx, &mut sink).await {
            formatter.error(&e.to_string());
            if exit == ExitCode::Success {
                exit = ExitCode::from(&e);
            }
        }
    }

    let summarize = args.summarize || args.long;
    if formatter.is_json() {
        let summary = summarize.then(|| Summary {
            total_objects: sink.objects,
            total_size_bytes: sink.bytes,
            total_size_human: format_size(sink.bytes),
        });
        formatter.json(&LsOutput {
            items: sink.items,
            summary,
        });
    } else if summarize && sink.objects > 0 {
        formatter.println(&format!(
            "TOTAL: {} objects, {} bytes ({})",
            sink.objects,
            sink.bytes,
            format_size(sink.bytes)
        ));
    }
    exit
}

async fn list_url(url: &str, args: &LsArgs, ctx: &Context, sink: &mut Sink<'_>) -> Result<()> {
    if let Some(provider) = bare_scheme(url) {
        return list_buckets(provider, ctx, sink).await;
    }

    let locator = ResourceLocator::parse(url)?;
    let expander = ctx.expander();

    if locator.has_wildcard() {
        let request = if args.recursive {
            ExpansionRequest::new(url).recursive(true)
        } else {
            ExpansionRequest::new(url).with_result_type(ResultType::All)
        };
        sink.drain(expander.expand(request)?).await?;
        return Ok(());
    }

    if args.bucket {
        let request = ExpansionRequest::new(url).with_result_type(ResultType::All);
        sink.drain(expander.expand(request)?).await?;
        return Ok(());
    }

    if locator.names_container() {
        list_contents(&expander, url, args.recursive, sink).await?;
        return Ok(());
    }

    // a literal name is an object or file, or a prefix given without its slash
    if let Some(info) = ops::head_resource(&ctx.stores, &locator).await? {
        sink.push(MatchedResource {
            size: info.size_bytes,
            last_modified: info.last_modified,
            ..MatchedResource::literal(locator)
        });
        return Ok(());
    }
    if locator.is_cloud() && list_contents(&expander, url, args.recursive, sink).await? > 0 {
        return Ok(());
    }
    Err(Error::NoMatches(url.to_string()))
}

/// Contents of a literal container; an empty container is not an error
async fn list_contents(
    expander: &Expander,
    url: &str,
    recursive: bool,
    sink: &mut Sink<'_>,
) -> Result<usize> {
    let container = strip_one_slash(url);
    let request = if recursive {
        ExpansionRequest::new(format!("{container}/**"))
    } else {
        ExpansionRequest::new(format!("{container}/*")).with_result_type(ResultType::All)
    };
    match sink.drain(expander.expand(request)?).await {
        Err(Error::NoMatches(_)) => {
            tracing::debug!(url, "container is empty");
            Ok(0)
        }
        other => other,
    }
}

async fn list_buckets(provider: Provider, ctx: &Context, sink: &mut Sink<'_>) -> Result<()> {
    let store = ctx.stores.get(provider)?;
    for bucket in store.list_buckets().await? {
        sink.push(MatchedResource {
            last_modified: bucket.last_modified,
            ..MatchedResource::container(ResourceLocator::cloud(provider, bucket.key, ""))
        });
    }
    Ok(())
}

/// `gs://` or `s3://` with nothing after the scheme
fn bare_scheme(url: &str) -> Option<Provider> {
    url.strip_suffix("://")?.parse().ok()
}

fn format_row(matched: &MatchedResource, long: bool) -> String {
    let url = matched.locator.to_string();
    if !long {
        return url;
    }
    if matched.is_container {
        let date = matched
            .last_modified
            .map(format_timestamp)
            .unwrap_or_default();
        return format!("{:>SIZE_WIDTH$}  {date:<DATE_WIDTH$}  {url}", "");
    }
    let size = matched
        .size
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    let date = matched
        .last_modified
        .map(format_timestamp)
        .unwrap_or_default();
    format!("{size:>SIZE_WIDTH$}  {date:<DATE_WIDTH$}  {url}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use gsc_core::{Config, StoreRegistry};

    use crate::commands::{Cli, Commands};
    use crate::output::OutputConfig;

    fn context() -> Context {
        Context {
            config: Config::default(),
            stores: StoreRegistry::new(),
            output: OutputConfig {
                quiet: true,
                ..Default::default()
            },
            parallel: false,
        }
    }

    fn ls(urls: Vec<String>) -> LsArgs {
        LsArgs {
            urls,
            recursive: false,
            bucket: false,
            long: false,
            summarize: false,
        }
    }

    fn object(url: &str, size: u64) -> MatchedResource {
        MatchedResource {
            size: Some(size),
            last_modified: Some("2024-03-09T17:05:00Z".parse().unwrap()),
            ..MatchedResource::literal(ResourceLocator::parse(url).unwrap())
        }
    }

    #[test]
    fn test_parse_ls_flags() {
        let cli = Cli::try_parse_from(["gsc", "ls", "-lr", "gs://b"]).unwrap();
        let Commands::Ls(args) = cli.command else {
            panic!("expected ls");
        };
        assert!(args.long);
        assert!(args.recursive);
        assert!(!args.bucket);
    }

    #[test]
    fn test_bare_scheme() {
        assert_eq!(bare_scheme("gs://"), Some(Provider::Gs));
        assert_eq!(bare_scheme("s3://"), Some(Provider::S3));
        assert_eq!(bare_scheme("gs://b"), None);
        assert_eq!(bare_scheme("ftp://"), None);
    }

    #[test]
    fn test_short_row_is_url() {
        let row = format_row(&object("gs://bucket/a/b.txt", 5), false);
        insta::assert_snapshot!(row, @"gs://bucket/a/b.txt");
    }

    #[test]
    fn test_long_rows() {
        let leaf = format_row(&object("gs://bucket/a/b.txt", 1234), true);
        assert_eq!(leaf, "      1234  2024-03-09T17:05:00Z  gs://bucket/a/b.txt");

        let dir = MatchedResource::container(ResourceLocator::parse("gs://bucket/a/").unwrap());
        assert_eq!(
            format_row(&dir, true),
            format!("{}gs://bucket/a/", " ".repeat(SIZE_WIDTH + DATE_WIDTH + 4))
        );
    }

    #[test]
    fn test_json_shape() {
        let output = LsOutput {
            items: vec![object("s3://bkt/k", 3)],
            summary: Some(Summary {
                total_objects: 1,
                total_size_bytes: 3,
                total_size_human: format_size(3),
            }),
        };
        insta::assert_json_snapshot!(output, @r#"
        {
          "items": [
            {
              "url": "s3://bkt/k",
              "is_container": false,
              "size": 3,
              "last_modified": "2024-03-09T17:05:00Z"
            }
          ],
          "summary": {
            "total_objects": 1,
            "total_size_bytes": 3,
            "total_size_human": "3 B"
          }
        }
        "#);
    }

    #[tokio::test]
    async fn test_empty_directory_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().to_string_lossy().into_owned();
        assert_eq!(execute(ls(vec![url]), &context()).await, ExitCode::Success);
    }

    #[tokio::test]
    async fn test_unmatched_wildcard_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("*.txt").to_string_lossy().into_owned();
        assert_eq!(execute(ls(vec![url]), &context()).await, ExitCode::NotFound);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("absent").to_string_lossy().into_owned();
        assert_eq!(execute(ls(vec![url]), &context()).await, ExitCode::NotFound);
    }

    #[tokio::test]
    async fn test_cloud_url_without_provider() {
        let code = execute(ls(vec!["gs://bucket".into()]), &context()).await;
        assert_eq!(code, ExitCode::NotFound);
    }
}
