//! rm command - Remove objects and files
//!
//! Each URL is expanded to leaves (recursively with `-r`) and every leaf is
//! deleted. Directories and prefixes themselves are never removed.

use clap::Args;
use futures::{StreamExt, stream};
use gsc_core::{Error, Expander, ExpansionRequest, MatchedResource, ResourceLocator, Result};
use serde::Serialize;

use super::{Context, ops};
use crate::exit_code::ExitCode;
use crate::output::ProgressBar;

/// Remove objects and files
#[derive(Args, Debug)]
pub struct RmArgs {
    /// URLs to remove (wildcards allowed)
    #[arg(value_name = "URL", required = true)]
    pub urls: Vec<String>,

    /// Remove everything under directories, buckets and bucket subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Ignore URLs that match nothing and objects that are already gone
    #[arg(short, long)]
    pub force: bool,

    /// Only show what would be deleted
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct RmFailure {
    url: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    status: &'static str,
    dry_run: bool,
    deleted: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed: Vec<RmFailure>,
    total: usize,
}

/// Execute the rm command
pub async fn execute(args: RmArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    let expander = ctx.expander();

    let mut exit = ExitCode::Success;
    let mut failed = Vec::new();
    let mut targets: Vec<MatchedResource> = Vec::new();

    for url in &args.urls {
        match expand_url(&expander, url, args.recursive, ctx).await {
            Ok(matches) => targets.extend(matches),
            Err(Error::NoMatches(_) | Error::NotFound(_)) if args.force => {
                tracing::debug!(url = %url, "nothing matched, ignored with -f");
            }
            Err(e) => {
                formatter.error(&e.to_string());
                if exit == ExitCode::Success {
                    exit = ExitCode::from(&e);
                }
                failed.push(RmFailure {
                    url: url.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    let dry_run = args.dry_run;
    let progress = ProgressBar::new(&ctx.output, targets.len() as u64);
    let mut results = stream::iter(targets)
        .map(move |matched| async move {
            let url = matched.locator.to_string();
            if dry_run {
                return Ok(url);
            }
            match ops::remove_resource(&ctx.stores, &matched.locator).await {
                Ok(()) => Ok(url),
                Err(e) => Err((url, e)),
            }
        })
        .buffer_unordered(ctx.jobs());

    let mut deleted = Vec::new();
    while let Some(result) = results.next().await {
        progress.inc(1);
        match result {
            Ok(url) => {
                if !formatter.is_json() {
                    let line = if args.dry_run {
                        format!("Would remove: {url}")
                    } else {
                        format!("Removing {url}")
                    };
                    progress.suspend(|| formatter.println(&line));
                }
                deleted.push(url);
            }
            Err((url, Error::NotFound(_))) if args.force => {
                tracing::debug!(url = %url, "already gone, ignored with -f");
            }
            Err((url, e)) => {
                progress.suspend(|| formatter.error(&format!("{url}: {e}")));
                if exit == ExitCode::Success {
                    exit = ExitCode::from(&e);
                }
                failed.push(RmFailure {
                    url,
                    error: e.to_string(),
                });
            }
        }
    }
    drop(results);
    progress.finish_and_clear();

    if formatter.is_json() {
        formatter.json(&RmOutput {
            status: if failed.is_empty() { "success" } else { "partial" },
            dry_run: args.dry_run,
            total: deleted.len(),
            deleted,
            failed,
        });
    } else if !args.dry_run && !deleted.is_empty() {
        formatter.success(&format!("Removed {} item(s).", deleted.len()));
    }
    exit
}

/// Leaves to delete for one URL.
///
/// With `-r`, a literal cloud name without a trailing slash may be an object,
/// a bucket subdirectory, or both; each is checked with one request.
async fn expand_url(
    expander: &Expander,
    url: &str,
    recursive: bool,
    ctx: &Context,
) -> Result<Vec<MatchedResource>> {
    let locator = ResourceLocator::parse(url)?;
    let maybe_subdir = recursive
        && locator.is_cloud()
        && !locator.has_wildcard()
        && !locator.names_container();
    if !maybe_subdir {
        let request = ExpansionRequest::new(url).recursive(recursive);
        return expander.expand(request)?.try_collect().await;
    }

    let mut found = Vec::new();
    if ops::head_resource(&ctx.stores, &locator).await?.is_some() {
        found.push(MatchedResource::literal(locator));
    }
    let request = ExpansionRequest::new(format!("{url}/")).recursive(true);
    match expander.expand(request)?.try_collect().await {
        Ok(matches) => found.extend(matches),
        Err(Error::NoMatches(_)) => {}
        Err(e) => return Err(e),
    }
    if found.is_empty() {
        return Err(Error::NoMatches(url.to_string()));
    }
    Ok(found)
}
