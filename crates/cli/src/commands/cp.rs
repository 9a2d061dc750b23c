//! cp command - Copy files and objects
//!
//! Sources are expanded, the destination classified, and each matched
//! resource named with `cp -r` semantics before anything is written:
//!
//! * `cp -r dir gs://b/new` copies `dir/a` to `gs://b/new/a`
//! * `cp -r dir gs://b/existing` copies `dir/a` to `gs://b/existing/dir/a`
//! * `cp dir/* gs://b` copies each match under its base name

use clap::Args;
use futures::{StreamExt, stream};
use gsc_core::{MatchedResource, Resolution, Resolver, Result, SourceRoot};
use serde::Serialize;

use super::{Context, ops, report};
use crate::exit_code::ExitCode;
use crate::output::{ProgressBar, format_size};

/// Copy files and objects
#[derive(Args, Debug)]
pub struct CpArgs {
    /// Source URLs followed by the destination URL
    #[arg(value_name = "URL", required = true, num_args = 2..)]
    pub urls: Vec<String>,

    #[command(flatten)]
    pub transfer: TransferArgs,
}

/// Options shared by `cp` and `mv`
#[derive(Args, Debug, Clone, Default)]
pub struct TransferArgs {
    /// Copy directories, buckets and bucket subdirectories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Keep going after an item fails
    #[arg(long)]
    pub continue_on_error: bool,

    /// Only show what would be copied
    #[arg(long)]
    pub dry_run: bool,

    /// Content type for uploaded objects (guessed from the file name otherwise)
    #[arg(long)]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Copy,
    Move,
}

impl Mode {
    fn verb(self) -> &'static str {
        match self {
            Mode::Copy => "copy",
            Mode::Move => "move",
        }
    }

    fn past(self) -> &'static str {
        match self {
            Mode::Copy => "Copied",
            Mode::Move => "Moved",
        }
    }
}

#[derive(Debug, Serialize)]
struct TransferItem {
    source: String,
    destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
}

#[derive(Debug, Serialize)]
struct TransferFailure {
    source: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct TransferOutput {
    status: &'static str,
    dry_run: bool,
    items: Vec<TransferItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed: Vec<TransferFailure>,
    total: usize,
}

/// Execute the cp command
pub async fn execute(args: CpArgs, ctx: &Context) -> ExitCode {
    transfer(&args.urls, &args.transfer, Mode::Copy, ctx).await
}

/// Resolve `urls` (sources then destination) and copy, or move, every match
pub(crate) async fn transfer(
    urls: &[String],
    args: &TransferArgs,
    mode: Mode,
    ctx: &Context,
) -> ExitCode {
    let formatter = ctx.formatter();
    let (destination, sources) = match urls.split_last() {
        Some((destination, sources)) if !sources.is_empty() => (destination, sources),
        _ => {
            formatter.error("Expected at least one source URL and a destination URL");
            return ExitCode::UsageError;
        }
    };

    let mut resolver = Resolver::new(ctx.expander());
    if args.dry_run {
        resolver = resolver.dry_run();
    }

    let spinner = ProgressBar::spinner(&ctx.output, "Expanding sources");
    let resolved = resolver
        .resolve(sources, destination, args.recursive)
        .await;
    spinner.finish_and_clear();
    let resolution = match resolved {
        Ok(resolution) => resolution,
        Err(e) => return report(&formatter, &e),
    };
    tracing::debug!(
        matches = resolution.match_count(),
        multi = resolution.is_multi_source,
        destination = %resolution.destination.locator,
        "resolved {} request",
        mode.verb()
    );

    let plan: Vec<(&MatchedResource, &SourceRoot)> = resolution
        .sources
        .iter()
        .flat_map(|s| s.matches.iter().map(move |m| (m, &s.root)))
        .collect();
    let progress = ProgressBar::new(&ctx.output, plan.len() as u64);

    let resolver = &resolver;
    let resolution = &resolution;
    let mut results = stream::iter(plan)
        .map(move |(source, root)| async move {
            let source_url = source.locator.to_string();
            match transfer_one(source, root, resolver, resolution, args, mode, ctx).await {
                Ok((destination, size_bytes)) => Ok(TransferItem {
                    source: source_url,
                    destination,
                    size_bytes,
                }),
                Err(e) => Err((source_url, e)),
            }
        })
        .buffer_unordered(ctx.jobs());

    let mut items = Vec::new();
    let mut failed = Vec::new();
    let mut exit = ExitCode::Success;
    while let Some(result) = results.next().await {
        progress.inc(1);
        match result {
            Ok(item) => {
                if !formatter.is_json() {
                    let line = if args.dry_run {
                        format!("Would {}: {} -> {}", mode.verb(), item.source, item.destination)
                    } else {
                        let size = format_size(item.size_bytes.unwrap_or_default());
                        format!("{} -> {} ({size})", item.source, item.destination)
                    };
                    progress.suspend(|| formatter.println(&line));
                }
                items.push(item);
            }
            Err((source, e)) => {
                progress.suspend(|| formatter.error(&format!("{source}: {e}")));
                if exit == ExitCode::Success {
                    exit = ExitCode::from(&e);
                }
                failed.push(TransferFailure {
                    source,
                    error: e.to_string(),
                });
                if !args.continue_on_error {
                    break;
                }
            }
        }
    }
    drop(results);
    progress.finish_and_clear();

    if formatter.is_json() {
        formatter.json(&TransferOutput {
            status: if failed.is_empty() { "success" } else { "partial" },
            dry_run: args.dry_run,
            total: items.len(),
            items,
            failed,
        });
    } else if !failed.is_empty() {
        formatter.warning(&format!(
            "Completed with errors: {} succeeded, {} failed",
            items.len(),
            failed.len()
        ));
    } else if !args.dry_run {
        formatter.success(&format!("{} {} item(s).", mode.past(), items.len()));
    }
    exit
}

/// Name, then copy one match. Returns the destination URL and the bytes
/// written, or the known source size on a dry run.
async fn transfer_one(
    source: &MatchedResource,
    root: &SourceRoot,
    resolver: &Resolver,
    resolution: &Resolution,
    args: &TransferArgs,
    mode: Mode,
    ctx: &Context,
) -> Result<(String, Option<u64>)> {
    let decision = resolver
        .compute_destination_name(
            source,
            root,
            &resolution.destination,
            resolution.is_multi_source,
        )
        .await?;
    let target = decision.destination_locator;
    if args.dry_run {
        return Ok((target.to_string(), source.size));
    }

    let size = ops::copy_resource(
        &ctx.stores,
        &source.locator,
        &target,
        args.content_type.as_deref(),
    )
    .await?;
    if mode == Mode::Move {
        ops::remove_resource(&ctx.stores, &source.locator).await?;
    }
    Ok((target.to_string(), Some(size)))
}
