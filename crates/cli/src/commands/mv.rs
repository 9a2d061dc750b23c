//! mv command - Move files and objects
//!
//! Same naming as `cp`; each source is deleted once its copy has landed.
//! A failed copy leaves its source in place. Buckets are never a source.

use clap::Args;
use gsc_core::ResourceLocator;

use super::cp::{Mode, TransferArgs, transfer};
use super::{Context, report};
use crate::exit_code::ExitCode;

/// Move files and objects
#[derive(Args, Debug)]
pub struct MvArgs {
    /// Source URLs followed by the destination URL
    #[arg(value_name = "URL", required = true, num_args = 2..)]
    pub urls: Vec<String>,

    #[command(flatten)]
    pub transfer: TransferArgs,
}

/// Execute the mv command
pub async fn execute(args: MvArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    let sources = args.urls.split_last().map_or(&[][..], |(_, sources)| sources);
    for source in sources {
        let locator = match ResourceLocator::parse(source) {
            Ok(locator) => locator,
            Err(e) => return report(&formatter, &e),
        };
        if locator.is_bucket() {
            formatter.error(&format!(
                "You cannot move a source bucket using the mv command. If you meant to move \
                 all objects in the bucket, use: gsc mv {}/* ...",
                source.trim_end_matches('/')
            ));
            return ExitCode::UsageError;
        }
    }
    transfer(&args.urls, &args.transfer, Mode::Move, ctx).await
}
