//! cat command - Concatenate object or file contents to stdout
//!
//! Bytes are written unmodified, so binary objects survive a pipe.

use std::io::{self, Write};

use clap::Args;
use gsc_core::{ExpansionRequest, Result};

use super::{Context, ops, report};
use crate::exit_code::ExitCode;

/// Concatenate object or file contents to stdout
#[derive(Args, Debug)]
pub struct CatArgs {
    /// URLs to print (wildcards allowed)
    #[arg(value_name = "URL", required = true)]
    pub urls: Vec<String>,

    /// Print a `==> URL <==` header before each resource
    #[arg(long)]
    pub header: bool,
}

/// Execute the cat command
pub async fn execute(args: CatArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    let mut stdout = io::stdout();
    for url in &args.urls {
        if let Err(e) = cat_url(url, args.header, ctx, &mut stdout).await {
            return report(&formatter, &e);
        }
    }
    ExitCode::Success
}

async fn cat_url(url: &str, header: bool, ctx: &Context, out: &mut impl Write) -> Result<()> {
    let mut expansion = ctx.expander().expand(ExpansionRequest::new(url))?;
    while let Some(matched) = expansion.next().await? {
        let data = ops::read_resource(&ctx.stores, &matched.locator).await?;
        if header {
            writeln!(out, "==> {} <==", matched.locator)?;
        }
        out.write_all(&data)?;
    }
    out.flush()?;
    Ok(())
}
