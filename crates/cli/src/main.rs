//! gsc - wildcard-aware client for Google Cloud Storage and S3
//!
//! UNIX-like commands (`ls`, `cp`, `mv`, `rm`, ...) over `gs://`, `s3://`
//! and local paths.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use gsc_cli::commands::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug, cli.no_color);

    let exit_code = commands::execute(cli).await;
    std::process::exit(exit_code.as_i32());
}

/// Logs go to stderr so they never mix with command output.
fn init_tracing(debug: bool, no_color: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!no_color)
                .with_target(debug),
        )
        .with(filter)
        .init();
}
