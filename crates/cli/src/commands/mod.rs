//! CLI command definitions and execution
//!
//! Every command is a thin layer over the expansion engine in `gsc-core`:
//! it expands its URL arguments, then performs one store operation per
//! matched resource, fanned out across `parallel_jobs` workers with `-m`.

use clap::{Parser, Subcommand};
use gsc_core::{Config, ConfigManager, Error, Expander, ProviderManager, StoreRegistry};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

mod acl;
mod cat;
mod completions;
pub mod cp;
mod ls;
mod ops;
mod mv;
mod provider;
mod rm;
mod stat;

/// gsc - command-line client for Google Cloud Storage and S3
///
/// Works on `gs://bucket/object`, `s3://bucket/object` and local paths.
/// URLs may contain `*`, `**`, `?` and `[...]` wildcards.
#[derive(Parser, Debug)]
#[command(name = "gsc")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    /// Run per-resource operations in parallel (`defaults.parallel_jobs` workers)
    #[arg(short = 'm', long, global = true, default_value = "false")]
    pub parallel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List buckets, objects and files
    Ls(ls::LsArgs),

    /// Copy files and objects
    Cp(cp::CpArgs),

    /// Move files and objects (copy, then delete the source)
    Mv(mv::MvArgs),

    /// Remove objects and files
    Rm(rm::RmArgs),

    /// Concatenate object or file contents to stdout
    Cat(cat::CatArgs),

    /// Show object metadata
    Stat(stat::StatArgs),

    /// Get or set bucket and object ACLs
    #[command(subcommand)]
    Acl(acl::AclCommands),

    /// Manage provider credentials and endpoints
    #[command(subcommand)]
    Provider(provider::ProviderCommands),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Everything a storage command needs, built once per process
pub struct Context {
    pub config: Config,
    pub stores: StoreRegistry,
    pub output: OutputConfig,
    pub parallel: bool,
}

impl Context {
    pub fn formatter(&self) -> Formatter {
        Formatter::new(self.output.clone())
    }

    pub fn expander(&self) -> Expander {
        Expander::new(self.stores.clone())
    }

    /// Number of concurrent per-resource operations
    pub fn jobs(&self) -> usize {
        if self.parallel {
            self.config.defaults.parallel_jobs.max(1)
        } else {
            1
        }
    }
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let mut output = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };

    let command = match cli.command {
        Commands::Completions(args) => return completions::execute(args),
        command => command,
    };

    let (manager, config) = match load_config() {
        Ok(loaded) => loaded,
        Err(e) => return report(&Formatter::new(output), &e),
    };
    apply_defaults(&mut output, &config);

    if let Commands::Provider(cmd) = command {
        let formatter = Formatter::new(output);
        return provider::execute(cmd, &ProviderManager::with_config_manager(manager), &formatter);
    }

    let stores = match gsc_s3::connect(&config).await {
        Ok(stores) => stores,
        Err(e) => return report(&Formatter::new(output), &e),
    };
    let ctx = Context {
        config,
        stores,
        output,
        parallel: cli.parallel,
    };

    match command {
        Commands::Ls(args) => ls::execute(args, &ctx).await,
        Commands::Cp(args) => cp::execute(args, &ctx).await,
        Commands::Mv(args) => mv::execute(args, &ctx).await,
        Commands::Rm(args) => rm::execute(args, &ctx).await,
        Commands::Cat(args) => cat::execute(args, &ctx).await,
        Commands::Stat(args) => stat::execute(args, &ctx).await,
        Commands::Acl(cmd) => acl::execute(cmd, &ctx).await,
        Commands::Provider(_) | Commands::Completions(_) => ExitCode::Success,
    }
}

fn load_config() -> gsc_core::Result<(ConfigManager, Config)> {
    let manager = ConfigManager::new()?;
    let config = manager.load()?;
    tracing::debug!(path = %manager.config_path().display(), "configuration loaded");
    Ok((manager, config))
}

/// Fold `[defaults]` into the flags; a flag always wins over the file.
fn apply_defaults(output: &mut OutputConfig, config: &Config) {
    let defaults = &config.defaults;
    output.json |= defaults.output == "json";
    output.no_progress |= !defaults.progress;
    match defaults.color.as_str() {
        "never" => output.no_color = true,
        "always" if !output.no_color => console::set_colors_enabled(true),
        _ => {}
    }
    if output.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }
}

/// Print an error and map it onto its exit code
pub(crate) fn report(formatter: &Formatter, error: &Error) -> ExitCode {
    formatter.error(&error.to_string());
    ExitCode::from(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["gsc", "cp", "-m", "--json", "a", "gs://b/"]).unwrap();
        assert!(cli.parallel);
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Cp(_)));
    }

    #[test]
    fn test_jobs_follow_parallel_flag() {
        let mut ctx = Context {
            config: Config::default(),
            stores: StoreRegistry::new(),
            output: OutputConfig::default(),
            parallel: false,
        };
        assert_eq!(ctx.jobs(), 1);
        ctx.parallel = true;
        ctx.config.defaults.parallel_jobs = 4;
        assert_eq!(ctx.jobs(), 4);
    }

    #[test]
    fn test_defaults_fold_into_output() {
        let mut config = Config::default();
        config.defaults.output = "json".into();
        config.defaults.progress = false;

        let mut output = OutputConfig::default();
        apply_defaults(&mut output, &config);
        assert!(output.json);
        assert!(output.no_progress);
    }
}
