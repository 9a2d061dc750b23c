//! provider command - Manage credentials and endpoints per URL scheme
//!
//! Entries live in the `[[providers]]` table of the configuration file.
//! Secret keys are never printed.

use clap::Subcommand;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use gsc_core::{Provider, ProviderConfig, ProviderManager};
use serde::Serialize;

use super::report;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Provider subcommands
#[derive(Subcommand, Debug)]
pub enum ProviderCommands {
    /// Add or replace the entry for a scheme
    Set(SetArgs),

    /// List configured providers
    List(ListArgs),

    /// Remove the entry for a scheme
    Remove(RemoveArgs),
}

/// Arguments for `provider set`
#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// URL scheme: gs or s3
    pub scheme: Provider,

    /// Access key ID (an HMAC key for Cloud Storage)
    pub access_key: String,

    /// Secret access key
    pub secret_key: String,

    /// Service endpoint (default: storage.googleapis.com for gs, AWS for s3)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Signing region
    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    /// Bucket lookup style: auto, path, or dns
    #[arg(long, default_value = "auto", value_parser = ["auto", "path", "dns"])]
    pub bucket_lookup: String,
}

/// Arguments for `provider list`
#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Include region and lookup style
    #[arg(short, long)]
    pub long: bool,
}

/// Arguments for `provider remove`
#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// URL scheme: gs or s3
    pub scheme: Provider,
}

/// Provider entry without its secret
#[derive(Debug, Serialize)]
struct ProviderInfo {
    scheme: Provider,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
    access_key: String,
    region: String,
    bucket_lookup: String,
}

impl From<&ProviderConfig> for ProviderInfo {
    fn from(entry: &ProviderConfig) -> Self {
        Self {
            scheme: entry.provider,
            endpoint: entry.effective_endpoint(),
            access_key: entry.access_key.clone(),
            region: entry.region.clone(),
            bucket_lookup: entry.bucket_lookup.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ProviderOperationOutput {
    success: bool,
    scheme: Provider,
    message: String,
}

/// Execute a provider subcommand
pub fn execute(
    cmd: ProviderCommands,
    manager: &ProviderManager,
    formatter: &Formatter,
) -> ExitCode {
    match cmd {
        ProviderCommands::Set(args) => execute_set(args, manager, formatter),
        ProviderCommands::List(args) => execute_list(args, manager, formatter),
        ProviderCommands::Remove(args) => execute_remove(args, manager, formatter),
    }
}

fn execute_set(args: SetArgs, manager: &ProviderManager, formatter: &Formatter) -> ExitCode {
    let mut entry = ProviderConfig::new(args.scheme, args.access_key, args.secret_key);
    entry.endpoint = args.endpoint;
    entry.region = args.region;
    entry.bucket_lookup = args.bucket_lookup;

    if let Err(e) = manager.set(entry) {
        return report(formatter, &e);
    }
    let message = format!("Provider {}:// configured successfully.", args.scheme);
    if formatter.is_json() {
        formatter.json(&ProviderOperationOutput {
            success: true,
            scheme: args.scheme,
            message,
        });
    } else {
        formatter.success(&message);
    }
    ExitCode::Success
}

fn execute_list(args: ListArgs, manager: &ProviderManager, formatter: &Formatter) -> ExitCode {
    let entries = match manager.list() {
        Ok(entries) => entries,
        Err(e) => return report(formatter, &e),
    };
    let infos: Vec<ProviderInfo> = entries.iter().map(ProviderInfo::from).collect();

    if formatter.is_json() {
        formatter.json(&serde_json::json!({ "providers": infos }));
    } else if infos.is_empty() {
        formatter.println("No providers configured.");
    } else {
        formatter.println(&providers_table(&infos, args.long).to_string());
    }
    ExitCode::Success
}

fn execute_remove(args: RemoveArgs, manager: &ProviderManager, formatter: &Formatter) -> ExitCode {
    if let Err(e) = manager.remove(args.scheme) {
        return report(formatter, &e);
    }
    let message = format!("Provider {}:// removed.", args.scheme);
    if formatter.is_json() {
        formatter.json(&ProviderOperationOutput {
            success: true,
            scheme: args.scheme,
            message,
        });
    } else {
        formatter.success(&message);
    }
    ExitCode::Success
}

fn providers_table(infos: &[ProviderInfo], long: bool) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec!["Scheme", "Endpoint", "Access key"];
    if long {
        header.extend(["Region", "Lookup"]);
    }
    table.set_header(header);

    for info in infos {
        let mut row = vec![
            format!("{}://", info.scheme),
            info.endpoint.clone().unwrap_or_else(|| "(AWS default)".to_string()),
            info.access_key.clone(),
        ];
        if long {
            row.extend([info.region.clone(), info.bucket_lookup.clone()]);
        }
        table.add_row(row);
    }
    table
}
