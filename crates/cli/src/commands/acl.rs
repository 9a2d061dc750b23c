//! acl command - Get or set bucket and object ACLs
//!
//! Bucket URLs address the bucket's ACL, object URLs the object's. Local
//! paths have no ACLs.

use clap::builder::PossibleValuesParser;
use clap::{Args, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use futures::{StreamExt, stream};
use gsc_core::{
    AccessControlPolicy, CANNED_ACLS, Error, ExpansionRequest, MatchedResource, ResourceLocator,
    Result, ResultType,
};
use serde::Serialize;

use super::{Context, report};
use crate::exit_code::ExitCode;

/// ACL subcommands
#[derive(Subcommand, Debug)]
pub enum AclCommands {
    /// Print the ACL of buckets or objects
    Get(GetArgs),

    /// Apply a canned ACL to buckets or objects
    Set(SetArgs),
}

/// Arguments for `acl get`
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Bucket or object URL (wildcards allowed)
    #[arg(value_name = "URL")]
    pub url: String,
}

/// Arguments for `acl set`
#[derive(Args, Debug)]
pub struct SetArgs {
    /// Canned ACL to apply
    #[arg(value_parser = PossibleValuesParser::new(CANNED_ACLS.iter().copied()))]
    pub canned: String,

    /// Bucket or object URLs (wildcards allowed)
    #[arg(value_name = "URL", required = true)]
    pub urls: Vec<String>,

    /// Apply to every object below buckets and bucket subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Keep going after an item fails
    #[arg(long)]
    pub continue_on_error: bool,
}

#[derive(Debug, Serialize)]
struct AclOutput {
    url: String,
    #[serde(flatten)]
    policy: AccessControlPolicy,
}

/// What an expanded URL's ACL belongs to
enum AclTarget<'a> {
    Bucket { bucket: &'a str },
    Object { bucket: &'a str, key: &'a str },
}

fn acl_target(matched: &MatchedResource) -> Result<Option<AclTarget<'_>>> {
    match &matched.locator {
        ResourceLocator::Local(_) => Err(Error::UnsupportedFeature(format!(
            "ACLs are not available for local files: {}",
            matched.locator
        ))),
        ResourceLocator::Cloud(c) if c.object().is_empty() => Ok(Some(AclTarget::Bucket {
            bucket: c.bucket(),
        })),
        // bucket subdirectories have no ACL of their own
        _ if matched.is_container => Ok(None),
        ResourceLocator::Cloud(c) => Ok(Some(AclTarget::Object {
            bucket: c.bucket(),
            key: c.object(),
        })),
    }
}

/// Execute an acl subcommand
pub async fn execute(cmd: AclCommands, ctx: &Context) -> ExitCode {
    match cmd {
        AclCommands::Get(args) => execute_get(args, ctx).await,
        AclCommands::Set(args) => execute_set(args, ctx).await,
    }
}

async fn execute_get(args: GetArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    let policies = match get_policies(&args.url, ctx).await {
        Ok(policies) => policies,
        Err(e) => return report(&formatter, &e),
    };

    if formatter.is_json() {
        formatter.json(&policies);
    } else {
        for output in &policies {
            formatter.println(&format!("{}:", output.url));
            if let Some(owner) = &output.policy.owner {
                formatter.println(&format!("Owner: {owner}"));
            }
            formatter.println(&grants_table(&output.policy).to_string());
        }
    }
    ExitCode::Success
}

async fn get_policies(url: &str, ctx: &Context) -> Result<Vec<AclOutput>> {
    let request = ExpansionRequest::new(url).with_result_type(ResultType::All);
    let mut expansion = ctx.expander().expand(request)?;
    let mut policies = Vec::new();
    while let Some(matched) = expansion.next().await? {
        let Some(target) = acl_target(&matched)? else {
            tracing::warn!("Skipping {} (bucket subdirectories have no ACL)", matched.locator);
            continue;
        };
        let store = ctx.stores.get(provider_of(&matched)?)?;
        let policy = match target {
            AclTarget::Bucket { bucket } => store.get_bucket_acl(bucket).await?,
            AclTarget::Object { bucket, key } => store.get_object_acl(bucket, key).await?,
        };
        policies.push(AclOutput {
            url: matched.locator.to_string(),
            policy,
        });
    }
    Ok(policies)
}

async fn execute_set(args: SetArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    let mut exit = ExitCode::Success;
    let mut matches = Vec::new();
    for url in &args.urls {
        let request = ExpansionRequest::new(url.as_str())
            .with_result_type(ResultType::All)
            .recursive(args.recursive);
        let expanded = match ctx.expander().expand(request) {
            Ok(expansion) => expansion.try_collect().await,
            Err(e) => Err(e),
        };
        match expanded {
            Ok(found) => matches.extend(found),
            Err(e) => return report(&formatter, &e),
        }
    }

    let canned = args.canned.as_str();
    let mut results = stream::iter(matches)
        .map(move |matched| async move {
            let url = matched.locator.to_string();
            match set_one(&matched, canned, ctx).await {
                Ok(applied) => Ok((url, applied)),
                Err(e) => Err((url, e)),
            }
        })
        .buffer_unordered(ctx.jobs());

    let mut applied = 0usize;
    while let Some(result) = results.next().await {
        match result {
            Ok((url, true)) => {
                formatter.println(&format!("Setting ACL on {url}"));
                applied += 1;
            }
            Ok((_, false)) => {}
            Err((url, e)) => {
                formatter.error(&format!("{url}: {e}"));
                if exit == ExitCode::Success {
                    exit = ExitCode::from(&e);
                }
                if !args.continue_on_error {
                    break;
                }
            }
        }
    }
    drop(results);

    if exit == ExitCode::Success {
        formatter.success(&format!("Applied '{canned}' to {applied} item(s)."));
    }
    exit
}

/// Apply a canned ACL to one match; `false` when the match has no ACL
async fn set_one(matched: &MatchedResource, canned: &str, ctx: &Context) -> Result<bool> {
    let Some(target) = acl_target(matched)? else {
        tracing::warn!("Skipping {} (bucket subdirectories have no ACL)", matched.locator);
        return Ok(false);
    };
    let store = ctx.stores.get(provider_of(matched)?)?;
    match target {
        AclTarget::Bucket { bucket } => store.set_bucket_acl(bucket, canned).await?,
        AclTarget::Object { bucket, key } => store.set_object_acl(bucket, key, canned).await?,
    }
    Ok(true)
}

fn provider_of(matched: &MatchedResource) -> Result<gsc_core::Provider> {
    matched
        .locator
        .provider()
        .ok_or_else(|| Error::UnsupportedFeature(format!("{} has no provider", matched.locator)))
}

fn grants_table(policy: &AccessControlPolicy) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Grantee", "Permission"]);
    for grant in &policy.grants {
        table.add_row(vec![grant.grantee.as_str(), grant.permission.as_str()]);
    }
    table
}
