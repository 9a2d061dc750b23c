//! stat command - Show object metadata
//!
//! Expansion does not check that literal URLs exist; this command does, with
//! one metadata request per match.

use clap::Args;
use gsc_core::{Error, ExpansionRequest, ObjectInfo, Result};
use serde::Serialize;

use super::{Context, ops};
use crate::exit_code::ExitCode;
use crate::output::{format_size, format_timestamp};

/// Show object metadata
#[derive(Args, Debug)]
pub struct StatArgs {
    /// URLs to describe (wildcards allowed)
    #[arg(value_name = "URL", required = true)]
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
struct StatOutput {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_human: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage_class: Option<String>,
}

impl StatOutput {
    fn new(url: String, info: ObjectInfo) -> Self {
        Self {
            url,
            last_modified: info.last_modified.map(format_timestamp),
            size_human: info.size_bytes.map(format_size),
            size_bytes: info.size_bytes,
            etag: info.etag,
            content_type: info.content_type,
            storage_class: info.storage_class,
        }
    }

    fn render(&self) -> String {
        let mut lines = vec![format!("{}:", self.url)];
        let mut field = |name: &str, value: &Option<String>| {
            if let Some(value) = value {
                lines.push(format!("    {:<18}{value}", format!("{name}:")));
            }
        };
        field("Update time", &self.last_modified);
        field("Content-Length", &self.size_bytes.map(|s| s.to_string()));
        field("Size", &self.size_human);
        field("Content-Type", &self.content_type);
        field("ETag", &self.etag);
        field("Storage class", &self.storage_class);
        lines.join("\n")
    }
}

/// Execute the stat command
pub async fn execute(args: StatArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    let mut outputs = Vec::new();
    let mut exit = ExitCode::Success;

    for url in &args.urls {
        match stat_url(url, ctx).await {
            Ok(found) => {
                for output in found {
                    if !formatter.is_json() {
                        formatter.println(&output.render());
                    }
                    outputs.push(output);
                }
            }
            Err(e) => {
                formatter.error(&e.to_string());
                if exit == ExitCode::Success {
                    exit = ExitCode::from(&e);
                }
            }
        }
    }

    if formatter.is_json() {
        formatter.json(&outputs);
    }
    exit
}

async fn stat_url(url: &str, ctx: &Context) -> Result<Vec<StatOutput>> {
    let mut expansion = ctx.expander().expand(ExpansionRequest::new(url))?;
    let mut found = Vec::new();
    while let Some(matched) = expansion.next().await? {
        let Some(info) = ops::head_resource(&ctx.stores, &matched.locator).await? else {
            return Err(Error::NoMatches(matched.locator.to_string()));
        };
        found.push(StatOutput::new(matched.locator.to_string(), info));
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsc_core::{Config, StoreRegistry};

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

    #[test]
    fn test_render_stat() {
        let mut info = ObjectInfo::file("docs/a.json", 2048)
            .with_last_modified("2024-03-09T17:05:00Z".parse().unwrap());
        info.content_type = Some("application/json".into());
        info.etag = Some("\"abc123\"".into());

        let output = StatOutput::new("gs://bucket/docs/a.json".into(), info);
        insta::assert_snapshot!(output.render(), @r#"
        gs://bucket/docs/a.json:
            Update time:      2024-03-09T17:05:00Z
            Content-Length:   2048
            Size:             2 KiB
            Content-Type:     application/json
            ETag:             "abc123"
        "#);
    }

    #[tokio::test]
    async fn test_stat_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("absent").to_string_lossy().into_owned();
        let args = StatArgs { urls: vec![url] };
        assert_eq!(execute(args, &context()).await, ExitCode::NotFound);
    }

    #[tokio::test]
    async fn test_stat_local_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"abc").unwrap();
        let url = dir.path().join("*.txt").to_string_lossy().into_owned();

        let found = stat_url(&url, &context()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].size_bytes, Some(3));
        assert_eq!(found[0].content_type.as_deref(), Some("text/plain"));
    }
}
