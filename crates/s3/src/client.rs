//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from gsc-core.
//! Cloud Storage is reached through its S3-interoperable XML endpoint with
//! HMAC credentials, so one adapter serves both `gs://` and `s3://`.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{BucketCannedAcl, ObjectCannedAcl};
use aws_smithy_types::retry::RetryConfig;
use aws_smithy_types::timeout::TimeoutConfig;

use gsc_core::{
    AccessControlPolicy, Error, Grant, ListOptions, ListResult, ObjectInfo, ObjectStore,
    ProviderConfig, Result,
};

/// How a failed request should surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureKind {
    AccessDenied,
    NotFound,
    Transient,
    Other,
}

fn failure_kind(code: Option<&str>, status: Option<u16>) -> FailureKind {
    match (code, status) {
        (
            Some(
                "AccessDenied" | "Forbidden" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"
                | "AllAccessDisabled",
            ),
            _,
        )
        | (_, Some(401 | 403)) => FailureKind::AccessDenied,
        (Some("NoSuchKey" | "NoSuchBucket" | "NotFound"), _) | (_, Some(404)) => {
            FailureKind::NotFound
        }
        (
            Some(
                "SlowDown" | "Throttling" | "RequestTimeout" | "InternalError"
                | "ServiceUnavailable",
            ),
            _,
        )
        | (_, Some(408 | 429 | 500..=599)) => FailureKind::Transient,
        _ => FailureKind::Other,
    }
}

/// Map an SDK failure onto the core error taxonomy
fn classify<E>(err: SdkError<E, HttpResponse>, resource: &str) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let detail = DisplayErrorContext(&err).to_string();
    if matches!(
        err,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_)
    ) {
        return Error::Network(format!("{resource}: {detail}"));
    }

    let status = err.raw_response().map(|r| r.status().as_u16());
    match failure_kind(err.code(), status) {
        FailureKind::AccessDenied => Error::AccessDenied(resource.to_string()),
        FailureKind::NotFound => Error::NotFound(resource.to_string()),
        FailureKind::Transient => Error::Network(format!("{resource}: {detail}")),
        FailureKind::Other => Error::General(format!("{resource}: {detail}")),
    }
}

fn timestamp(dt: &aws_smithy_types::DateTime) -> Option<jiff::Timestamp> {
    jiff::Timestamp::from_second(dt.secs()).ok()
}

fn size_of(len: Option<i64>) -> u64 {
    len.and_then(|n| u64::try_from(n).ok()).unwrap_or(0)
}

/// S3 client wrapper
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    scheme: String,
}

impl S3Client {
    /// Create a new S3 client from a provider entry
    pub async fn new(provider: ProviderConfig) -> Result<Self> {
        provider.validate()?;

        let credentials = aws_credential_types::Credentials::new(
            provider.access_key.clone(),
            provider.secret_key.clone(),
            None,
            None,
            "gsc-static-credentials",
        );

        let retry = provider.retry_config();
        let timeout = provider.timeout_config();

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(provider.region.clone()))
            .retry_config(
                RetryConfig::standard()
                    .with_max_attempts(retry.max_attempts.max(1))
                    .with_initial_backoff(Duration::from_millis(retry.initial_backoff_ms))
                    .with_max_backoff(Duration::from_millis(retry.max_backoff_ms)),
            )
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(Duration::from_millis(timeout.connect_ms))
                    .read_timeout(Duration::from_millis(timeout.read_ms))
                    .build(),
            );

        let endpoint = provider.effective_endpoint();
        if let Some(endpoint) = &endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;

        let path_style = match provider.bucket_lookup.as_str() {
            "path" => true,
            "dns" => false,
            _ => endpoint.is_some(),
        };
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(path_style)
            .build();

        tracing::debug!(
            scheme = %provider.provider,
            endpoint = ?endpoint,
            path_style,
            "created storage client"
        );

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            scheme: provider.provider.to_string(),
        })
    }

    fn url(&self, bucket: &str, key: &str) -> String {
        format!("{}://{bucket}/{key}", self.scheme)
    }
}

fn policy_from(
    owner: Option<&aws_sdk_s3::types::Owner>,
    grants: &[aws_sdk_s3::types::Grant],
) -> AccessControlPolicy {
    let owner = owner.and_then(|o| o.display_name().or(o.id()).map(str::to_string));
    let grants = grants
        .iter()
        .map(|g| {
            let grantee = g
                .grantee()
                .and_then(|who| {
                    who.display_name()
                        .or(who.email_address())
                        .or(who.id())
                        .or(who.uri())
                })
                .unwrap_or("unknown")
                .to_string();
            Grant {
                grantee,
                permission: g
                    .permission()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default(),
            }
        })
        .collect();
    AccessControlPolicy { owner, grants }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_buckets(&self) -> Result<Vec<ObjectInfo>> {
        let response = self
            .inner
            .list_buckets()
            .send()
            .await
            .map_err(|e| classify(e, &format!("{}://", self.scheme)))?;

        let buckets = response
            .buckets()
            .iter()
            .map(|b| {
                let mut info = ObjectInfo::bucket(b.name().unwrap_or_default());
                info.last_modified = b.creation_date().and_then(timestamp);
                info
            })
            .collect();
        Ok(buckets)
    }

    async fn list_objects(&self, bucket: &str, options: ListOptions) -> Result<ListResult> {
        let mut request = self.inner.list_objects_v2().bucket(bucket);
        if let Some(prefix) = &options.prefix {
            request = request.prefix(prefix);
        }
        if let Some(delimiter) = &options.delimiter {
            request = request.delimiter(delimiter);
        }
        if let Some(max) = options.max_keys {
            request = request.max_keys(max);
        }
        if let Some(token) = &options.continuation_token {
            request = request.continuation_token(token);
        }

        let prefix = options.prefix.as_deref().unwrap_or_default();
        let response = request
            .send()
            .await
            .map_err(|e| classify(e, &self.url(bucket, prefix)))?;

        let mut items = Vec::new();
        for object in response.contents() {
            let key = object.key().unwrap_or_default();
            let mut info = ObjectInfo::file(key, size_of(object.size()));
            info.last_modified = object.last_modified().and_then(timestamp);
            info.etag = object.e_tag().map(|t| t.trim_matches('"').to_string());
            info.storage_class = object.storage_class().map(|sc| sc.as_str().to_string());
            items.push(info);
        }
        for common in response.common_prefixes() {
            if let Some(p) = common.prefix() {
                items.push(ObjectInfo::dir(p));
            }
        }

        Ok(ListResult {
            items,
            truncated: response.is_truncated().unwrap_or(false),
            continuation_token: response.next_continuation_token().map(str::to_string),
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        let response = self
            .inner
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(e, &self.url(bucket, key)))?;

        let mut info = ObjectInfo::file(key, size_of(response.content_length()));
        info.last_modified = response.last_modified().and_then(timestamp);
        info.etag = response.e_tag().map(|t| t.trim_matches('"').to_string());
        info.content_type = response.content_type().map(str::to_string);
        info.storage_class = response.storage_class().map(|sc| sc.as_str().to_string());
        Ok(info)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let url = self.url(bucket, key);
        let response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(e, &url))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| Error::Network(format!("{url}: {e}")))?
            .into_bytes()
            .to_vec();
        Ok(data)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<ObjectInfo> {
        let size = data.len() as u64;
        let mut request = self
            .inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(aws_sdk_s3::primitives::ByteStream::from(data));
        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify(e, &self.url(bucket, key)))?;

        let mut info = ObjectInfo::file(key, size).with_last_modified(jiff::Timestamp::now());
        info.etag = response.e_tag().map(|t| t.trim_matches('"').to_string());
        Ok(info)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.inner
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(e, &self.url(bucket, key)))?;
        Ok(())
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<ObjectInfo> {
        let response = self
            .inner
            .copy_object()
            .copy_source(format!("{src_bucket}/{src_key}"))
            .bucket(dst_bucket)
            .key(dst_key)
            .send()
            .await
            .map_err(|e| classify(e, &self.url(src_bucket, src_key)))?;

        // copy responses carry no size
        let mut info = self.head_object(dst_bucket, dst_key).await?;
        if let Some(etag) = response.copy_object_result().and_then(|r| r.e_tag()) {
            info.etag = Some(etag.trim_matches('"').to_string());
        }
        Ok(info)
    }

    async fn get_bucket_acl(&self, bucket: &str) -> Result<AccessControlPolicy> {
        let response = self
            .inner
            .get_bucket_acl()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| classify(e, &self.url(bucket, "")))?;
        Ok(policy_from(response.owner(), response.grants()))
    }

    async fn set_bucket_acl(&self, bucket: &str, canned: &str) -> Result<()> {
        self.inner
            .put_bucket_acl()
            .bucket(bucket)
            .acl(BucketCannedAcl::from(canned))
            .send()
            .await
            .map_err(|e| classify(e, &self.url(bucket, "")))?;
        Ok(())
    }

    async fn get_object_acl(&self, bucket: &str, key: &str) -> Result<AccessControlPolicy> {
        let response = self
            .inner
            .get_object_acl()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(e, &self.url(bucket, key)))?;
        Ok(policy_from(response.owner(), response.grants()))
    }

    async fn set_object_acl(&self, bucket: &str, key: &str, canned: &str) -> Result<()> {
        self.inner
            .put_object_acl()
            .bucket(bucket)
            .key(key)
            .acl(ObjectCannedAcl::from(canned))
            .send()
            .await
            .map_err(|e| classify(e, &self.url(bucket, key)))?;
        Ok(())
    }
}
