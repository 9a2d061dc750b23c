//! Provider management
//!
//! A provider entry holds the endpoint and credentials used for one URL
//! scheme (`gs://` or `s3://`).

use serde::{Deserialize, Serialize};

use crate::config::ConfigManager;
use crate::error::{Error, Result};
use crate::locator::Provider;

/// Endpoint of the Cloud Storage XML (S3-interoperable) API
pub const GCS_ENDPOINT: &str = "https://storage.googleapis.com";

/// Retry configuration handed to the SDK
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff duration in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_max_backoff() -> u64 {
    10000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

/// Timeout configuration handed to the SDK
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_ms: u64,
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_read_timeout() -> u64 {
    30000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            read_ms: default_read_timeout(),
        }
    }
}

/// Endpoint and credentials for one URL scheme
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// URL scheme this entry serves
    #[serde(rename = "scheme")]
    pub provider: Provider,

    /// Service endpoint; `gs` falls back to [`GCS_ENDPOINT`], `s3` to the
    /// SDK's regional default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Access key ID (HMAC key for Cloud Storage)
    pub access_key: String,

    /// Secret access key
    pub secret_key: String,

    /// Signing region
    #[serde(default = "default_region")]
    pub region: String,

    /// Bucket lookup style: "auto", "path", or "dns"
    #[serde(default = "default_bucket_lookup")]
    pub bucket_lookup: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutConfig>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_bucket_lookup() -> String {
    "auto".to_string()
}

impl ProviderConfig {
    /// Create a provider entry with required fields
    pub fn new(
        provider: Provider,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            endpoint: None,
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: default_region(),
            bucket_lookup: default_bucket_lookup(),
            retry: None,
            timeout: None,
        }
    }

    /// Set an explicit endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Endpoint actually used to reach the service
    pub fn effective_endpoint(&self) -> Option<String> {
        match (&self.endpoint, self.provider) {
            (Some(endpoint), _) => Some(endpoint.clone()),
            (None, Provider::Gs) => Some(GCS_ENDPOINT.to_string()),
            (None, Provider::S3) => None,
        }
    }

    /// Check the endpoint URL and the lookup style
    pub fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.endpoint {
            let parsed = url::Url::parse(endpoint)?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "Endpoint for {}:// must use http or https: {endpoint}",
                    self.provider
                )));
            }
        }
        if !matches!(self.bucket_lookup.as_str(), "auto" | "path" | "dns") {
            return Err(Error::Config(format!(
                "Invalid bucket_lookup '{}': expected auto, path or dns",
                self.bucket_lookup
            )));
        }
        Ok(())
    }

    /// Get the effective retry configuration
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    /// Get the effective timeout configuration
    pub fn timeout_config(&self) -> TimeoutConfig {
        self.timeout.clone().unwrap_or_default()
    }
}

/// Manager for provider entries in the configuration file
pub struct ProviderManager {
    config_manager: ConfigManager,
}

impl ProviderManager {
    /// Create a new ProviderManager with a specific ConfigManager
    pub fn with_config_manager(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// List all configured providers
    pub fn list(&self) -> Result<Vec<ProviderConfig>> {
        Ok(self.config_manager.load()?.providers)
    }

    /// Get the entry for a scheme
    pub fn get(&self, provider: Provider) -> Result<ProviderConfig> {
        self.config_manager
            .load()?
            .providers
            .into_iter()
            .find(|p| p.provider == provider)
            .ok_or_else(|| Error::ProviderNotFound(provider.to_string()))
    }

    /// Add or replace the entry for a scheme
    pub fn set(&self, entry: ProviderConfig) -> Result<()> {
        entry.validate()?;
        let mut config = self.config_manager.load()?;
        config.providers.retain(|p| p.provider != entry.provider);
        config.providers.push(entry);
        self.config_manager.save(&config)
    }

    /// Remove the entry for a scheme
    pub fn remove(&self, provider: Provider) -> Result<()> {
        let mut config = self.config_manager.load()?;
        let original_len = config.providers.len();
        config.providers.retain(|p| p.provider != provider);

        if config.providers.len() == original_len {
            return Err(Error::ProviderNotFound(provider.to_string()));
        }
        self.config_manager.save(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_provider_manager() -> (ProviderManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_manager = ConfigManager::with_path(temp_dir.path().join("config.toml"));
        (ProviderManager::with_config_manager(config_manager), temp_dir)
    }

    #[test]
    fn test_provider_new() {
        let entry = ProviderConfig::new(Provider::S3, "access", "secret");
        assert_eq!(entry.region, "us-east-1");
        assert_eq!(entry.bucket_lookup, "auto");
        assert!(entry.endpoint.is_none());
        assert_eq!(entry.retry_config().max_attempts, 3);
        assert_eq!(entry.timeout_config().read_ms, 30000);
    }

    #[test]
    fn test_effective_endpoint() {
        let gs = ProviderConfig::new(Provider::Gs, "k", "s");
        assert_eq!(gs.effective_endpoint().as_deref(), Some(GCS_ENDPOINT));

        let s3 = ProviderConfig::new(Provider::S3, "k", "s");
        assert_eq!(s3.effective_endpoint(), None);

        let minio = s3.with_endpoint("http://localhost:9000");
        assert_eq!(
            minio.effective_endpoint().as_deref(),
            Some("http://localhost:9000")
        );
    }

    #[test]
    fn test_validate_rejects_bad_endpoints() {
        let entry = ProviderConfig::new(Provider::S3, "k", "s").with_endpoint("not a url");
        assert!(matches!(entry.validate(), Err(Error::Endpoint(_))));

        let entry = ProviderConfig::new(Provider::S3, "k", "s").with_endpoint("ftp://host");
        assert!(matches!(entry.validate(), Err(Error::Config(_))));

        let mut entry = ProviderConfig::new(Provider::S3, "k", "s");
        entry.bucket_lookup = "sideways".into();
        assert!(matches!(entry.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_manager_set_and_get() {
        let (manager, _temp_dir) = temp_provider_manager();
        manager
            .set(ProviderConfig::new(Provider::Gs, "GOOG1", "secret"))
            .unwrap();

        let entry = manager.get(Provider::Gs).unwrap();
        assert_eq!(entry.access_key, "GOOG1");
        assert!(matches!(
            manager.get(Provider::S3),
            Err(Error::ProviderNotFound(_))
        ));
    }

    #[test]
    fn test_manager_set_replaces_existing() {
        let (manager, _temp_dir) = temp_provider_manager();
        manager
            .set(ProviderConfig::new(Provider::S3, "old", "old"))
            .unwrap();
        manager
            .set(ProviderConfig::new(Provider::S3, "new", "new"))
            .unwrap();

        let entries = manager.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].access_key, "new");
    }

    #[test]
    fn test_manager_remove() {
        let (manager, _temp_dir) = temp_provider_manager();
        manager
            .set(ProviderConfig::new(Provider::Gs, "a", "b"))
            .unwrap();
        assert_eq!(manager.list().unwrap().len(), 1);

        manager.remove(Provider::Gs).unwrap();
        assert!(manager.list().unwrap().is_empty());
        assert!(matches!(
            manager.remove(Provider::Gs),
            Err(Error::ProviderNotFound(_))
        ));
    }

    #[test]
    fn test_toml_uses_scheme_key() {
        let entry = ProviderConfig::new(Provider::Gs, "a", "b");
        let text = toml::to_string(&entry).unwrap();
        assert!(text.contains("scheme = \"gs\""));
    }
}
