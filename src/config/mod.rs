use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Upper bound for every backend call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub require_category: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadsConfig {
    #[serde(default = "default_download_dir")]
    pub dir: String,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            dir: default_download_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_identity_endpoint")]
    pub endpoint: String,
    /// Exchanges refresh tokens for new id tokens.
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default = "default_true")]
    pub persist_session: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_identity_endpoint(),
            token_endpoint: default_token_endpoint(),
            persist_session: true,
        }
    }
}

/// Object storage for profile photos.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: default_storage_endpoint(),
            bucket: String::new(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_download_dir() -> String {
    ".".to_string()
}

fn default_identity_endpoint() -> String {
    "https://identitytoolkit.googleapis.com".to_string()
}

fn default_token_endpoint() -> String {
    "https://securetoken.googleapis.com".to_string()
}

fn default_storage_endpoint() -> String {
    "https://firebasestorage.googleapis.com".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend.request_timeout_secs == 0 {
            anyhow::bail!("backend.request_timeout_secs must be greater than 0");
        }
        url::Url::parse(&self.backend.base_url).with_context(|| {
            format!("backend.base_url '{}' is not a valid URL", self.backend.base_url)
        })?;
        url::Url::parse(&self.identity.endpoint).with_context(|| {
            format!("identity.endpoint '{}' is not a valid URL", self.identity.endpoint)
        })?;
        url::Url::parse(&self.identity.token_endpoint).with_context(|| {
            format!(
                "identity.token_endpoint '{}' is not a valid URL",
                self.identity.token_endpoint
            )
        })?;
        url::Url::parse(&self.storage.endpoint).with_context(|| {
            format!("storage.endpoint '{}' is not a valid URL", self.storage.endpoint)
        })?;
        Ok(())
    }

    pub fn download_dir(&self) -> PathBuf {
        PathBuf::from(&self.downloads.dir)
    }
}
