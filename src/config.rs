//! WolfBrowse Configuration
//!
//! Configuration is read from an optional TOML file and then overridden by
//! environment variables, so a container can be configured with nothing but
//! `AWS_*` variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Longest expiry S3 accepts for a SigV4 presigned URL (7 days)
pub const MAX_PRESIGN_EXPIRY_SECS: u32 = 604_800;

/// Main WolfBrowse configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Object storage connection
    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Browsing behaviour
    #[serde(default)]
    pub browse: BrowseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Object storage connection configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Bucket to browse
    #[serde(default)]
    pub bucket: String,

    /// Region used for request signing
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint for S3-compatible services (MinIO, WolfDisk, ...)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Static access key (falls back to the default credential chain)
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Static secret key
    #[serde(default)]
    pub secret_access_key: Option<String>,

    /// Use path-style addressing (required by most custom endpoints)
    #[serde(default)]
    pub path_style: bool,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Enable CORS
    #[serde(default)]
    pub cors_enabled: bool,

    /// Directory holding the web UI (index.html + assets)
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

/// Browsing behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowseConfig {
    /// Scope all browsing to this subtree of the bucket
    #[serde(default)]
    pub base_directory: String,

    /// Lifetime of presigned download URLs in seconds
    #[serde(default = "default_presign_expiry_secs")]
    pub presign_expiry_secs: u32,

    /// Maximum concurrent enrichment tasks per listing (0 = unbounded)
    #[serde(default)]
    pub listing_concurrency: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_storage() -> StorageConfig {
    StorageConfig {
        region: default_region(),
        ..StorageConfig::default()
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_presign_expiry_secs() -> u32 {
    3600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: false,
            static_dir: None,
        }
    }
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            base_directory: String::new(),
            presign_expiry_secs: default_presign_expiry_secs(),
            listing_concurrency: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            storage: default_storage(),
            server: ServerConfig::default(),
            browse: BrowseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl BrowserConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: BrowserConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration the way the server does at startup: the file if it
    /// exists, defaults otherwise, then environment overrides, then validation.
    pub fn load(path: Option<&std::path::Path>) -> crate::Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content)?
            }
            Some(p) => {
                tracing::debug!("Config file {:?} not found, using defaults", p);
                BrowserConfig::default()
            }
            None => BrowserConfig::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment-style overrides. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("AWS_REGION") {
            self.storage.region = v;
        }
        if let Some(v) = get("AWS_ACCESS_KEY_ID") {
            self.storage.access_key_id = Some(v);
        }
        if let Some(v) = get("AWS_SECRET_ACCESS_KEY") {
            self.storage.secret_access_key = Some(v);
        }
        if let Some(v) = get("AWS_BUCKET") {
            self.storage.bucket = v;
        }
        if let Some(v) = get("AWS_ENDPOINT") {
            self.storage.endpoint = Some(v);
            // Custom endpoints almost never support virtual-hosted buckets
            self.storage.path_style = true;
        }
        if let Some(v) = get("SERVER_PORT") {
            let host = self
                .server
                .bind_address
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.server.bind_address = format!("{}:{}", host, v);
        }
        if let Some(v) = get("BASE_DIRECTORY") {
            self.browse.base_directory = v;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.storage.bucket.is_empty() {
            return Err(crate::Error::Config(
                "storage.bucket cannot be empty (set it in the config file or AWS_BUCKET)".into(),
            ));
        }

        if self.server.bind_address.is_empty() {
            return Err(crate::Error::Config("server.bind_address cannot be empty".into()));
        }

        if self.browse.presign_expiry_secs == 0
            || self.browse.presign_expiry_secs > MAX_PRESIGN_EXPIRY_SECS
        {
            return Err(crate::Error::Config(format!(
                "browse.presign_expiry_secs must be between 1 and {}",
                MAX_PRESIGN_EXPIRY_SECS
            )));
        }

        if self.storage.access_key_id.is_some() != self.storage.secret_access_key.is_some() {
            return Err(crate::Error::Config(
                "storage.access_key_id and storage.secret_access_key must be set together".into(),
            ));
        }

        Ok(())
    }

    /// Base directory with surrounding slashes removed
    pub fn base_directory(&self) -> &str {
        self.browse.base_directory.trim_matches('/')
    }

    /// Get presign expiry as Duration
    pub fn presign_expiry(&self) -> Duration {
        Duration::from_secs(u64::from(self.browse.presign_expiry_secs))
    }
}
