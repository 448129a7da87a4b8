//! Store connection configuration
//!
//! Loaded from a JSON file. Only `endpoint`, `key`, `database` and
//! `container` are required; everything else has a default.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::MasterKey;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid(message.into())
    }
}

/// Connection settings for one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Account endpoint, e.g. `https://account.documents.azure.com:443/`
    pub endpoint: String,

    /// Base64 master key
    pub key: String,

    pub database: String,

    pub container: String,

    /// JSON path of the partition key (default: "/id")
    #[serde(default = "default_partition_key_path")]
    pub partition_key_path: String,

    /// Page size requested per query round trip (default: 100)
    #[serde(default = "default_max_item_count")]
    pub max_item_count: usize,

    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_partition_key_path() -> String {
    "/id".to_string()
}

fn default_max_item_count() -> usize {
    100
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl StoreConfig {
    /// Creates a config with default tunables
    pub fn new(
        endpoint: impl Into<String>,
        key: impl Into<String>,
        database: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            key: key.into(),
            database: database.into(),
            container: container.into(),
            partition_key_path: default_partition_key_path(),
            max_item_count: default_max_item_count(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Reads and validates a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: StoreConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("https://") || self.endpoint.starts_with("http://")) {
            return Err(ConfigError::invalid(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::invalid("database must not be empty"));
        }
        if self.container.trim().is_empty() {
            return Err(ConfigError::invalid("container must not be empty"));
        }
        if !self.partition_key_path.starts_with('/') || self.partition_key_path.len() < 2 {
            return Err(ConfigError::invalid(format!(
                "partition_key_path must look like '/field', got '{}'",
                self.partition_key_path
            )));
        }
        if self.max_item_count == 0 {
            return Err(ConfigError::invalid("max_item_count must be > 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::invalid("request_timeout_secs must be > 0"));
        }
        self.master_key()?;
        Ok(())
    }

    pub fn master_key(&self) -> Result<MasterKey, ConfigError> {
        MasterKey::from_base64(&self.key).map_err(|e| ConfigError::invalid(e.to_string()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Endpoint without trailing slash
    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }
}
