//! Server configuration loaded from the environment.

use std::fmt;
use std::path::PathBuf;

/// Default bind address.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default bind port.
pub const DEFAULT_PORT: u16 = 8888;
/// Default root directory for the filesystem backend.
pub const DEFAULT_DATA_DIR: &str = "tmp/repo-health";
/// Default location of the denormalized index file.
pub const DEFAULT_INDEX_PATH: &str = "docs/tmp/repo-health/index.json";
/// Default cap on list responses.
pub const DEFAULT_LIST_LIMIT: usize = 100;
/// Default blob store name.
pub const DEFAULT_BLOB_STORE: &str = "repo-health";

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Directory tree on local disk.
    Filesystem,
    /// Remote blob service.
    Blob,
}

/// Connection settings for the blob backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobConfig {
    /// Service base URL.
    pub base_url: String,
    /// Store name.
    pub store: String,
    /// Optional bearer token.
    pub token: Option<String>,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            store: DEFAULT_BLOB_STORE.to_string(),
            token: None,
        }
    }
}

/// Complete server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Selected backend.
    pub storage: StorageBackend,
    /// Filesystem backend root.
    pub data_dir: PathBuf,
    /// Index file rebuilt by the filesystem backend; `None` disables it.
    pub index_path: Option<PathBuf>,
    /// Maximum documents returned by a list request.
    pub list_limit: usize,
    /// Blob backend settings.
    pub blob: BlobConfig,
}

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl ServerConfig {
    /// Build configuration from `REPO_HEALTH_*` environment variables.
    #[cfg_attr(test, allow(dead_code))]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("REPO_HEALTH_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup("REPO_HEALTH_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::new("REPO_HEALTH_PORT must be a u16 number"))?,
            None => DEFAULT_PORT,
        };
        let storage = match lookup("REPO_HEALTH_STORAGE")
            .map(|raw| raw.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("") | Some("fs") => StorageBackend::Filesystem,
            Some("blob") => StorageBackend::Blob,
            Some(other) => {
                return Err(ConfigError::new(format!(
                    "REPO_HEALTH_STORAGE must be `fs` or `blob`, got `{other}`"
                )));
            }
        };
        let data_dir = PathBuf::from(
            lookup("REPO_HEALTH_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
        );
        let index_path = match lookup("REPO_HEALTH_INDEX_PATH") {
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => Some(PathBuf::from(raw)),
            None => Some(PathBuf::from(DEFAULT_INDEX_PATH)),
        };
        let list_limit = match lookup("REPO_HEALTH_LIST_LIMIT") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|limit| *limit > 0)
                .ok_or_else(|| {
                    ConfigError::new("REPO_HEALTH_LIST_LIMIT must be a positive number")
                })?,
            None => DEFAULT_LIST_LIMIT,
        };
        let blob = BlobConfig {
            base_url: lookup("REPO_HEALTH_BLOB_URL").unwrap_or_default(),
            store: lookup("REPO_HEALTH_BLOB_STORE")
                .filter(|store| !store.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BLOB_STORE.to_string()),
            token: lookup("REPO_HEALTH_BLOB_TOKEN").filter(|token| !token.is_empty()),
        };
        if storage == StorageBackend::Blob && blob.base_url.trim().is_empty() {
            return Err(ConfigError::new(
                "REPO_HEALTH_BLOB_URL is required when REPO_HEALTH_STORAGE=blob",
            ));
        }

        Ok(Self {
            host,
            port,
            storage,
            data_dir,
            index_path,
            list_limit,
            blob,
        })
    }
}
