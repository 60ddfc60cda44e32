//! Report storage backends.
//!
//! The ingestion service only sees `ReportStore`; the filesystem tree and the
//! remote blob store implement the same key/value contract.

mod blob;
mod fs;

pub use blob::BlobReportStore;
pub use fs::FsReportStore;

use std::fmt;
use std::sync::Arc;

use crate::config::{ServerConfig, StorageBackend};

/// A stored document and the key it lives under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredReport {
    /// Storage key, `<repositoryId>/<stamp>.json`.
    pub key: String,
    /// Raw document bytes as ingested.
    pub bytes: Vec<u8>,
}

/// Key/value storage for report documents.
pub trait ReportStore {
    /// Store `bytes` under `key`, replacing any previous value.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
    /// Every stored document whose key starts with `prefix`.
    fn list(&self, prefix: &str) -> Result<Vec<StoredReport>, StoreError>;
}

/// Shared handle to a storage backend.
pub type SharedStore = Arc<dyn ReportStore + Send + Sync>;

/// Build the backend selected by the configuration.
pub fn store_from_config(config: &ServerConfig) -> SharedStore {
    match config.storage {
        StorageBackend::Filesystem => Arc::new(FsReportStore::new(
            config.data_dir.clone(),
            config.index_path.clone(),
        )),
        StorageBackend::Blob => Arc::new(BlobReportStore::new(config.blob.clone())),
    }
}

/// Storage failure surfaced to callers as an internal error.
#[derive(Debug)]
pub struct StoreError {
    message: String,
}

impl StoreError {
    /// Create an error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::new(format!("io error: {value}"))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(value: reqwest::Error) -> Self {
        Self::new(format!("blob request failed: {value}"))
    }
}

impl From<repohealth_core::HealthError> for StoreError {
    fn from(value: repohealth_core::HealthError) -> Self {
        Self::new(value.to_string())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{ReportStore, StoreError, StoredReport};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// In-memory store for handler tests.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        entries: Mutex<BTreeMap<String, Vec<u8>>>,
    }

    impl MemoryStore {
        pub(crate) fn keys(&self) -> Vec<String> {
            self.entries.lock().expect("store lock").keys().cloned().collect()
        }
    }

    impl ReportStore for MemoryStore {
        fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
            self.entries
                .lock()
                .expect("store lock")
                .insert(key.to_string(), bytes.to_vec());
            Ok(())
        }

        fn list(&self, prefix: &str) -> Result<Vec<StoredReport>, StoreError> {
            Ok(self
                .entries
                .lock()
                .expect("store lock")
                .iter()
                .filter(|(key, _)| key.starts_with(prefix))
                .map(|(key, bytes)| StoredReport {
                    key: key.clone(),
                    bytes: bytes.clone(),
                })
                .collect())
        }
    }

    /// Store whose every call fails.
    pub(crate) struct FailingStore;

    impl ReportStore for FailingStore {
        fn put(&self, _key: &str, _bytes: &[u8]) -> Result<(), StoreError> {
            Err(StoreError::new("disk full"))
        }

        fn list(&self, _prefix: &str) -> Result<Vec<StoredReport>, StoreError> {
            Err(StoreError::new("disk gone"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{StoreError, store_from_config};
    use crate::config::{BlobConfig, ServerConfig, StorageBackend};
    use std::path::PathBuf;

    #[test]
    fn io_errors_keep_their_message() {
        let error: StoreError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert_eq!(error.to_string(), "io error: boom");
    }

    #[test]
    fn builds_filesystem_store_from_config() {
        let root = std::env::temp_dir().join(format!(
            "repohealth_store_config_{}",
            std::process::id()
        ));
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            storage: StorageBackend::Filesystem,
            data_dir: root.clone(),
            index_path: None,
            list_limit: 10,
            blob: BlobConfig::default(),
        };
        let store = store_from_config(&config);
        store.put("r/one.json", b"{}").expect("put");
        assert_eq!(store.list("").expect("list").len(), 1);
        std::fs::remove_dir_all(PathBuf::from(&root)).expect("cleanup");
    }
}
