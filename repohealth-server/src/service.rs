//! Report ingestion and listing on top of a `ReportStore`.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use repohealth_core::recent_reports;

use crate::storage::{SharedStore, StoreError};

/// Repository id used when a report does not carry a usable one.
pub const UNKNOWN_REPOSITORY: &str = "unknown";

/// Why an ingest request was rejected.
#[derive(Debug)]
pub enum IngestError {
    /// Empty request body.
    MissingBody,
    /// Body is not JSON.
    InvalidJson,
    /// Body is JSON but not an object.
    InvalidReport,
    /// The backend failed to store the document.
    Storage(StoreError),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBody => write!(f, "Missing body"),
            Self::InvalidJson => write!(f, "Invalid JSON"),
            Self::InvalidReport => write!(f, "Invalid report"),
            Self::Storage(err) => write!(f, "storage failed: {err}"),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<StoreError> for IngestError {
    fn from(value: StoreError) -> Self {
        Self::Storage(value)
    }
}

/// Accepts report documents and serves the most recent ones.
#[derive(Clone)]
pub struct IngestService {
    store: SharedStore,
    list_limit: usize,
}

impl IngestService {
    /// Wrap a store with a cap on list responses.
    pub fn new(store: SharedStore, list_limit: usize) -> Self {
        Self { store, list_limit }
    }

    /// Validate and persist one raw report body, returning its storage key.
    ///
    /// The body is stored byte-for-byte; only the key is derived from it.
    pub fn ingest(&self, body: &[u8], now: DateTime<Utc>) -> Result<String, IngestError> {
        if body.is_empty() {
            return Err(IngestError::MissingBody);
        }
        let document: Value =
            serde_json::from_slice(body).map_err(|_| IngestError::InvalidJson)?;
        if !document.is_object() {
            return Err(IngestError::InvalidReport);
        }

        let key = storage_key(&repository_id_of(&document), now);
        self.store.put(&key, body)?;
        log::info!("stored report {key}");
        Ok(key)
    }

    /// Up to the configured limit of stored reports, newest first.
    pub fn list(&self) -> Result<Vec<Value>, StoreError> {
        let stored = self.store.list("")?;
        Ok(recent_reports(
            stored.iter().map(|report| &report.bytes),
            self.list_limit,
        ))
    }
}

/// Storage key for a report: `<repositoryId>/<stamp>.json`.
pub fn storage_key(repository_id: &str, now: DateTime<Utc>) -> String {
    format!("{repository_id}/{}.json", storage_stamp(now))
}

/// Millisecond UTC timestamp with `:` and `.` replaced so it is safe in paths.
pub fn storage_stamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// Path-safe repository id taken from a report document.
///
/// Strings are used as given, numbers and `true` by their text; anything
/// else falls back to `unknown`. Separators split the id into segments,
/// leading dots are stripped, and empty segments are dropped so the key
/// cannot leave the store's namespace.
pub fn repository_id_of(document: &Value) -> String {
    let raw = match document.get("repositoryId") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(number)) if number.as_f64() != Some(0.0) => number.to_string(),
        Some(Value::Bool(true)) => "true".to_string(),
        _ => String::new(),
    };
    let segments: Vec<&str> = raw
        .split(['/', '\\'])
        .map(|segment| segment.trim_start_matches('.'))
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        UNKNOWN_REPOSITORY.to_string()
    } else {
        segments.join("/")
    }
}
