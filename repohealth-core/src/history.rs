//! Ordering and indexing of stored report documents.
//!
//! Stored reports are handled as raw JSON values: the store must list
//! documents from older writers without rejecting unknown shapes.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;

use crate::error::{HealthError, Result};

/// Maximum entries kept in a denormalized index file.
pub const INDEX_LIMIT: usize = 200;

/// The `generatedAt` of a document, or `""` when missing or not a string.
pub fn generated_at(document: &Value) -> &str {
    document
        .get("generatedAt")
        .and_then(Value::as_str)
        .unwrap_or("")
}

/// The `repositoryId` of a document, or `""` when missing or not a string.
pub fn repository_id(document: &Value) -> &str {
    document
        .get("repositoryId")
        .and_then(Value::as_str)
        .unwrap_or("")
}

/// Sort documents newest first by their `generatedAt` string.
pub fn sort_newest_first(documents: &mut [Value]) {
    documents.sort_by(|a, b| generated_at(b).cmp(generated_at(a)));
}

/// Parse raw documents, skip the unparseable ones, and keep the `limit`
/// newest.
pub fn recent_reports<I, B>(raw: I, limit: usize) -> Vec<Value>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut documents: Vec<Value> = raw
        .into_iter()
        .filter_map(|bytes| serde_json::from_slice(bytes.as_ref()).ok())
        .collect();
    sort_newest_first(&mut documents);
    documents.truncate(limit);
    documents
}

/// Put `entry` at the head of `index`, replacing any entry for the same
/// repository and timestamp, then re-sort and cap.
pub fn merge_index_entry(index: Vec<Value>, entry: Value, limit: usize) -> Vec<Value> {
    let key = (
        repository_id(&entry).to_string(),
        generated_at(&entry).to_string(),
    );
    let mut merged = Vec::with_capacity(index.len() + 1);
    merged.push(entry);
    merged.extend(index.into_iter().filter(|existing| {
        !existing.is_null()
            && (repository_id(existing), generated_at(existing)) != (key.0.as_str(), key.1.as_str())
    }));
    sort_newest_first(&mut merged);
    merged.truncate(limit);
    merged
}

/// Merge `entry` into the index file at `path`, creating it when missing.
/// An unreadable or invalid index starts over from an empty list.
pub fn update_index_file(path: &Path, entry: Value) -> Result<Vec<Value>> {
    let existing = std::fs::read_to_string(path)
        .ok()
        .and_then(|contents| serde_json::from_str::<Vec<Value>>(&contents).ok())
        .unwrap_or_default();
    let merged = merge_index_entry(existing, entry, INDEX_LIMIT);
    write_index_file(path, &merged)?;
    Ok(merged)
}

/// Write `documents` as a pretty JSON array, creating parent directories.
///
/// The file is written beside its destination and renamed into place, so
/// readers see either the previous index or the new one.
pub fn write_index_file(path: &Path, documents: &[Value]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| HealthError::write(parent, err))?;
    }
    let staging = staging_path(path);
    std::fs::write(&staging, serde_json::to_string_pretty(documents)?)
        .map_err(|err| HealthError::write(&staging, err))?;
    if let Err(err) = std::fs::rename(&staging, path) {
        let _ = std::fs::remove_file(&staging);
        return Err(HealthError::write(path, err));
    }
    Ok(())
}

fn staging_path(path: &Path) -> std::path::PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index.json".to_string());
    path.with_file_name(format!(".{name}.{}.{counter}.tmp", std::process::id()))
}
