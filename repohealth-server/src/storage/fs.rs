//! Filesystem-tree report store with a denormalized recent index.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use repohealth_core::history::{INDEX_LIMIT, recent_reports, write_index_file};
use repohealth_core::{FileSystem, StdFileSystem};

use super::{ReportStore, StoreError, StoredReport};

/// Stores each report as `<root>/<key>` and, when configured, rebuilds an
/// index of the newest reports after every write.
#[derive(Debug, Clone)]
pub struct FsReportStore {
    root: PathBuf,
    index_path: Option<PathBuf>,
    fs: StdFileSystem,
    index_lock: Arc<Mutex<()>>,
}

impl FsReportStore {
    /// Create a store rooted at `root`.
    pub fn new(root: PathBuf, index_path: Option<PathBuf>) -> Self {
        Self {
            root,
            index_path,
            fs: StdFileSystem::new(),
            index_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Recompute the index file from every report on disk.
    ///
    /// Rebuilds are serialized, so the last one to run sees every report
    /// written before it started.
    pub fn rebuild_index(&self) -> Result<(), StoreError> {
        let Some(index_path) = &self.index_path else {
            return Ok(());
        };
        let _guard = self.index_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let stored = self.list("")?;
        let documents = recent_reports(stored.iter().map(|report| &report.bytes), INDEX_LIMIT);
        write_index_file(index_path, &documents)?;
        Ok(())
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments: Vec<String> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(segments.join("/"))
    }
}

impl ReportStore for FsReportStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = key
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_atomically(&path, bytes)?;

        if let Err(err) = self.rebuild_index() {
            log::warn!("failed to refresh report index: {err}");
        }
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<StoredReport>, StoreError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut reports = Vec::new();
        for path in self.fs.list_files(&self.root)? {
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = self.key_for(&path) else {
                continue;
            };
            if !key.starts_with(prefix) {
                continue;
            }
            match std::fs::read(&path) {
                Ok(bytes) => reports.push(StoredReport { key, bytes }),
                Err(err) => log::warn!("skipping unreadable report {}: {err}", path.display()),
            }
        }
        reports.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(reports)
    }
}

/// Write through a hidden staging file so listings never see partial reports.
fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = path.with_file_name(format!(
        ".{name}.{}.{}.tmp",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::write(&staging, bytes)?;
    std::fs::rename(&staging, path).inspect_err(|_| {
        let _ = std::fs::remove_file(&staging);
    })
}
