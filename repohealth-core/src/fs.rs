//! Filesystem seam shared by the analyzer and the report store.

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Read-only filesystem access, mockable in tests.
#[cfg_attr(test, mockall::automock)]
pub trait FileSystem {
    /// Every regular file under `root`, skipping dot-prefixed entries, in
    /// path order.
    fn list_files(&self, root: &Path) -> Result<Vec<PathBuf>>;
    /// Read a UTF-8 file.
    fn read_to_string(&self, path: &Path) -> Result<String>;
    /// Whether a regular file exists at `path`.
    fn is_file(&self, path: &Path) -> bool;
}

/// `FileSystem` backed by `std::fs`.
#[derive(Debug, Default, Clone)]
pub struct StdFileSystem;

impl StdFileSystem {
    /// Create the adapter.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for StdFileSystem {
    fn list_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        collect_files(root, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&entry.path(), files)?;
        } else if file_type.is_file() {
            files.push(entry.path());
        }
    }
    Ok(())
}
