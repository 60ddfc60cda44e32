//! Error types for repo-health core.

use std::path::{Path, PathBuf};
use std::{error::Error, fmt, io};

/// Error type for repo-health core operations.
#[derive(Debug)]
pub enum HealthError {
    /// An underlying I/O error.
    Io(io::Error),
    /// A JSON encoding or decoding error.
    Json(serde_json::Error),
    /// Writing an output file failed.
    Write {
        /// File or directory being written.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },
}

impl HealthError {
    /// Wrap an I/O failure that happened while writing `path`.
    pub fn write(path: &Path, source: io::Error) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl fmt::Display for HealthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Json(err) => write!(f, "json error: {err}"),
            Self::Write { path, source } => {
                write!(f, "failed to write {}: {source}", path.display())
            }
        }
    }
}

impl Error for HealthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Write { source, .. } => Some(source),
        }
    }
}

impl From<io::Error> for HealthError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for HealthError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Convenience result type for repo-health core.
pub type Result<T> = std::result::Result<T, HealthError>;
