//! Error types for gitsync-fs

use std::path::PathBuf;

/// Result type for gitsync-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gitsync-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Destination {path} contains content not managed by git-sync")]
    DestinationConflict { path: PathBuf },

    #[error("Invalid destination {path}: {message}")]
    InvalidDestination { path: PathBuf, message: String },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::LockFailed { .. })
    }
}
