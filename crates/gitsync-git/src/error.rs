//! Error types for gitsync-git

use std::path::PathBuf;
use std::time::Duration;

/// Result type for gitsync-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gitsync-git operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote {url} unreachable: {message}")]
    RemoteUnreachable { url: String, message: String },

    #[error("Ref '{selector}' not found on {url}")]
    RefNotFound { url: String, selector: String },

    #[error("Revision {revision} not available from {url}")]
    RevisionNotFound { url: String, revision: String },

    #[error("Fetch from {url} failed: {message}")]
    FetchFailed { url: String, message: String },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    #[error("Refusing to export tree entry '{name}'")]
    InvalidTreeEntry { name: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unreachable(url: &str, source: git2::Error) -> Self {
        Self::RemoteUnreachable {
            url: url.to_string(),
            message: source.message().to_string(),
        }
    }
}
