//! Error types for gitsync-core

use std::path::PathBuf;

/// Result type for gitsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gitsync-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network, authentication or timeout failure talking to the remote
    #[error("Remote {url} unreachable: {message}")]
    RemoteUnreachable { url: String, message: String },

    /// The ref selector does not exist on the remote
    #[error("Ref '{selector}' not found on {url}")]
    RefNotFound { url: String, selector: String },

    /// The toolchain could not produce the revision at the destination
    #[error("Materializing {revision} failed: {message}")]
    MaterializeFailed { revision: String, message: String },

    /// The destination holds content this engine did not produce
    #[error("Destination {path} contains content not managed by git-sync")]
    DestinationConflict { path: PathBuf },

    /// Delivery of the post-sync notification failed
    #[error("Notification to {endpoint} failed: {message}")]
    NotificationFailed { endpoint: String, message: String },

    /// Configuration rejected at startup
    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    /// Config file could not be read
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    /// The cycle was interrupted by a termination signal
    #[error("Interrupted by shutdown")]
    Shutdown,
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    /// Wrap a toolchain failure that happened while materializing `revision`.
    ///
    /// Destination conflicts and revisions the remote does not have keep
    /// their identity; everything else becomes [`Error::MaterializeFailed`].
    pub fn materialize(revision: impl std::fmt::Display, source: impl Into<Error>) -> Self {
        match source.into() {
            e @ (Self::DestinationConflict { .. } | Self::RefNotFound { .. }) => e,
            Self::MaterializeFailed { message, .. } => Self::MaterializeFailed {
                revision: revision.to_string(),
                message,
            },
            other => Self::MaterializeFailed {
                revision: revision.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Whether the retry policy may attempt the operation again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnreachable { .. } | Self::MaterializeFailed { .. }
        )
    }

    /// Short stable name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RemoteUnreachable { .. } => "remote_unreachable",
            Self::RefNotFound { .. } => "ref_not_found",
            Self::MaterializeFailed { .. } => "materialize_failed",
            Self::DestinationConflict { .. } => "destination_conflict",
            Self::NotificationFailed { .. } => "notification_failed",
            Self::ConfigInvalid { .. } | Self::Io { .. } | Self::TomlDe(_) => "config_invalid",
            Self::Shutdown => "shutdown",
        }
    }
}

impl From<gitsync_fs::Error> for Error {
    fn from(err: gitsync_fs::Error) -> Self {
        match err {
            gitsync_fs::Error::DestinationConflict { path } => Self::DestinationConflict { path },
            gitsync_fs::Error::InvalidDestination { path, message } => Self::ConfigInvalid {
                message: format!("destination {}: {message}", path.display()),
            },
            other => Self::MaterializeFailed {
                revision: String::new(),
                message: other.to_string(),
            },
        }
    }
}

impl From<gitsync_git::Error> for Error {
    fn from(err: gitsync_git::Error) -> Self {
        match err {
            gitsync_git::Error::RemoteUnreachable { url, message } => {
                Self::RemoteUnreachable { url, message }
            }
            gitsync_git::Error::RefNotFound { url, selector } => Self::RefNotFound { url, selector },
            gitsync_git::Error::RevisionNotFound { url, revision } => Self::RefNotFound {
                url,
                selector: revision,
            },
            other => Self::MaterializeFailed {
                revision: String::new(),
                message: other.to_string(),
            },
        }
    }
}
