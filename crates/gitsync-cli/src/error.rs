//! Error types for git-sync

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Exit status for a failed sync.
pub const EXIT_FAILURE: i32 = 1;
/// Exit status for configuration and usage errors.
pub const EXIT_USAGE: i32 = 2;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from gitsync-core
    #[error(transparent)]
    Core(#[from] gitsync_core::Error),

    /// The log subscriber could not be installed
    #[error("Cannot set up logging: {message}")]
    Logging { message: String },

    /// Continuous mode hit its consecutive failure limit
    #[error("Giving up after {failures} consecutive failed cycles: {source}")]
    GaveUp {
        failures: u32,
        #[source]
        source: gitsync_core::Error,
    },
}

impl CliError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Core(
                gitsync_core::Error::ConfigInvalid { .. }
                | gitsync_core::Error::Io { .. }
                | gitsync_core::Error::TomlDe(_),
            ) => EXIT_USAGE,
            Self::Logging { .. } => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }
}
