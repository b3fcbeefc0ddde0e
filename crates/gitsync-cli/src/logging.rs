//! Log subscriber setup

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::error::{CliError, Result};

/// Crates whose events the verbosity flags control.
const OWN_TARGETS: &[&str] = &["git_sync", "gitsync_core", "gitsync_git", "gitsync_fs"];

/// Stream log lines are written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    Stderr,
    Stdout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    /// Net verbosity: `-q` is -1, each `-v` adds one.
    pub verbosity: i8,
    pub target: LogTarget,
}

impl LogConfig {
    fn level(&self) -> &'static str {
        match self.verbosity {
            i8::MIN..=-1 => "warn",
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Filter used when `RUST_LOG` is not set.
    pub fn directives(&self) -> String {
        let level = self.level();
        let mut directives = vec!["warn".to_string()];
        directives.extend(OWN_TARGETS.iter().map(|t| format!("{t}={level}")));
        directives.join(",")
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the verbosity flags.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(config.directives()),
    };

    let writer = match config.target {
        LogTarget::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogTarget::Stdout => BoxMakeWriter::new(std::io::stdout),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .try_init()
        .map_err(|e| CliError::Logging {
            message: e.to_string(),
        })
}
