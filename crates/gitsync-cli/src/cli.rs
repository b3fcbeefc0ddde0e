//! CLI argument parsing using clap derive

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use gitsync_core::{ConfigFile, NotifyMethod, SyncConfig, SyncConfigBuilder};

use crate::error::Result;
use crate::logging::{LogConfig, LogTarget};

/// Keep a directory in sync with a branch, tag or commit of a remote git
/// repository.
///
/// Every option can also be given as a `GIT_SYNC_*` environment variable or
/// in a TOML file passed with `--config`. Flags and environment variables
/// win over the file.
#[derive(Parser, Debug)]
#[command(name = "git-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Remote repository URL or path
    #[arg(long, env = "GIT_SYNC_REPO")]
    pub repo: Option<String>,

    /// Branch, tag, full ref or commit id to sync [default: HEAD]
    #[arg(long = "ref", visible_aliases = ["branch", "rev"], env = "GIT_SYNC_REF")]
    pub selector: Option<String>,

    /// Directory kept in sync (managed as a symbolic link)
    #[arg(long, env = "GIT_SYNC_DEST")]
    pub dest: Option<PathBuf>,

    /// Seconds between polls; 0 polls again as soon as a cycle ends [default: 60]
    #[arg(long, value_name = "SECS", env = "GIT_SYNC_WAIT")]
    pub wait: Option<u64>,

    /// Sync once and exit
    #[arg(long, env = "GIT_SYNC_ONE_TIME")]
    pub one_time: bool,

    /// URL requested after every successful update
    #[arg(long, visible_alias = "webhook-url", env = "GIT_SYNC_CALLBACK_URL")]
    pub callback_url: Option<String>,

    /// HTTP method for the callback (GET, POST or HEAD) [default: GET]
    #[arg(long, env = "GIT_SYNC_CALLBACK_METHOD")]
    pub callback_method: Option<NotifyMethod>,

    /// Seconds before a callback request is abandoned [default: 10]
    #[arg(long, value_name = "SECS", env = "GIT_SYNC_CALLBACK_TIMEOUT")]
    pub callback_timeout: Option<u64>,

    /// Seconds allowed for each remote operation [default: 120]
    #[arg(long, value_name = "SECS", env = "GIT_SYNC_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Seconds allowed for a whole cycle including retries
    #[arg(long, value_name = "SECS", env = "GIT_SYNC_CYCLE_TIMEOUT")]
    pub cycle_timeout: Option<u64>,

    /// Seconds to wait after a failed cycle [default: min(wait, 10)]
    #[arg(long, value_name = "SECS", env = "GIT_SYNC_ERROR_WAIT")]
    pub error_wait: Option<u64>,

    /// Attempts per operation before a cycle fails [default: 3]
    #[arg(long, env = "GIT_SYNC_MAX_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    /// Exit after this many consecutive failed cycles
    #[arg(long, env = "GIT_SYNC_MAX_FAILURES")]
    pub max_failures: Option<u32>,

    /// Shallow fetch depth
    #[arg(long, env = "GIT_SYNC_DEPTH")]
    pub depth: Option<u32>,

    /// Username for HTTP authentication
    #[arg(long, env = "GIT_SYNC_USERNAME")]
    pub username: Option<String>,

    /// Password for HTTP authentication
    #[arg(long, env = "GIT_SYNC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE", env = "GIT_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// More log output (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Where log lines go
    #[arg(long, value_enum, default_value_t = LogTarget::Stderr, env = "GIT_SYNC_LOG_TARGET")]
    pub log_target: LogTarget,
}

impl Cli {
    pub fn log_config(&self) -> LogConfig {
        let verbosity = if self.quiet {
            -1
        } else {
            i8::try_from(self.verbose).unwrap_or(i8::MAX)
        };
        LogConfig {
            verbosity,
            target: self.log_target,
        }
    }

    /// Values given on the command line or in the environment.
    pub fn builder(&self) -> SyncConfigBuilder {
        let mut builder = SyncConfig::builder();
        let secs = Duration::from_secs;

        if let Some(repo) = &self.repo {
            builder = builder.repo(repo);
        }
        if let Some(selector) = &self.selector {
            builder = builder.selector(selector);
        }
        if let Some(dest) = &self.dest {
            builder = builder.dest(dest);
        }
        if self.one_time {
            builder = builder.one_time(true);
        }
        if let Some(wait) = self.wait {
            builder = builder.interval(secs(wait));
        }
        if let Some(wait) = self.error_wait {
            builder = builder.failure_interval(secs(wait));
        }
        if let Some(timeout) = self.timeout {
            builder = builder.op_timeout(secs(timeout));
        }
        if let Some(timeout) = self.cycle_timeout {
            builder = builder.cycle_timeout(secs(timeout));
        }
        if let Some(attempts) = self.max_attempts {
            builder = builder.max_attempts(attempts);
        }
        if let Some(failures) = self.max_failures {
            builder = builder.max_consecutive_failures(failures);
        }
        if let Some(depth) = self.depth {
            builder = builder.depth(depth);
        }
        if let Some(username) = &self.username {
            builder = builder.username(username);
        }
        if let Some(password) = &self.password {
            builder = builder.password(password);
        }
        if let Some(url) = &self.callback_url {
            builder = builder.notify_url(url);
        }
        if let Some(method) = self.callback_method {
            builder = builder.notify_method(method);
        }
        if let Some(timeout) = self.callback_timeout {
            builder = builder.notify_timeout(secs(timeout));
        }
        builder
    }

    /// Merge flags, the config file and defaults into a validated config.
    pub fn sync_config(&self) -> Result<SyncConfig> {
        let mut builder = self.builder();
        if let Some(path) = &self.config {
            let file = ConfigFile::load(path)?;
            tracing::debug!(path = %path.display(), "Loaded config file");
            builder = builder.with_file(&file);
        }
        Ok(builder.build()?)
    }
}
