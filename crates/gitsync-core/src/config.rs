//! Engine configuration
//!
//! A [`SyncConfig`] is assembled once at startup by [`SyncConfigBuilder`] from
//! up to three layers, highest priority first:
//!
//! 1. explicit values (command-line flags and environment variables)
//! 2. a TOML [`ConfigFile`]
//! 3. built-in defaults
//!
//! [`SyncConfigBuilder::build`] validates the merged result; the engine never
//! sees an invalid configuration.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use gitsync_git::Credentials;
use reqwest::Url;
use serde::Deserialize;

use crate::retry::RetryPolicy;
use crate::revision::RefSelector;
use crate::{Error, Result};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for the default failure back-off interval.
const MAX_DEFAULT_FAILURE_INTERVAL: Duration = Duration::from_secs(10);

/// Whether the engine runs one cycle or keeps polling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    OneTime,
    #[default]
    Continuous,
}

/// HTTP method used for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyMethod {
    #[default]
    Get,
    Post,
    Head,
}

impl NotifyMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Head => "HEAD",
        }
    }
}

impl FromStr for NotifyMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "HEAD" => Ok(Self::Head),
            other => Err(Error::config(format!(
                "unsupported notification method '{other}' (expected GET, POST or HEAD)"
            ))),
        }
    }
}

impl fmt::Display for NotifyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how to announce a successful sync
#[derive(Debug, Clone, PartialEq)]
pub struct NotifyConfig {
    pub url: Url,
    pub method: NotifyMethod,
    pub timeout: Duration,
}

/// Immutable engine configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Remote repository URL or path
    pub repo: String,
    pub selector: RefSelector,
    /// Path kept in sync with the remote
    pub dest: PathBuf,
    pub mode: Mode,
    /// Delay between cycles after a successful cycle
    pub interval: Duration,
    /// Delay between cycles after a failed cycle
    pub failure_interval: Duration,
    /// Bound on each probe or materialization
    pub op_timeout: Duration,
    /// Bound on a whole cycle including retries
    pub cycle_timeout: Option<Duration>,
    pub retry: RetryPolicy,
    /// Shallow fetch depth
    pub depth: Option<u32>,
    pub credentials: Option<Credentials>,
    /// Give up continuous mode after this many failed cycles in a row
    pub max_consecutive_failures: Option<u32>,
    pub notify: Option<NotifyConfig>,
}

impl SyncConfig {
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Check the invariants the engine relies on.
    pub fn validate(&self) -> Result<()> {
        if self.repo.trim().is_empty() {
            return Err(Error::config("repository must not be empty"));
        }
        if self.dest.as_os_str().is_empty() {
            return Err(Error::config("destination must not be empty"));
        }
        if self.op_timeout.is_zero() {
            return Err(Error::config("operation timeout must be positive"));
        }
        if self.cycle_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config("cycle timeout must be positive"));
        }
        if self.depth == Some(0) {
            return Err(Error::config("depth must be positive"));
        }
        if self.max_consecutive_failures == Some(0) {
            return Err(Error::config("max failures must be positive"));
        }
        if let Some(notify) = &self.notify
            && notify.timeout.is_zero()
        {
            return Err(Error::config("notification timeout must be positive"));
        }
        self.retry.validate()
    }
}

/// Collects configuration layers and produces a validated [`SyncConfig`]
#[derive(Debug, Clone, Default)]
pub struct SyncConfigBuilder {
    repo: Option<String>,
    selector: Option<String>,
    dest: Option<PathBuf>,
    one_time: Option<bool>,
    interval: Option<Duration>,
    failure_interval: Option<Duration>,
    op_timeout: Option<Duration>,
    cycle_timeout: Option<Duration>,
    max_attempts: Option<u32>,
    depth: Option<u32>,
    username: Option<String>,
    password: Option<String>,
    max_consecutive_failures: Option<u32>,
    notify_url: Option<String>,
    notify_method: Option<NotifyMethod>,
    notify_timeout: Option<Duration>,
    retry: Option<RetryPolicy>,
}

impl SyncConfigBuilder {
    pub fn repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn dest(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    pub fn one_time(mut self, one_time: bool) -> Self {
        self.one_time = Some(one_time);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn failure_interval(mut self, interval: Duration) -> Self {
        self.failure_interval = Some(interval);
        self
    }

    pub fn op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = Some(timeout);
        self
    }

    pub fn cycle_timeout(mut self, timeout: Duration) -> Self {
        self.cycle_timeout = Some(timeout);
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Replace the whole retry policy. `max_attempts` still overrides its
    /// attempt count when set.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn max_consecutive_failures(mut self, failures: u32) -> Self {
        self.max_consecutive_failures = Some(failures);
        self
    }

    pub fn notify_url(mut self, url: impl Into<String>) -> Self {
        self.notify_url = Some(url.into());
        self
    }

    pub fn notify_method(mut self, method: NotifyMethod) -> Self {
        self.notify_method = Some(method);
        self
    }

    pub fn notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = Some(timeout);
        self
    }

    /// Fill every value not set explicitly from `file`.
    pub fn with_file(mut self, file: &ConfigFile) -> Self {
        fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if slot.is_none() {
                slot.clone_from(value);
            }
        }
        let secs = |v: Option<u64>| v.map(Duration::from_secs);

        fill(&mut self.repo, &file.repo);
        fill(&mut self.selector, &file.selector);
        fill(&mut self.dest, &file.dest);
        fill(&mut self.one_time, &file.one_time);
        fill(&mut self.interval, &secs(file.wait));
        fill(&mut self.failure_interval, &secs(file.error_wait));
        fill(&mut self.op_timeout, &secs(file.timeout));
        fill(&mut self.cycle_timeout, &secs(file.cycle_timeout));
        fill(&mut self.max_attempts, &file.max_attempts);
        fill(&mut self.depth, &file.depth);
        fill(&mut self.username, &file.username);
        fill(&mut self.password, &file.password);
        fill(&mut self.max_consecutive_failures, &file.max_failures);
        fill(&mut self.notify_url, &file.callback_url);
        fill(&mut self.notify_method, &file.callback_method);
        fill(&mut self.notify_timeout, &secs(file.callback_timeout));
        self
    }

    /// Apply defaults and validate.
    pub fn build(self) -> Result<SyncConfig> {
        let repo = self
            .repo
            .ok_or_else(|| Error::config("repository is required"))?;
        let dest = self
            .dest
            .ok_or_else(|| Error::config("destination is required"))?;
        let selector = match self.selector {
            Some(s) => RefSelector::new(s)?,
            None => RefSelector::default(),
        };

        let mode = if self.one_time.unwrap_or(false) {
            Mode::OneTime
        } else {
            Mode::Continuous
        };
        let interval = self.interval.unwrap_or(DEFAULT_INTERVAL);
        let failure_interval = self
            .failure_interval
            .unwrap_or_else(|| interval.min(MAX_DEFAULT_FAILURE_INTERVAL));

        let mut retry = self.retry.unwrap_or_default();
        if let Some(attempts) = self.max_attempts {
            retry.max_attempts = attempts;
        }

        let credentials = match (self.username, self.password) {
            (Some(username), password) => Some(Credentials {
                username,
                password: password.unwrap_or_default(),
            }),
            (None, Some(_)) => return Err(Error::config("password given without username")),
            (None, None) => None,
        };

        let notify = match self.notify_url {
            Some(raw) => {
                let url = Url::parse(&raw)
                    .map_err(|e| Error::config(format!("invalid notification URL '{raw}': {e}")))?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(Error::config(format!(
                        "notification URL '{raw}' must use http or https"
                    )));
                }
                Some(NotifyConfig {
                    url,
                    method: self.notify_method.unwrap_or_default(),
                    timeout: self.notify_timeout.unwrap_or(DEFAULT_NOTIFY_TIMEOUT),
                })
            }
            None => None,
        };

        let config = SyncConfig {
            repo,
            selector,
            dest,
            mode,
            interval,
            failure_interval,
            op_timeout: self.op_timeout.unwrap_or(DEFAULT_OP_TIMEOUT),
            cycle_timeout: self.cycle_timeout,
            retry,
            depth: self.depth,
            credentials,
            max_consecutive_failures: self.max_consecutive_failures,
            notify,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Optional TOML configuration file. Every field may be omitted; durations
/// are whole seconds.
///
/// ```toml
/// repo = "https://example.com/site.git"
/// ref = "main"
/// dest = "/srv/site"
/// wait = 30
/// callback_url = "http://localhost:8080/reload"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub repo: Option<String>,
    #[serde(rename = "ref")]
    pub selector: Option<String>,
    pub dest: Option<PathBuf>,
    pub one_time: Option<bool>,
    pub wait: Option<u64>,
    pub error_wait: Option<u64>,
    pub timeout: Option<u64>,
    pub cycle_timeout: Option<u64>,
    pub max_attempts: Option<u32>,
    pub max_failures: Option<u32>,
    pub depth: Option<u32>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub callback_url: Option<String>,
    pub callback_method: Option<NotifyMethod>,
    pub callback_timeout: Option<u64>,
}

impl ConfigFile {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing_is_case_insensitive() {
        assert_eq!("post".parse::<NotifyMethod>().unwrap(), NotifyMethod::Post);
        assert_eq!("HEAD".parse::<NotifyMethod>().unwrap(), NotifyMethod::Head);
        assert!("PUT".parse::<NotifyMethod>().is_err());
    }

    #[test]
    fn test_default_failure_interval_is_capped() {
        let config = SyncConfig::builder()
            .repo("r")
            .dest("d")
            .interval(Duration::from_secs(300))
            .build()
            .unwrap();
        assert_eq!(config.failure_interval, Duration::from_secs(10));

        let config = SyncConfig::builder()
            .repo("r")
            .dest("d")
            .interval(Duration::from_secs(2))
            .build()
            .unwrap();
        assert_eq!(config.failure_interval, Duration::from_secs(2));
    }
}
