//! Connection settings shared by ref listing and fetching

use std::ffi::c_int;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use git2::{Cred, CredentialType, ProxyOptions, RemoteCallbacks};

use crate::Result;

/// Attempts libgit2 may make at answering one credential challenge.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// HTTP basic credentials for the remote.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// How to talk to a remote.
#[derive(Debug, Clone, Default)]
pub struct RemoteOptions {
    /// Abort transfers running longer than this.
    pub timeout: Option<Duration>,
    /// Shallow fetch depth; `None` fetches full history.
    pub depth: Option<u32>,
    pub credentials: Option<Credentials>,
}

impl RemoteOptions {
    /// Callbacks answering credential challenges.
    ///
    /// Explicit credentials win for user/password challenges, then the ssh
    /// agent, then configured git credential helpers, then libgit2 defaults.
    pub fn callbacks(&self) -> RemoteCallbacks<'_> {
        let mut attempts = 0;
        let mut callbacks = RemoteCallbacks::new();

        callbacks.credentials(move |url, username_from_url, allowed| {
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str("authentication failed"));
            }

            if allowed.contains(CredentialType::USER_PASS_PLAINTEXT)
                && let Some(creds) = &self.credentials
            {
                return Cred::userpass_plaintext(&creds.username, &creds.password);
            }

            if allowed.contains(CredentialType::USERNAME) {
                let username = self
                    .credentials
                    .as_ref()
                    .map(|c| c.username.as_str())
                    .or(username_from_url)
                    .unwrap_or("git");
                return Cred::username(username);
            }

            if allowed.contains(CredentialType::SSH_KEY)
                && let Some(username) = username_from_url
            {
                return Cred::ssh_key_from_agent(username);
            }

            if allowed.contains(CredentialType::USER_PASS_PLAINTEXT)
                && let Ok(config) = git2::Config::open_default()
            {
                return Cred::credential_helper(&config, url, username_from_url);
            }

            Cred::default()
        });

        callbacks
    }

    /// Proxy settings taken from the environment and git config.
    pub fn proxy(&self) -> ProxyOptions<'static> {
        let mut proxy = ProxyOptions::new();
        proxy.auto();
        proxy
    }
}

/// Bound libgit2's socket connect and read timeouts for network transports.
///
/// The setting is process-wide. A stalled server read fails after `timeout`,
/// so a blocking call whose caller stopped waiting still ends.
pub fn set_network_timeout(timeout: Duration) -> Result<()> {
    static WRITER: Mutex<()> = Mutex::new(());

    let millis = c_int::try_from(timeout.as_millis()).unwrap_or(c_int::MAX);
    let _guard = WRITER.lock().unwrap_or_else(PoisonError::into_inner);
    // SAFETY: both options are plain integers that libgit2 reads when a
    // transport opens a socket; writers are serialized by WRITER.
    unsafe {
        git2::opts::set_server_connect_timeout_in_milliseconds(millis)?;
        git2::opts::set_server_timeout_in_milliseconds(millis)?;
    }
    tracing::debug!(timeout_ms = millis, "Network timeout configured");
    Ok(())
}
