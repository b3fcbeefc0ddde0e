//! SyncEngine implementation
//!
//! One cycle runs `Probing → Materializing → Notifying`, skipping straight
//! back to `Idle` when the remote revision is already materialized. In
//! continuous mode cycles repeat until shutdown, separated by the configured
//! interval (or the failure interval after a failed cycle).
//!
//! Waits are cancellable: a shutdown request during a sleep, a retry back-off
//! or a probe ends the run immediately. A materialization that has started is
//! always allowed to finish so the destination is never left mid-swap.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gitsync_git::RemoteOptions;

use crate::config::{Mode, SyncConfig};
use crate::materialize::{GitMaterializer, Materializer};
use crate::notify::{HttpNotifier, NotificationSink};
use crate::probe::{GitRevisionProbe, RevisionProbe};
use crate::revision::RevisionId;
use crate::schedule::{Scheduler, Shutdown, TokioScheduler};
use crate::state::{StateTracker, SyncState};
use crate::{Error, Result};

/// Outcome of one cycle
#[derive(Debug)]
pub enum SyncResult {
    /// The remote revision was already materialized
    NoChangeDetected,
    /// A new revision was materialized
    Updated(RevisionId),
    Failed(Error),
}

impl SyncResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    /// Whether the cycle was cut short by a shutdown request.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Failed(Error::Shutdown))
    }
}

/// How [`SyncEngine::run`] ended
#[derive(Debug)]
pub enum RunOutcome {
    /// One-time mode finished its cycle
    Completed(SyncResult),
    /// Shutdown was requested
    Interrupted,
    /// Continuous mode hit the consecutive failure limit
    GaveUp { failures: u32, error: Error },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        match self {
            Self::Completed(result) => result.is_success(),
            Self::Interrupted => true,
            Self::GaveUp { .. } => false,
        }
    }
}

/// Where the engine currently is in its state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Probing,
    Materializing,
    Notifying,
    Sleeping,
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Probing => "probing",
            Self::Materializing => "materializing",
            Self::Notifying => "notifying",
            Self::Sleeping => "sleeping",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Capabilities the engine drives
#[derive(Clone)]
pub struct Collaborators {
    pub probe: Arc<dyn RevisionProbe>,
    pub materializer: Arc<dyn Materializer>,
    pub notifier: Arc<dyn NotificationSink>,
    pub scheduler: Arc<dyn Scheduler>,
}

impl Collaborators {
    /// Git toolchain, HTTP notifications and wall-clock sleeping.
    ///
    /// Also bounds libgit2's network reads by the operation timeout so a probe
    /// abandoned on timeout does not pin its blocking thread.
    pub fn git(config: &SyncConfig) -> Result<Self> {
        gitsync_git::set_network_timeout(config.op_timeout)?;

        let probe_options = RemoteOptions {
            timeout: None,
            depth: None,
            credentials: config.credentials.clone(),
        };
        let fetch_options = RemoteOptions {
            timeout: Some(config.op_timeout),
            depth: config.depth,
            credentials: config.credentials.clone(),
        };

        Ok(Self {
            probe: Arc::new(GitRevisionProbe::new(probe_options)),
            materializer: Arc::new(GitMaterializer::new(fetch_options)),
            notifier: Arc::new(HttpNotifier::new()?),
            scheduler: Arc::new(TokioScheduler),
        })
    }
}

/// Keeps one destination in sync with one remote ref
pub struct SyncEngine {
    config: SyncConfig,
    collaborators: Collaborators,
    shutdown: Shutdown,
    tracker: StateTracker,
    state: SyncState,
    phase: Phase,
}

impl SyncEngine {
    /// Create an engine. The configuration is validated once more here.
    pub fn new(config: SyncConfig, collaborators: Collaborators, shutdown: Shutdown) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            collaborators,
            shutdown,
            tracker: StateTracker::new(),
            state: SyncState::default(),
            phase: Phase::Idle,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run cycles according to the configured mode until done.
    pub async fn run(&mut self) -> RunOutcome {
        tracing::info!(
            repo = %self.config.repo,
            selector = %self.config.selector,
            dest = %self.config.dest.display(),
            mode = ?self.config.mode,
            "Starting sync"
        );

        let outcome = loop {
            if self.shutdown.is_triggered() {
                break RunOutcome::Interrupted;
            }

            let result = self.run_cycle().await;
            if result.is_interrupted() {
                break RunOutcome::Interrupted;
            }
            if self.config.mode == Mode::OneTime {
                break RunOutcome::Completed(result);
            }

            let delay = if result.is_success() {
                self.config.interval
            } else {
                self.config.failure_interval
            };

            let failures = self.state.consecutive_failures;
            if let SyncResult::Failed(error) = result
                && let Some(max) = self.config.max_consecutive_failures
                && failures >= max
            {
                tracing::error!(failures, "Giving up after consecutive failed cycles");
                break RunOutcome::GaveUp { failures, error };
            }

            self.phase = Phase::Sleeping;
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Waiting for next cycle");
            if self.pause(delay).await.is_err() {
                break RunOutcome::Interrupted;
            }
        };

        self.phase = Phase::Terminated;
        if matches!(outcome, RunOutcome::Interrupted) {
            tracing::info!("Shutdown requested, stopping");
        }
        outcome
    }

    /// Run a single probe-compare-materialize-notify cycle.
    pub async fn run_cycle(&mut self) -> SyncResult {
        let started = Instant::now();
        let result = match self.cycle().await {
            Ok(Some(revision)) => SyncResult::Updated(revision),
            Ok(None) => SyncResult::NoChangeDetected,
            Err(error) => SyncResult::Failed(error),
        };
        self.phase = Phase::Idle;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            SyncResult::NoChangeDetected => tracing::debug!(elapsed_ms, "No change detected"),
            SyncResult::Updated(revision) => {
                tracing::info!(revision = %revision, dest = %self.config.dest.display(), elapsed_ms, "Synced")
            }
            SyncResult::Failed(Error::Shutdown) => {
                tracing::info!(elapsed_ms, "Cycle interrupted");
                return result;
            }
            SyncResult::Failed(error) => {
                tracing::error!(kind = error.kind(), error = %error, elapsed_ms, "Sync failed")
            }
        }

        self.state.record(&result);
        result
    }

    async fn cycle(&mut self) -> Result<Option<RevisionId>> {
        let deadline = self.config.cycle_timeout.map(|t| Instant::now() + t);

        self.phase = Phase::Probing;
        let revision = self
            .retrying("probe", deadline, || self.probe_once(), || Error::RemoteUnreachable {
                url: self.config.repo.clone(),
                message: "cycle timed out before probing".to_string(),
            })
            .await?;
        tracing::debug!(revision = %revision, selector = %self.config.selector, "Resolved remote revision");

        let dest = self.config.dest.clone();
        if self.tracker.current_revision(&dest).as_ref() == Some(&revision) {
            self.state.current = Some(revision);
            return Ok(None);
        }
        if self.shutdown.is_triggered() {
            return Err(Error::Shutdown);
        }

        self.phase = Phase::Materializing;
        self.retrying(
            "materialize",
            deadline,
            || {
                self.collaborators
                    .materializer
                    .materialize(&self.config.repo, &revision, &dest)
            },
            || Error::MaterializeFailed {
                revision: revision.to_string(),
                message: "cycle timed out before materializing".to_string(),
            },
        )
        .await?;
        self.tracker.record_revision(&dest, revision.clone());

        self.phase = Phase::Notifying;
        self.notify().await;

        Ok(Some(revision))
    }

    async fn probe_once(&self) -> Result<RevisionId> {
        let timeout = self.config.op_timeout;
        let probe = self
            .collaborators
            .probe
            .resolve(&self.config.repo, &self.config.selector);
        let mut shutdown = self.shutdown.clone();

        tokio::select! {
            biased;
            _ = shutdown.wait() => Err(Error::Shutdown),
            resolved = tokio::time::timeout(timeout, probe) => match resolved {
                Ok(result) => result,
                Err(_) => Err(Error::RemoteUnreachable {
                    url: self.config.repo.clone(),
                    message: format!("probe timed out after {timeout:?}"),
                }),
            },
        }
    }

    async fn notify(&self) {
        let Some(endpoint) = &self.config.notify else {
            return;
        };

        match self.collaborators.notifier.notify(endpoint).await {
            Ok(()) => tracing::info!(url = %endpoint.url, "Notified"),
            Err(e) => tracing::warn!(url = %endpoint.url, error = %e, "Notification failed"),
        }
    }

    /// Run `op` under the retry policy. Permanent errors and shutdown are
    /// returned at once. No attempt starts once `deadline` has passed; the
    /// cycle then fails with the error built by `expired`.
    async fn retrying<T, F, Fut, E>(
        &self,
        operation: &'static str,
        deadline: Option<Instant>,
        mut op: F,
        expired: E,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        E: Fn() -> Error,
    {
        let mut schedule = self.config.retry.schedule(deadline);
        loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                tracing::warn!(operation, attempt = schedule.attempt(), "Cycle deadline passed");
                return Err(expired());
            }

            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => e,
            };

            let attempt = schedule.attempt();
            let Some(delay) = schedule.next_delay() else {
                tracing::warn!(operation, attempt, error = %error, "Retries exhausted");
                return Err(error);
            };

            tracing::warn!(
                operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient failure, retrying"
            );
            self.pause(delay).await?;
        }
    }

    /// Sleep for `duration` unless shutdown is requested first.
    async fn pause(&self, duration: Duration) -> Result<()> {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            biased;
            _ = shutdown.wait() => Err(Error::Shutdown),
            _ = self.collaborators.scheduler.sleep(duration) => Ok(()),
        }
    }
}
