//! Fake collaborators for engine tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gitsync_core::{
    Collaborators, Error, Materializer, NotificationSink, NotifyConfig, RefSelector, Result,
    RetryPolicy, RevisionId, RevisionProbe, Scheduler, Shutdown, ShutdownHandle, SyncConfig,
    SyncConfigBuilder, SyncEngine,
};

pub const INTERVAL: Duration = Duration::from_secs(30);
pub const FAILURE_INTERVAL: Duration = Duration::from_secs(5);

/// Revision id whose hex starts with `prefix`.
pub fn rev(prefix: &str) -> RevisionId {
    RevisionId::new(format!("{prefix:0<40}")).unwrap()
}

pub fn base_config(dest: &Path) -> SyncConfigBuilder {
    SyncConfig::builder()
        .repo("https://git.example.com/site.git")
        .selector("main")
        .dest(dest)
        .interval(INTERVAL)
        .failure_interval(FAILURE_INTERVAL)
        .retry(RetryPolicy::default().without_jitter())
}

pub fn one_time(dest: &Path) -> SyncConfig {
    base_config(dest).one_time(true).build().unwrap()
}

pub fn continuous(dest: &Path) -> SyncConfig {
    base_config(dest).build().unwrap()
}

// ============================================================================
// Probe
// ============================================================================

#[derive(Debug, Clone)]
pub enum ProbeStep {
    Resolve(RevisionId),
    Unreachable,
    NotFound,
    /// Answers after a real-time delay
    Slow(Duration, RevisionId),
    /// Never answers
    Hang,
}

/// Plays back a script of answers, repeating the last one when exhausted.
pub struct ScriptedProbe {
    steps: Mutex<VecDeque<ProbeStep>>,
    last: Mutex<Option<ProbeStep>>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(steps: impl IntoIterator<Item = ProbeStep>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn always(revision: RevisionId) -> Arc<Self> {
        Self::new([ProbeStep::Resolve(revision)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> ProbeStep {
        let mut last = self.last.lock().unwrap();
        if let Some(step) = self.steps.lock().unwrap().pop_front() {
            *last = Some(step);
        }
        last.clone().unwrap_or(ProbeStep::NotFound)
    }
}

#[async_trait]
impl RevisionProbe for ScriptedProbe {
    async fn resolve(&self, remote: &str, selector: &RefSelector) -> Result<RevisionId> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            ProbeStep::Resolve(revision) => Ok(revision),
            ProbeStep::Unreachable => Err(Error::RemoteUnreachable {
                url: remote.to_string(),
                message: "connection refused".to_string(),
            }),
            ProbeStep::NotFound => Err(Error::RefNotFound {
                url: remote.to_string(),
                selector: selector.to_string(),
            }),
            ProbeStep::Slow(delay, revision) => {
                tokio::time::sleep(delay).await;
                Ok(revision)
            }
            ProbeStep::Hang => std::future::pending().await,
        }
    }
}

// ============================================================================
// Materializer
// ============================================================================

/// Records calls and writes a `REVISION` marker into the destination.
#[derive(Default)]
pub struct RecordingMaterializer {
    calls: Mutex<Vec<RevisionId>>,
    transient_failures: AtomicUsize,
    always_conflict: Mutex<bool>,
    shutdown_during: Mutex<Option<ShutdownHandle>>,
}

impl RecordingMaterializer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next `count` calls with a transient error.
    pub fn fail_next(&self, count: usize) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Report foreign content on every call.
    pub fn conflict_always(&self) {
        *self.always_conflict.lock().unwrap() = true;
    }

    /// Request shutdown while the next materialization is in progress.
    pub fn shutdown_during(&self, handle: ShutdownHandle) {
        *self.shutdown_during.lock().unwrap() = Some(handle);
    }

    pub fn calls(&self) -> Vec<RevisionId> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Materializer for RecordingMaterializer {
    async fn materialize(&self, _remote: &str, revision: &RevisionId, dest: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(revision.clone());

        if *self.always_conflict.lock().unwrap() {
            return Err(Error::DestinationConflict {
                path: dest.to_path_buf(),
            });
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::MaterializeFailed {
                revision: revision.to_string(),
                message: "fetch interrupted".to_string(),
            });
        }

        let handle = self.shutdown_during.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.trigger();
            tokio::task::yield_now().await;
        }

        fs::create_dir_all(dest).unwrap();
        fs::write(dest.join("REVISION"), revision.as_str()).unwrap();
        Ok(())
    }
}

// ============================================================================
// Notifier
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<String>>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_always(&self) {
        *self.failing.lock().unwrap() = true;
    }

    /// URLs notified so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, endpoint: &NotifyConfig) -> Result<()> {
        self.calls.lock().unwrap().push(endpoint.url.to_string());
        if *self.failing.lock().unwrap() {
            return Err(Error::NotificationFailed {
                endpoint: endpoint.url.to_string(),
                message: "503 Service Unavailable".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Returns from every sleep at once, recording the requested durations.
#[derive(Default)]
pub struct FakeScheduler {
    sleeps: Mutex<Vec<Duration>>,
    stop: Mutex<Option<(usize, ShutdownHandle)>>,
}

impl FakeScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// On the `count`-th sleep, request shutdown and never wake up.
    pub fn stop_after(&self, count: usize, handle: ShutdownHandle) {
        *self.stop.lock().unwrap() = Some((count, handle));
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Scheduler for FakeScheduler {
    async fn sleep(&self, duration: Duration) {
        let count = {
            let mut sleeps = self.sleeps.lock().unwrap();
            sleeps.push(duration);
            sleeps.len()
        };

        let stopping = match &*self.stop.lock().unwrap() {
            Some((limit, handle)) if count >= *limit => {
                handle.trigger();
                true
            }
            _ => false,
        };

        if stopping {
            std::future::pending::<()>().await;
        }
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Fakes {
    pub probe: Arc<ScriptedProbe>,
    pub materializer: Arc<RecordingMaterializer>,
    pub notifier: Arc<RecordingNotifier>,
    pub scheduler: Arc<FakeScheduler>,
}

impl Fakes {
    pub fn new(probe: Arc<ScriptedProbe>) -> Self {
        Self {
            probe,
            materializer: RecordingMaterializer::new(),
            notifier: RecordingNotifier::new(),
            scheduler: FakeScheduler::new(),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            probe: self.probe.clone(),
            materializer: self.materializer.clone(),
            notifier: self.notifier.clone(),
            scheduler: self.scheduler.clone(),
        }
    }

    pub fn engine(&self, config: SyncConfig) -> SyncEngine {
        self.engine_with_shutdown(config, Shutdown::never())
    }

    pub fn engine_with_shutdown(&self, config: SyncConfig, shutdown: Shutdown) -> SyncEngine {
        SyncEngine::new(config, self.collaborators(), shutdown).unwrap()
    }
}
