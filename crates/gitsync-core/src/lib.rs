//! Synchronization engine for git-sync
//!
//! Keeps a local directory pointed at the latest revision of a remote ref:
//!
//! - [`RevisionProbe`] resolves the ref on the remote
//! - [`StateTracker`] knows what is materialized locally
//! - [`Materializer`] swaps a new revision into place atomically
//! - [`NotificationSink`] announces each successful update
//! - [`SyncEngine`] drives the cycle, retries and the run loop
//!
//! Every capability is a trait so tests can substitute fakes; the git and
//! HTTP implementations are used by the `git-sync` binary.

pub mod config;
pub mod engine;
pub mod error;
pub mod materialize;
pub mod notify;
pub mod probe;
pub mod retry;
pub mod revision;
pub mod schedule;
pub mod state;

pub use config::{ConfigFile, Mode, NotifyConfig, NotifyMethod, SyncConfig, SyncConfigBuilder};
pub use engine::{Collaborators, Phase, RunOutcome, SyncEngine, SyncResult};
pub use error::{Error, Result};
pub use materialize::{GitMaterializer, Materializer};
pub use notify::{HttpNotifier, NotificationSink};
pub use probe::{GitRevisionProbe, RevisionProbe};
pub use retry::{RetryPolicy, RetrySchedule};
pub use revision::{RefSelector, RevisionId};
pub use schedule::{Scheduler, Shutdown, ShutdownHandle, TokioScheduler, shutdown_channel};
pub use state::{StateTracker, SyncState};
