//! Sync state and revision tracking

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gitsync_fs::MirrorLayout;

use crate::engine::SyncResult;
use crate::revision::RevisionId;

/// What the engine knows about its destination for the life of the process.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    /// Revision currently materialized, if known
    pub current: Option<RevisionId>,
    pub last_success: Option<DateTime<Utc>>,
    /// Rendered error of the most recent failed cycle
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    /// Completed cycles, successful or not
    pub cycles: u64,
}

impl SyncState {
    /// Fold the outcome of one cycle into the state.
    pub fn record(&mut self, result: &SyncResult) {
        self.cycles += 1;
        match result {
            SyncResult::NoChangeDetected => {
                self.last_success = Some(Utc::now());
                self.consecutive_failures = 0;
            }
            SyncResult::Updated(revision) => {
                self.current = Some(revision.clone());
                self.last_success = Some(Utc::now());
                self.consecutive_failures = 0;
            }
            SyncResult::Failed(error) => {
                self.last_error = Some(error.to_string());
                self.consecutive_failures += 1;
            }
        }
    }
}

/// Remembers which revision is materialized at each destination.
///
/// Lookups fall back to the destination on disk, so a restarted process
/// resumes from whatever revision the previous one left behind.
#[derive(Debug, Default)]
pub struct StateTracker {
    known: HashMap<PathBuf, RevisionId>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revision materialized at `dest`, or `None` when unknown.
    ///
    /// Inspection failures count as unknown.
    pub fn current_revision(&mut self, dest: &Path) -> Option<RevisionId> {
        if let Some(revision) = self.known.get(dest) {
            return Some(revision.clone());
        }

        let recovered = match inspect(dest) {
            Ok(revision) => revision,
            Err(message) => {
                tracing::debug!(dest = %dest.display(), error = %message, "Could not inspect destination");
                None
            }
        }?;

        tracing::info!(dest = %dest.display(), revision = %recovered, "Recovered materialized revision");
        self.known.insert(dest.to_path_buf(), recovered.clone());
        Some(recovered)
    }

    /// Remember that `revision` is materialized at `dest`. Idempotent.
    pub fn record_revision(&mut self, dest: &Path, revision: RevisionId) {
        self.known.insert(dest.to_path_buf(), revision);
    }
}

fn inspect(dest: &Path) -> Result<Option<RevisionId>, String> {
    let layout = MirrorLayout::new(dest).map_err(|e| e.to_string())?;
    match layout.current_revision().map_err(|e| e.to_string())? {
        Some(name) => RevisionId::new(&name).map(Some).map_err(|e| e.to_string()),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use tempfile::TempDir;

    fn rev(c: char) -> RevisionId {
        RevisionId::new(c.to_string().repeat(40)).unwrap()
    }

    #[test]
    fn test_record_then_lookup() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("dest");
        let mut tracker = StateTracker::new();

        assert_eq!(tracker.current_revision(&dest), None);
        tracker.record_revision(&dest, rev('a'));
        tracker.record_revision(&dest, rev('a'));
        assert_eq!(tracker.current_revision(&dest), Some(rev('a')));
    }

    #[test]
    fn test_recovers_from_disk() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("dest");
        let layout = MirrorLayout::new(&dest).unwrap();
        layout
            .install(rev('b').as_str(), |_| Ok::<(), gitsync_fs::Error>(()))
            .unwrap();

        let mut tracker = StateTracker::new();
        assert_eq!(tracker.current_revision(&dest), Some(rev('b')));
    }

    #[test]
    fn test_foreign_destination_is_unknown() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("dest");
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("file"), "x").unwrap();

        assert_eq!(StateTracker::new().current_revision(&dest), None);
    }

    #[test]
    fn test_state_counts_failures() {
        let mut state = SyncState::default();
        state.record(&SyncResult::Failed(Error::config("x")));
        state.record(&SyncResult::Failed(Error::config("y")));
        assert_eq!(state.consecutive_failures, 2);
        assert_eq!(state.last_error.as_deref(), Some("Invalid configuration: y"));

        state.record(&SyncResult::Updated(rev('c')));
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.current, Some(rev('c')));
        assert_eq!(state.cycles, 3);
        assert!(state.last_success.is_some());
    }
}
