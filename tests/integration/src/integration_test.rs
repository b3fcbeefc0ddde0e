//! End-to-end tests for the sync engine with the real git toolchain
//!
//! Each test drives a `SyncEngine` built from `Collaborators::git` against an
//! upstream repository created with the git CLI, and a local HTTP endpoint
//! standing in for the notification listener.

use std::fs;
use std::path::Path;
use std::time::Duration;

use gitsync_core::{
    Collaborators, Phase, RunOutcome, SyncConfig, SyncEngine, SyncResult, Shutdown,
    shutdown_channel,
};
use gitsync_fs::MirrorLayout;
use gitsync_test_utils::{RecordingEndpoint, Upstream};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn engine(config: SyncConfig, shutdown: Shutdown) -> SyncEngine {
    let collaborators = Collaborators::git(&config).unwrap();
    SyncEngine::new(config, collaborators, shutdown).unwrap()
}

fn one_time(upstream: &Upstream, selector: &str, dest: &Path, endpoint: &RecordingEndpoint) -> SyncConfig {
    SyncConfig::builder()
        .repo(upstream.url())
        .selector(selector)
        .dest(dest)
        .one_time(true)
        .notify_url(endpoint.url())
        .build()
        .unwrap()
}

fn updated(outcome: RunOutcome) -> String {
    match outcome {
        RunOutcome::Completed(SyncResult::Updated(revision)) => revision.to_string(),
        other => panic!("expected an update, got {other:?}"),
    }
}

fn revision_count(dest: &Path) -> usize {
    let layout = MirrorLayout::new(dest).unwrap();
    fs::read_dir(layout.revisions_dir()).unwrap().count()
}

// ============================================================================
// One-time mode
// ============================================================================

#[tokio::test]
async fn test_initial_sync_then_update() {
    let upstream = Upstream::new();
    let first = upstream.commit_file("old.txt", "old");
    let endpoint = RecordingEndpoint::start();
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("site");
    fs::create_dir(&dest).unwrap();

    let outcome = engine(one_time(&upstream, "main", &dest, &endpoint), Shutdown::never())
        .run()
        .await;
    assert_eq!(updated(outcome), first);
    assert_eq!(fs::read_to_string(dest.join("old.txt")).unwrap(), "old");
    assert_eq!(endpoint.requests().len(), 1);

    upstream.remove_file("old.txt");
    let second = upstream.commit_file("new.txt", "new");

    let outcome = engine(one_time(&upstream, "main", &dest, &endpoint), Shutdown::never())
        .run()
        .await;
    assert_eq!(updated(outcome), second);
    assert!(!dest.join("old.txt").exists());
    assert_eq!(fs::read_to_string(dest.join("new.txt")).unwrap(), "new");
    assert_eq!(endpoint.requests().len(), 2);
    assert_eq!(revision_count(&dest), 1);
}

#[tokio::test]
async fn test_restart_with_unchanged_remote_is_a_no_op() {
    let upstream = Upstream::new();
    let endpoint = RecordingEndpoint::start();
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("site");

    engine(one_time(&upstream, "HEAD", &dest, &endpoint), Shutdown::never())
        .run()
        .await;

    let mut restarted = engine(one_time(&upstream, "HEAD", &dest, &endpoint), Shutdown::never());
    let outcome = restarted.run().await;

    assert!(matches!(outcome, RunOutcome::Completed(SyncResult::NoChangeDetected)));
    assert_eq!(restarted.state().current.as_ref().map(|r| r.to_string()), Some(upstream.head()));
    assert_eq!(endpoint.requests().len(), 1);
}

#[tokio::test]
async fn test_pinned_tag_and_commit() {
    let upstream = Upstream::new();
    let tagged = upstream.commit_file("app.txt", "v1");
    upstream.tag("v1.0");
    upstream.commit_file("app.txt", "v2");
    let endpoint = RecordingEndpoint::start();
    let temp = TempDir::new().unwrap();

    let by_tag = temp.path().join("by-tag");
    let outcome = engine(one_time(&upstream, "v1.0", &by_tag, &endpoint), Shutdown::never())
        .run()
        .await;
    assert_eq!(updated(outcome), tagged);
    assert_eq!(fs::read_to_string(by_tag.join("app.txt")).unwrap(), "v1");

    let by_sha = temp.path().join("by-sha");
    let outcome = engine(one_time(&upstream, &tagged, &by_sha, &endpoint), Shutdown::never())
        .run()
        .await;
    assert_eq!(updated(outcome), tagged);
    assert_eq!(fs::read_to_string(by_sha.join("app.txt")).unwrap(), "v1");
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_sync() {
    let upstream = Upstream::new();
    let endpoint = RecordingEndpoint::with_status(500);
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("site");

    let mut engine = engine(one_time(&upstream, "main", &dest, &endpoint), Shutdown::never());
    let outcome = engine.run().await;

    assert!(matches!(outcome, RunOutcome::Completed(SyncResult::Updated(_))));
    assert_eq!(endpoint.requests().len(), 1);
    assert_eq!(engine.state().consecutive_failures, 0);
}

#[tokio::test]
async fn test_missing_ref_leaves_no_trace() {
    let upstream = Upstream::new();
    let endpoint = RecordingEndpoint::start();
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("site");

    let outcome = engine(one_time(&upstream, "nope", &dest, &endpoint), Shutdown::never())
        .run()
        .await;

    assert!(!outcome.is_success());
    assert!(!dest.exists());
    assert!(!temp.path().join(".site.gitsync").exists());
    assert!(endpoint.requests().is_empty());
}

// ============================================================================
// Continuous mode
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_continuous_follows_upstream_until_shutdown() {
    let upstream = Upstream::new();
    let endpoint = RecordingEndpoint::start();
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("site");

    let config = SyncConfig::builder()
        .repo(upstream.url())
        .selector("main")
        .dest(&dest)
        .interval(Duration::from_millis(100))
        .notify_url(endpoint.url())
        .build()
        .unwrap();
    let (handle, shutdown) = shutdown_channel();
    let mut engine = engine(config, shutdown);
    let task = tokio::spawn(async move {
        let outcome = engine.run().await;
        (outcome, engine.phase())
    });

    assert!(endpoint.wait_for(1, Duration::from_secs(20)));
    let latest = upstream.commit_file("index.html", "v2");
    assert!(endpoint.wait_for(2, Duration::from_secs(20)));

    handle.trigger();
    let (outcome, phase) = task.await.unwrap();

    assert!(matches!(outcome, RunOutcome::Interrupted));
    assert_eq!(phase, Phase::Terminated);
    assert_eq!(fs::read_to_string(dest.join("index.html")).unwrap(), "v2");
    assert_eq!(
        MirrorLayout::new(&dest).unwrap().current_revision().unwrap(),
        Some(latest)
    );
    assert_eq!(endpoint.requests().len(), 2);
}
