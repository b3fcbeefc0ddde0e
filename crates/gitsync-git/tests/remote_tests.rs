//! Ref resolution against real upstream repositories

use gitsync_git::{Error, RemoteOptions, list_remote, resolve_ref};
use gitsync_test_utils::Upstream;
use pretty_assertions::assert_eq;
use rstest::rstest;

// ============================================================================
// Listing
// ============================================================================

#[test]
fn test_list_remote_advertises_head_and_main() {
    let upstream = Upstream::new();
    let refs = list_remote(&upstream.url(), &RemoteOptions::default()).unwrap();

    let names: Vec<_> = refs.iter().map(|r| r.name.as_str()).collect();
    assert!(names.contains(&"HEAD"), "refs: {names:?}");
    assert!(names.contains(&"refs/heads/main"), "refs: {names:?}");
}

#[test]
fn test_list_remote_unreachable() {
    let temp = tempfile::TempDir::new().unwrap();
    let missing = temp.path().join("nothing-here");

    let result = list_remote(&missing.to_string_lossy(), &RemoteOptions::default());
    assert!(matches!(result, Err(Error::RemoteUnreachable { .. })));
}

// ============================================================================
// Resolution
// ============================================================================

#[rstest]
#[case("HEAD")]
#[case("main")]
#[case("refs/heads/main")]
fn test_resolve_default_branch(#[case] selector: &str) {
    let upstream = Upstream::new();
    let head = upstream.commit_file("app.txt", "v1");

    let oid = resolve_ref(&upstream.url(), selector, &RemoteOptions::default()).unwrap();
    assert_eq!(oid.to_string(), head);
}

#[test]
fn test_resolve_other_branch() {
    let upstream = Upstream::new();
    let main_head = upstream.head();
    upstream.checkout_new_branch("release");
    let release_head = upstream.commit_file("release.txt", "r1");
    upstream.checkout("main");

    let options = RemoteOptions::default();
    assert_eq!(resolve_ref(&upstream.url(), "release", &options).unwrap().to_string(), release_head);
    assert_eq!(resolve_ref(&upstream.url(), "main", &options).unwrap().to_string(), main_head);
}

#[test]
fn test_resolve_annotated_tag_to_commit() {
    let upstream = Upstream::new();
    let tagged = upstream.commit_file("app.txt", "v1");
    upstream.tag("v1.0");
    upstream.commit_file("app.txt", "v2");

    let oid = resolve_ref(&upstream.url(), "v1.0", &RemoteOptions::default()).unwrap();
    assert_eq!(oid.to_string(), tagged);
}

#[test]
fn test_resolve_follows_new_commits() {
    let upstream = Upstream::new();
    let options = RemoteOptions::default();

    let first = resolve_ref(&upstream.url(), "main", &options).unwrap();
    let second_sha = upstream.commit_file("app.txt", "v2");
    let second = resolve_ref(&upstream.url(), "main", &options).unwrap();

    assert_ne!(first, second);
    assert_eq!(second.to_string(), second_sha);
}

#[test]
fn test_resolve_missing_ref() {
    let upstream = Upstream::new();

    let result = resolve_ref(&upstream.url(), "no-such-branch", &RemoteOptions::default());
    match result {
        Err(Error::RefNotFound { selector, .. }) => assert_eq!(selector, "no-such-branch"),
        other => panic!("expected RefNotFound, got {other:?}"),
    }
}

#[test]
fn test_resolve_fixed_revision_is_not_checked_remotely() {
    let upstream = Upstream::new();
    let sha = upstream.head();

    let oid = resolve_ref(&upstream.url(), &sha, &RemoteOptions::default()).unwrap();
    assert_eq!(oid.to_string(), sha);
}
