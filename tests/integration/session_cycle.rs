//! Integration tests for full synchronization cycles between local directories

use crate::integration::test_utils::{
    local_endpoint, read_file, session_between, write_file, FlakyEndpoint, NoExecEndpoint,
};
use std::sync::Arc;
use tempfile::TempDir;
use twinsync::endpoint::Endpoint;
use twinsync::error::SessionError;
use twinsync::session::Session;
use twinsync::store::{MemoryStateStore, SledStateStore, StateStore};
use twinsync::tree::Entry;

struct Fixture {
    _temp_dir: TempDir,
    alpha: std::path::PathBuf,
    beta: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let temp_dir = TempDir::new().unwrap();
    let alpha = temp_dir.path().join("alpha");
    let beta = temp_dir.path().join("beta");
    std::fs::create_dir(&alpha).unwrap();
    std::fs::create_dir(&beta).unwrap();
    Fixture {
        _temp_dir: temp_dir,
        alpha,
        beta,
    }
}

fn local_session(fixture: &Fixture, store: Arc<dyn StateStore>) -> Session {
    session_between(
        Arc::new(local_endpoint(&fixture.alpha)),
        Arc::new(local_endpoint(&fixture.beta)),
        store,
    )
}

/// Both sides converge and a second cycle has nothing to do
#[tokio::test]
async fn test_cycle_converges_both_directions() {
    let fixture = fixture();
    write_file(&fixture.alpha, "from_alpha.txt", "alpha content");
    write_file(&fixture.alpha, "docs/readme.md", "# readme");
    write_file(&fixture.beta, "from_beta.txt", "beta content");

    let store = Arc::new(MemoryStateStore::new());
    let mut session = local_session(&fixture, store.clone());

    let first = session.run_cycle().await.unwrap();
    assert!(first.changed());
    assert!(first.conflicts.is_empty());
    assert_eq!(read_file(&fixture.beta, "from_alpha.txt"), "alpha content");
    assert_eq!(read_file(&fixture.beta, "docs/readme.md"), "# readme");
    assert_eq!(read_file(&fixture.alpha, "from_beta.txt"), "beta content");

    let second = session.run_cycle().await.unwrap();
    assert!(!second.changed());
    assert!(second.conflicts.is_empty());
    assert_eq!(store.commits(), 2);
}

/// A deletion on one side removes the entry on the other
#[tokio::test]
async fn test_deletion_propagates() {
    let fixture = fixture();
    write_file(&fixture.alpha, "dir/a.txt", "a");
    write_file(&fixture.alpha, "dir/b.txt", "b");

    let mut session = local_session(&fixture, Arc::new(MemoryStateStore::new()));
    session.run_cycle().await.unwrap();
    assert!(fixture.beta.join("dir/a.txt").exists());

    std::fs::remove_dir_all(fixture.alpha.join("dir")).unwrap();
    let report = session.run_cycle().await.unwrap();
    assert_eq!(report.beta_applied.removed, 3);
    assert!(!fixture.beta.join("dir").exists());
}

/// Divergent edits are reported and neither side is touched
#[tokio::test]
async fn test_divergent_edits_conflict() {
    let fixture = fixture();
    write_file(&fixture.alpha, "doc.txt", "v1");

    let store = Arc::new(MemoryStateStore::new());
    let mut session = local_session(&fixture, store.clone());
    session.run_cycle().await.unwrap();

    write_file(&fixture.alpha, "doc.txt", "alpha edit");
    write_file(&fixture.beta, "doc.txt", "beta's longer edit");
    let report = session.run_cycle().await.unwrap();

    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].path, "doc.txt");
    assert!(!report.changed());
    assert_eq!(read_file(&fixture.alpha, "doc.txt"), "alpha edit");
    assert_eq!(read_file(&fixture.beta, "doc.txt"), "beta's longer edit");

    // The ancestor still holds the last agreed content.
    let state = store.load(session.id()).unwrap();
    match state.ancestor.as_ref().and_then(|tree| tree.lookup("doc.txt")) {
        Some(Entry::File { size, .. }) => assert_eq!(*size, 2),
        other => panic!("unexpected ancestor entry {:?}", other),
    }
}

/// A failed apply leaves the stored ancestor where it was
#[tokio::test]
async fn test_failed_apply_does_not_advance_ancestor() {
    let fixture = fixture();
    write_file(&fixture.alpha, "new.txt", "fresh");

    let store = Arc::new(MemoryStateStore::new());
    let beta = Arc::new(FlakyEndpoint::new(&fixture.beta));
    beta.set_fail_writes(true);
    let mut session = session_between(
        Arc::new(local_endpoint(&fixture.alpha)),
        beta.clone() as Arc<dyn Endpoint>,
        store.clone(),
    );

    let result = session.run_cycle().await;
    match result {
        Err(SessionError::Apply { endpoint, .. }) => assert_eq!(endpoint, "beta"),
        other => panic!("expected apply failure, got {:?}", other.map(|r| r.changed())),
    }
    assert_eq!(store.commits(), 0);
    assert!(store.load(session.id()).unwrap().ancestor.is_none());
    assert!(!fixture.beta.join("new.txt").exists());

    beta.set_fail_writes(false);
    let report = session.run_cycle().await.unwrap();
    assert_eq!(report.beta_applied.files_written, 1);
    assert_eq!(store.commits(), 1);
    assert_eq!(read_file(&fixture.beta, "new.txt"), "fresh");
}

/// A missing beta root is created from alpha
#[tokio::test]
async fn test_missing_root_is_created() {
    let temp_dir = TempDir::new().unwrap();
    let alpha = temp_dir.path().join("alpha");
    let beta = temp_dir.path().join("beta");
    write_file(&alpha, "nested/deep/file.txt", "content");

    let mut session = session_between(
        Arc::new(local_endpoint(&alpha)),
        Arc::new(local_endpoint(&beta)),
        Arc::new(MemoryStateStore::new()),
    );
    let report = session.run_cycle().await.unwrap();
    assert_eq!(report.beta_applied.directories_created, 3);
    assert_eq!(read_file(&beta, "nested/deep/file.txt"), "content");
}

/// State survives a new session over the same persistent store
#[tokio::test]
async fn test_state_persists_across_sessions() {
    let fixture = fixture();
    let state_dir = TempDir::new().unwrap();
    write_file(&fixture.alpha, "kept.txt", "kept");

    {
        let store = Arc::new(SledStateStore::new(state_dir.path()).unwrap());
        let mut session = local_session(&fixture, store);
        session.run_cycle().await.unwrap();
    }

    // Deleting on beta after a restart must propagate, which needs the ancestor.
    std::fs::remove_file(fixture.beta.join("kept.txt")).unwrap();
    let store = Arc::new(SledStateStore::new(state_dir.path()).unwrap());
    let mut session = local_session(&fixture, store);
    let report = session.run_cycle().await.unwrap();
    assert_eq!(report.alpha_applied.removed, 1);
    assert!(!fixture.alpha.join("kept.txt").exists());
}

/// Identical scripts never conflict when only one side stores the executable bit
#[cfg(unix)]
#[tokio::test]
async fn test_executable_files_match_side_without_exec_bit() {
    use std::os::unix::fs::PermissionsExt;

    let fixture = fixture();
    let make_executable = |path: std::path::PathBuf| {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    };
    write_file(&fixture.alpha, "run.sh", "#!/bin/sh\necho run\n");
    make_executable(fixture.alpha.join("run.sh"));
    write_file(&fixture.beta, "run.sh", "#!/bin/sh\necho run\n");

    let mut session = session_between(
        Arc::new(local_endpoint(&fixture.alpha)),
        Arc::new(NoExecEndpoint::new(&fixture.beta)),
        Arc::new(MemoryStateStore::new()),
    );
    let first = session.run_cycle().await.unwrap();
    assert!(first.conflicts.is_empty());
    assert!(!first.changed());

    // Created on both sides after the last agreed state.
    write_file(&fixture.alpha, "tools/build.sh", "make all\n");
    make_executable(fixture.alpha.join("tools/build.sh"));
    write_file(&fixture.beta, "tools/build.sh", "make all\n");
    let second = session.run_cycle().await.unwrap();
    assert!(second.conflicts.is_empty());
    assert!(!second.changed());

    // An edit on the side without the bit keeps alpha's executable flag.
    write_file(&fixture.beta, "run.sh", "#!/bin/sh\necho changed\n");
    let third = session.run_cycle().await.unwrap();
    assert!(third.conflicts.is_empty());
    assert_eq!(third.alpha_applied.files_written, 1);
    let mode = std::fs::metadata(fixture.alpha.join("run.sh")).unwrap().permissions().mode();
    assert_eq!(mode & 0o111, 0o111);
    assert_eq!(read_file(&fixture.alpha, "run.sh"), "#!/bin/sh\necho changed\n");
}
