//! Integration tests for the session supervisor

use crate::integration::test_utils::{local_endpoint, read_file, session_between, write_file};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::time::timeout;
use twinsync::error::SupervisorError;
use twinsync::session::{CyclePhase, Session, SessionStatus, Supervisor};
use twinsync::store::MemoryStateStore;

const IDLE_POLL: Duration = Duration::from_secs(3600);
const WAIT: Duration = Duration::from_secs(10);

fn session(alpha: &Path, beta: &Path) -> Session {
    session_between(
        Arc::new(local_endpoint(alpha)),
        Arc::new(local_endpoint(beta)),
        Arc::new(MemoryStateStore::new()),
    )
}

async fn wait_until<F>(updates: &mut watch::Receiver<SessionStatus>, condition: F) -> SessionStatus
where
    F: FnMut(&SessionStatus) -> bool,
{
    timeout(WAIT, updates.wait_for(condition))
        .await
        .expect("timed out waiting for session status")
        .expect("session status channel closed")
        .clone()
}

/// Flushing a paused session runs exactly one cycle
#[tokio::test]
async fn test_flush_runs_cycle() {
    let temp_dir = TempDir::new().unwrap();
    let alpha = temp_dir.path().join("alpha");
    let beta = temp_dir.path().join("beta");
    write_file(&alpha, "a.txt", "content");

    let mut supervisor = Supervisor::new();
    let id = supervisor.start(session(&alpha, &beta), IDLE_POLL, true).unwrap();
    assert_eq!(supervisor.status(&id).unwrap().cycles_completed, 0);

    let report = supervisor.flush(&id).await.unwrap();
    assert!(report.changed());
    assert_eq!(read_file(&beta, "a.txt"), "content");

    let status = supervisor.status(&id).unwrap();
    assert_eq!(status.cycles_completed, 1);
    assert_eq!(status.state, CyclePhase::Idle);
    assert!(status.alpha.connected && status.beta.connected);
    assert!(status.paused);

    supervisor.shutdown().await;
    assert!(supervisor.list().is_empty());
}

/// Pause stops automatic cycles and resume restarts them immediately
#[tokio::test]
async fn test_pause_and_resume() {
    let temp_dir = TempDir::new().unwrap();
    let alpha = temp_dir.path().join("alpha");
    let beta = temp_dir.path().join("beta");
    write_file(&alpha, "a.txt", "one");

    let mut supervisor = Supervisor::new();
    let id = supervisor.start(session(&alpha, &beta), IDLE_POLL, false).unwrap();
    let mut updates = supervisor.subscribe(&id).unwrap();

    wait_until(&mut updates, |s| s.cycles_completed >= 1).await;
    assert_eq!(read_file(&beta, "a.txt"), "one");

    supervisor.pause(&id).await.unwrap();
    let paused = wait_until(&mut updates, |s| s.paused).await;
    assert_eq!(paused.cycles_completed, 1);

    write_file(&alpha, "b.txt", "two");
    supervisor.resume(&id).await.unwrap();
    let resumed = wait_until(&mut updates, |s| !s.paused && s.cycles_completed >= 2).await;
    assert!(resumed.last_error.is_none());
    assert_eq!(read_file(&beta, "b.txt"), "two");

    supervisor.shutdown().await;
}

/// Terminated sessions report their final status and accept no commands
#[tokio::test]
async fn test_terminate() {
    let temp_dir = TempDir::new().unwrap();
    let alpha = temp_dir.path().join("alpha");
    let beta = temp_dir.path().join("beta");
    std::fs::create_dir(&alpha).unwrap();

    let mut supervisor = Supervisor::new();
    let id = supervisor.start(session(&alpha, &beta), IDLE_POLL, true).unwrap();
    assert_eq!(supervisor.list().len(), 1);

    let status = supervisor.terminate(&id).await.unwrap();
    assert_eq!(status.state, CyclePhase::Terminated);
    assert!(supervisor.list().is_empty());

    assert_eq!(
        supervisor.flush(&id).await.unwrap_err(),
        SupervisorError::UnknownSession(id.clone())
    );
    assert_eq!(
        supervisor.terminate(&id).await.unwrap_err(),
        SupervisorError::UnknownSession(id)
    );
}

/// The same endpoint pair cannot be started twice
#[tokio::test]
async fn test_duplicate_session_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let alpha = temp_dir.path().join("alpha");
    let beta = temp_dir.path().join("beta");

    let mut supervisor = Supervisor::new();
    let id = supervisor.start(session(&alpha, &beta), IDLE_POLL, true).unwrap();
    let duplicate = supervisor.start(session(&alpha, &beta), IDLE_POLL, true);
    assert_eq!(duplicate.unwrap_err(), SupervisorError::Duplicate(id));

    supervisor.shutdown().await;
}

/// An unreachable endpoint is a transient failure recorded in the status
#[tokio::test]
async fn test_unreachable_endpoint_marks_disconnected() {
    let temp_dir = TempDir::new().unwrap();
    let alpha = temp_dir.path().join("alpha");
    let beta = temp_dir.path().join("missing").join("beta");
    std::fs::create_dir(&alpha).unwrap();

    let mut supervisor = Supervisor::new();
    let id = supervisor.start(session(&alpha, &beta), IDLE_POLL, true).unwrap();

    assert!(matches!(
        supervisor.flush(&id).await,
        Err(SupervisorError::Cycle(_))
    ));
    let status = supervisor.status(&id).unwrap();
    assert!(!status.beta.connected);
    assert_eq!(status.state, CyclePhase::Idle);
    assert!(status.last_error.is_some());
    assert_eq!(status.cycles_completed, 0);

    // Once the parent appears the next flush succeeds.
    std::fs::create_dir(temp_dir.path().join("missing")).unwrap();
    supervisor.flush(&id).await.unwrap();
    let status = supervisor.status(&id).unwrap();
    assert!(status.beta.connected);
    assert!(status.last_error.is_none());

    supervisor.shutdown().await;
}

/// An unsafe symlink halts the session until it is resumed
#[cfg(unix)]
#[tokio::test]
async fn test_unsafe_symlink_halts_session() {
    let temp_dir = TempDir::new().unwrap();
    let alpha = temp_dir.path().join("alpha");
    let beta = temp_dir.path().join("beta");
    std::fs::create_dir(&alpha).unwrap();
    std::os::unix::fs::symlink("/etc/passwd", alpha.join("escape")).unwrap();

    let mut supervisor = Supervisor::new();
    let id = supervisor.start(session(&alpha, &beta), IDLE_POLL, false).unwrap();
    let mut updates = supervisor.subscribe(&id).unwrap();

    let halted = wait_until(&mut updates, |s| s.state == CyclePhase::Halted).await;
    assert!(halted.paused);
    assert!(halted.last_error.as_deref().unwrap_or("").contains("escape"));
    assert!(!beta.exists());

    std::fs::remove_file(alpha.join("escape")).unwrap();
    supervisor.resume(&id).await.unwrap();
    let recovered = wait_until(&mut updates, |s| s.cycles_completed >= 1).await;
    assert!(!recovered.paused);
    assert!(recovered.last_error.is_none());
    assert!(beta.is_dir());

    supervisor.shutdown().await;
}
