//! Integration tests for applying transitions to local endpoints

use crate::integration::test_utils::{local_endpoint, read_file, write_file};
use tempfile::TempDir;
use twinsync::error::ApplyError;
use twinsync::sync::{apply, Change};
use twinsync::tree::hasher::Blake3Hasher;
use twinsync::tree::{ContentHasher, Entry};

fn file_entry(content: &str) -> Entry {
    Entry::file(Blake3Hasher.digest_bytes(content.as_bytes()), false, content.len() as u64)
}

struct Pair {
    _temp_dir: TempDir,
    target: std::path::PathBuf,
    source: std::path::PathBuf,
}

fn pair() -> Pair {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("target");
    let source = temp_dir.path().join("source");
    std::fs::create_dir(&target).unwrap();
    std::fs::create_dir(&source).unwrap();
    Pair {
        _temp_dir: temp_dir,
        target,
        source,
    }
}

/// A file replaced in place when the destination still holds the scanned content
#[tokio::test]
async fn test_update_applies_over_scanned_content() {
    let pair = pair();
    write_file(&pair.target, "f", "scanned");
    write_file(&pair.source, "f", "from source");

    let change = Change::new("f", Some(file_entry("scanned")), Some(file_entry("from source")));
    let report = apply(
        &local_endpoint(&pair.target),
        &local_endpoint(&pair.source),
        &Blake3Hasher,
        &[change],
    )
    .await
    .unwrap();
    assert_eq!(report.files_written, 1);
    assert_eq!(read_file(&pair.target, "f"), "from source");
}

/// An edit made on the destination after scanning is never overwritten
#[tokio::test]
async fn test_update_refuses_edited_destination() {
    let pair = pair();
    write_file(&pair.source, "f", "from source");
    write_file(&pair.target, "f", "edited after scan");

    let change = Change::new("f", Some(file_entry("scanned")), Some(file_entry("from source")));
    let err = apply(
        &local_endpoint(&pair.target),
        &local_endpoint(&pair.source),
        &Blake3Hasher,
        &[change],
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApplyError::TargetChanged { ref path } if path == "f"));
    assert_eq!(read_file(&pair.target, "f"), "edited after scan");
}

/// A removal is skipped once the destination file no longer matches
#[tokio::test]
async fn test_removal_refuses_edited_destination() {
    let pair = pair();
    write_file(&pair.target, "dir/keep.txt", "edited after scan");

    let scanned = Entry::directory([("keep.txt", file_entry("scanned"))]);
    let err = apply(
        &local_endpoint(&pair.target),
        &local_endpoint(&pair.source),
        &Blake3Hasher,
        &[Change::new("dir", Some(scanned), None)],
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApplyError::TargetChanged { ref path } if path == "dir/keep.txt"));
    assert_eq!(read_file(&pair.target, "dir/keep.txt"), "edited after scan");
}

/// A file created where the scan saw nothing is left alone
#[tokio::test]
async fn test_creation_refuses_occupied_destination() {
    let pair = pair();
    write_file(&pair.source, "new.txt", "from source");
    write_file(&pair.target, "new.txt", "created after scan");

    let err = apply(
        &local_endpoint(&pair.target),
        &local_endpoint(&pair.source),
        &Blake3Hasher,
        &[Change::new("new.txt", None, Some(file_entry("from source")))],
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApplyError::TargetChanged { .. }));
    assert_eq!(read_file(&pair.target, "new.txt"), "created after scan");
}

/// A directory replaced by a file after scanning is not removed
#[tokio::test]
async fn test_removal_refuses_kind_change() {
    let pair = pair();
    write_file(&pair.target, "d", "now a file");

    let err = apply(
        &local_endpoint(&pair.target),
        &local_endpoint(&pair.source),
        &Blake3Hasher,
        &[Change::new("d", Some(Entry::empty_directory()), None)],
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApplyError::TargetChanged { .. }));
    assert!(pair.target.join("d").is_file());
}
