//! Integration tests for persisted session state

use crate::integration::test_utils::{write_file, CountingHasher};
use tempfile::TempDir;
use twinsync::cache::Cache;
use twinsync::store::{SessionState, SledStateStore, StateStore};
use twinsync::tree::{scan, ScanOptions};

fn scanned_state(root: &std::path::Path) -> SessionState {
    let hasher = CountingHasher::default();
    let output = scan(root, &hasher, &Cache::new(), &ScanOptions::default()).unwrap();
    SessionState {
        ancestor: output.tree,
        alpha_cache: output.cache.clone(),
        beta_cache: output.cache,
    }
}

/// A scanned tree and its cache survive a store reopen unchanged
#[test]
fn test_scanned_state_roundtrip() {
    let data = TempDir::new().unwrap();
    write_file(data.path(), "a.txt", "alpha");
    write_file(data.path(), "nested/dir/b.txt", "beta");
    std::fs::create_dir(data.path().join("empty")).unwrap();
    let state = scanned_state(data.path());

    let store_dir = TempDir::new().unwrap();
    let id = "roundtrip".to_string();
    {
        let store = SledStateStore::new(store_dir.path()).unwrap();
        store.commit(&id, &state).unwrap();
    }

    let store = SledStateStore::new(store_dir.path()).unwrap();
    let loaded = store.load(&id).unwrap();
    assert_eq!(loaded, state);

    // The restored cache still short-circuits hashing.
    let hasher = CountingHasher::default();
    let rescan = scan(data.path(), &hasher, &loaded.alpha_cache, &ScanOptions::default()).unwrap();
    assert_eq!(hasher.calls(), 0);
    assert_eq!(rescan.tree, loaded.ancestor);
}

/// Sessions are stored independently of one another
#[test]
fn test_sessions_are_isolated() {
    let data = TempDir::new().unwrap();
    write_file(data.path(), "file", "content");
    let state = scanned_state(data.path());

    let store = SledStateStore::temporary().unwrap();
    let first = "first".to_string();
    let second = "second".to_string();
    store.commit(&first, &state).unwrap();
    store.commit(&second, &SessionState::default()).unwrap();
    assert_eq!(store.sessions().unwrap(), vec![first.clone(), second.clone()]);

    store.remove(&first).unwrap();
    assert_eq!(store.sessions().unwrap(), vec![second.clone()]);
    assert_eq!(store.load(&second).unwrap(), SessionState::default());
    assert_eq!(store.load(&first).unwrap(), SessionState::default());
}

/// A later commit fully replaces the earlier state
#[test]
fn test_commit_replaces_state() {
    let data = TempDir::new().unwrap();
    write_file(data.path(), "one", "1");
    let before = scanned_state(data.path());
    write_file(data.path(), "two", "2");
    let after = scanned_state(data.path());

    let store = SledStateStore::temporary().unwrap();
    let id = "replace".to_string();
    store.commit(&id, &before).unwrap();
    store.commit(&id, &after).unwrap();
    let loaded = store.load(&id).unwrap();
    assert_eq!(loaded, after);
    assert_eq!(loaded.alpha_cache.len(), 2);
}
