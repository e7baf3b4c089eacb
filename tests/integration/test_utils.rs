//! Shared fixtures for integration tests

use async_trait::async_trait;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use twinsync::cache::Cache;
use twinsync::endpoint::{Endpoint, LocalEndpoint, Occupant};
use twinsync::error::EndpointError;
use twinsync::session::{session_id, Session};
use twinsync::store::StateStore;
use twinsync::sync::strip_executability;
use twinsync::tree::hasher::Blake3Hasher;
use twinsync::tree::{ContentHasher, ScanOptions, ScanOutput};
use twinsync::types::Digest;

/// Hasher that counts how many files it digested
#[derive(Default)]
pub struct CountingHasher {
    calls: AtomicUsize,
}

impl CountingHasher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ContentHasher for CountingHasher {
    fn digest_reader(&self, reader: &mut dyn Read) -> std::io::Result<Digest> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Blake3Hasher.digest_reader(reader)
    }
}

/// Write `content` at `relative` under `root`, creating parents
pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

pub fn read_file(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join(relative)).unwrap()
}

pub fn local_endpoint(root: &Path) -> LocalEndpoint {
    LocalEndpoint::new(root, Arc::new(Blake3Hasher), ScanOptions::default())
}

/// Build a session between two endpoints sharing `store`
pub fn session_between(
    alpha: Arc<dyn Endpoint>,
    beta: Arc<dyn Endpoint>,
    store: Arc<dyn StateStore>,
) -> Session {
    let id = session_id(&alpha.describe(), &beta.describe());
    Session::new(id, alpha, beta, Arc::new(Blake3Hasher), store)
}

/// Local endpoint whose writes can be made to fail
pub struct FlakyEndpoint {
    inner: LocalEndpoint,
    fail_writes: AtomicBool,
}

impl FlakyEndpoint {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: local_endpoint(root),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Endpoint for FlakyEndpoint {
    fn describe(&self) -> String {
        self.inner.describe()
    }

    async fn ping(&self) -> Result<(), EndpointError> {
        self.inner.ping().await
    }

    async fn scan(&self, cache: Arc<Cache>) -> Result<ScanOutput, EndpointError> {
        self.inner.scan(cache).await
    }

    async fn inspect(&self, path: &str) -> Result<Option<Occupant>, EndpointError> {
        self.inner.inspect(path).await
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, EndpointError> {
        self.inner.read_file(path).await
    }

    async fn create_directory(&self, path: &str) -> Result<(), EndpointError> {
        self.inner.create_directory(path).await
    }

    async fn write_file(&self, path: &str, content: Vec<u8>, executable: bool) -> Result<(), EndpointError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(EndpointError::Io {
                path: path.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "write refused"),
            });
        }
        self.inner.write_file(path, content, executable).await
    }

    async fn create_symlink(&self, path: &str, target: &str) -> Result<(), EndpointError> {
        self.inner.create_symlink(path, target).await
    }

    async fn remove(&self, path: &str) -> Result<(), EndpointError> {
        self.inner.remove(path).await
    }
}

/// Local endpoint that behaves like a filesystem without an executable bit
pub struct NoExecEndpoint {
    inner: LocalEndpoint,
}

impl NoExecEndpoint {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: local_endpoint(root),
        }
    }
}

#[async_trait]
impl Endpoint for NoExecEndpoint {
    fn describe(&self) -> String {
        self.inner.describe()
    }

    async fn ping(&self) -> Result<(), EndpointError> {
        self.inner.ping().await
    }

    async fn scan(&self, cache: Arc<Cache>) -> Result<ScanOutput, EndpointError> {
        let mut output = self.inner.scan(cache).await?;
        output.tree = strip_executability(output.tree.as_ref());
        output.preserves_executability = false;
        Ok(output)
    }

    async fn inspect(&self, path: &str) -> Result<Option<Occupant>, EndpointError> {
        self.inner.inspect(path).await
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, EndpointError> {
        self.inner.read_file(path).await
    }

    async fn create_directory(&self, path: &str) -> Result<(), EndpointError> {
        self.inner.create_directory(path).await
    }

    async fn write_file(&self, path: &str, content: Vec<u8>, _executable: bool) -> Result<(), EndpointError> {
        self.inner.write_file(path, content, false).await
    }

    async fn create_symlink(&self, path: &str, target: &str) -> Result<(), EndpointError> {
        self.inner.create_symlink(path, target).await
    }

    async fn remove(&self, path: &str) -> Result<(), EndpointError> {
        self.inner.remove(path).await
    }
}
