//! Endpoints
//!
//! An endpoint is one side of a synchronization session. The engine only
//! talks to endpoints through the [`Endpoint`] trait: scanning plus a small
//! set of mutation primitives used by the transition applier.

pub mod local;

pub use local::LocalEndpoint;

use crate::cache::Cache;
use crate::error::EndpointError;
use crate::tree::walker::ScanOutput;
use async_trait::async_trait;
use std::sync::Arc;

/// What currently occupies a path on an endpoint
///
/// Directories are reported without their contents and files without their
/// content digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Occupant {
    Directory,
    File,
    Symlink { target: String },
}

/// Capability set of a synchronization endpoint
///
/// Paths are slash-separated and relative to the endpoint root; the empty path
/// addresses the root itself.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Human readable location, used in logs and status output
    fn describe(&self) -> String;

    /// Check that the endpoint is reachable
    async fn ping(&self) -> Result<(), EndpointError>;

    /// Scan the endpoint, reusing digests from `cache` where possible
    async fn scan(&self, cache: Arc<Cache>) -> Result<ScanOutput, EndpointError>;

    /// Report what occupies `path`, or None when nothing does
    async fn inspect(&self, path: &str) -> Result<Option<Occupant>, EndpointError>;

    /// Read the full content of a file
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, EndpointError>;

    /// Create a directory whose parent already exists
    async fn create_directory(&self, path: &str) -> Result<(), EndpointError>;

    /// Create or atomically replace a file
    async fn write_file(&self, path: &str, content: Vec<u8>, executable: bool) -> Result<(), EndpointError>;

    /// Create a symbolic link
    async fn create_symlink(&self, path: &str, target: &str) -> Result<(), EndpointError>;

    /// Remove a file, a symlink, or an empty directory
    async fn remove(&self, path: &str) -> Result<(), EndpointError>;
}
