//! Local disk endpoint

use crate::cache::Cache;
use crate::endpoint::{Endpoint, Occupant};
use crate::error::{EndpointError, ScanError};
use crate::tree::hasher::ContentHasher;
use crate::tree::path;
use crate::tree::walker::{self, ScanOptions, ScanOutput};
use async_trait::async_trait;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Endpoint backed by a directory (or single file) on local disk
#[derive(Clone)]
pub struct LocalEndpoint {
    root: PathBuf,
    hasher: Arc<dyn ContentHasher>,
    options: Arc<ScanOptions>,
}

impl LocalEndpoint {
    pub fn new(root: impl AsRef<Path>, hasher: Arc<dyn ContentHasher>, options: ScanOptions) -> Self {
        Self {
            root: walker::normalize_root(root.as_ref()),
            hasher,
            options: Arc::new(options),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn native(&self, at: &str) -> Result<PathBuf, EndpointError> {
        if !path::is_valid_path(at) {
            return Err(EndpointError::InvalidPath(at.to_string()));
        }
        Ok(path::to_native(&self.root, at))
    }

    /// Run a blocking filesystem operation off the async runtime
    async fn blocking<T, F>(&self, at: &str, operation: F) -> Result<T, EndpointError>
    where
        T: Send + 'static,
        F: FnOnce(PathBuf) -> io::Result<T> + Send + 'static,
    {
        let native = self.native(at)?;
        tokio::task::spawn_blocking(move || operation(native))
            .await
            .map_err(|e| EndpointError::io(at, io::Error::new(io::ErrorKind::Other, e.to_string())))?
            .map_err(|e| EndpointError::io(at, e))
    }
}

impl std::fmt::Debug for LocalEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEndpoint")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Endpoint for LocalEndpoint {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    async fn ping(&self) -> Result<(), EndpointError> {
        // The root itself may be absent; its parent has to be reachable.
        let anchor = match self.root.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => self.root.clone(),
        };
        let reachable = tokio::task::spawn_blocking(move || anchor.is_dir())
            .await
            .unwrap_or(false);
        if reachable {
            Ok(())
        } else {
            Err(EndpointError::Disconnected(format!(
                "{} is not reachable",
                self.root.display()
            )))
        }
    }

    async fn scan(&self, cache: Arc<Cache>) -> Result<ScanOutput, EndpointError> {
        let root = self.root.clone();
        let hasher = Arc::clone(&self.hasher);
        let options = Arc::clone(&self.options);
        let output = tokio::task::spawn_blocking(move || walker::scan(&root, hasher.as_ref(), &cache, &options))
            .await
            .map_err(|e| ScanError::Task(e.to_string()))??;
        Ok(output)
    }

    async fn inspect(&self, at: &str) -> Result<Option<Occupant>, EndpointError> {
        trace!(path = %at, "Inspecting");
        self.blocking(at, |native| {
            let metadata = match fs::symlink_metadata(&native) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e),
            };
            let file_type = metadata.file_type();
            let occupant = if file_type.is_symlink() {
                Occupant::Symlink {
                    target: fs::read_link(&native)?.to_string_lossy().into_owned(),
                }
            } else if file_type.is_dir() {
                Occupant::Directory
            } else {
                Occupant::File
            };
            Ok(Some(occupant))
        })
        .await
    }

    async fn read_file(&self, at: &str) -> Result<Vec<u8>, EndpointError> {
        trace!(path = %at, "Reading file");
        self.blocking(at, |native| fs::read(native)).await
    }

    async fn create_directory(&self, at: &str) -> Result<(), EndpointError> {
        debug!(path = %at, "Creating directory");
        self.blocking(at, |native| fs::create_dir(native)).await
    }

    async fn write_file(&self, at: &str, content: Vec<u8>, executable: bool) -> Result<(), EndpointError> {
        debug!(path = %at, bytes = content.len(), executable, "Writing file");
        self.blocking(at, move |native| write_atomically(&native, &content, executable))
            .await
    }

    async fn create_symlink(&self, at: &str, target: &str) -> Result<(), EndpointError> {
        debug!(path = %at, target = %target, "Creating symlink");
        let target = target.to_string();
        self.blocking(at, move |native| create_symlink(&target, &native))
            .await
    }

    async fn remove(&self, at: &str) -> Result<(), EndpointError> {
        debug!(path = %at, "Removing");
        self.blocking(at, |native| {
            let metadata = fs::symlink_metadata(&native)?;
            if metadata.is_dir() {
                fs::remove_dir(&native)
            } else {
                fs::remove_file(&native)
            }
        })
        .await
    }
}

/// Write to a temporary file beside the destination, then rename over it
fn write_atomically(destination: &Path, content: &[u8], executable: bool) -> io::Result<()> {
    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = tempfile::Builder::new()
        .prefix(".twinsync-staging-")
        .tempfile_in(parent)?;
    staged.write_all(content)?;
    staged.as_file().sync_all()?;
    set_executable(staged.as_file(), executable)?;
    staged.persist(destination).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn set_executable(file: &fs::File, executable: bool) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if executable { 0o755 } else { 0o644 };
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_executable(_file: &fs::File, _executable: bool) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn create_symlink(target: &str, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &str, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_target: &str, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "symbolic links are not supported"))
}
