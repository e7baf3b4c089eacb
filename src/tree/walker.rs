//! Filesystem scanner
//!
//! Walks a synchronization root depth-first with children sorted by name and
//! produces an [`Entry`] tree together with a fresh content [`Cache`].

use crate::cache::{Cache, Fingerprint};
use crate::error::ScanError;
use crate::ignore::IgnoreMatcher;
use crate::tree::entry::Entry;
use crate::tree::hasher::ContentHasher;
use crate::tree::path;
use crate::tree::symlink::{self, SymlinkMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, trace};
use walkdir::WalkDir;

/// Scan settings
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub ignores: IgnoreMatcher,
    pub symlink_mode: SymlinkMode,
    /// Recompose names to Unicode NFC
    pub recompose_unicode: bool,
}

/// Counters collected during a scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatistics {
    pub directories: u64,
    pub files: u64,
    pub symlinks: u64,
    /// Files whose content was hashed
    pub hashed: u64,
    /// Files whose digest came from the previous cache
    pub cache_hits: u64,
    /// Special files and symlinks left out of the tree
    pub skipped: u64,
}

/// Result of a successful scan
#[derive(Debug, Clone)]
pub struct ScanOutput {
    /// None when the root does not exist
    pub tree: Option<Entry>,
    pub preserves_executability: bool,
    pub cache: Cache,
    pub statistics: ScanStatistics,
}

/// Scan `root`, reusing digests from `previous` where fingerprints match
///
/// Any I/O failure aborts the whole scan; nothing partial is returned.
#[instrument(skip(hasher, previous, options), fields(root = %root.display()))]
pub fn scan(
    root: &Path,
    hasher: &dyn ContentHasher,
    previous: &Cache,
    options: &ScanOptions,
) -> Result<ScanOutput, ScanError> {
    let start = Instant::now();

    let root_metadata = match fs::metadata(root) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Synchronization root does not exist");
            let preserves_executability = match root.parent() {
                Some(parent) if parent.is_dir() => probe_executability(parent),
                _ => cfg!(unix),
            };
            return Ok(ScanOutput {
                tree: None,
                preserves_executability,
                cache: Cache::new(),
                statistics: ScanStatistics::default(),
            });
        }
        Err(e) => return Err(ScanError::io(root, e)),
    };

    let mut scanner = Scanner {
        root,
        hasher,
        previous,
        options,
        preserves_executability: false,
        cache: Cache::new(),
        statistics: ScanStatistics::default(),
    };

    let tree = if root_metadata.is_dir() {
        scanner.preserves_executability = probe_executability(root);
        scanner.scan_directory()?
    } else if root_metadata.is_file() {
        scanner.preserves_executability = match root.parent() {
            Some(parent) if parent.as_os_str().is_empty() => probe_executability(Path::new(".")),
            Some(parent) => probe_executability(parent),
            None => cfg!(unix),
        };
        scanner.scan_file(root, "", &root_metadata)?
    } else {
        return Err(ScanError::io(
            root,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "synchronization root is neither a directory nor a file",
            ),
        ));
    };

    let statistics = scanner.statistics;
    info!(
        entries = tree.count(),
        hashed = statistics.hashed,
        cache_hits = statistics.cache_hits,
        duration_ms = start.elapsed().as_millis(),
        "Scan completed"
    );

    Ok(ScanOutput {
        tree: Some(tree),
        preserves_executability: scanner.preserves_executability,
        cache: scanner.cache,
        statistics,
    })
}

struct Scanner<'a> {
    root: &'a Path,
    hasher: &'a dyn ContentHasher,
    previous: &'a Cache,
    options: &'a ScanOptions,
    preserves_executability: bool,
    cache: Cache,
    statistics: ScanStatistics,
}

impl<'a> Scanner<'a> {
    fn scan_directory(&mut self) -> Result<Entry, ScanError> {
        let root = self.root;
        let options = self.options;

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| {
                match relative_path(root, entry.path(), options.recompose_unicode) {
                    Ok(at) => !options.ignores.is_ignored(&at, entry.file_type().is_dir()),
                    // Let invalid names through so the walk reports them.
                    Err(_) => true,
                }
            });

        // stack[0] holds the root contents; deeper levels hold open directories.
        let mut stack: Vec<(String, BTreeMap<String, Entry>)> = vec![(String::new(), BTreeMap::new())];
        self.statistics.directories += 1;

        for entry in walker {
            let entry = entry.map_err(walk_error(root))?;
            let depth = entry.depth();
            while stack.len() > depth {
                close_directory(&mut stack)?;
            }

            let at = relative_path(root, entry.path(), options.recompose_unicode)?;
            let name = match path::split_last(&at) {
                Some((_, name)) => name.to_string(),
                None => continue,
            };
            let file_type = entry.file_type();

            if file_type.is_dir() {
                trace!(path = %at, "Entering directory");
                self.statistics.directories += 1;
                stack.push((name, BTreeMap::new()));
                continue;
            }

            let scanned = if file_type.is_file() {
                let metadata = entry
                    .metadata()
                    .map_err(|e| ScanError::io(entry.path(), walkdir_io(e)))?;
                Some(self.scan_file(entry.path(), &at, &metadata)?)
            } else if file_type.is_symlink() {
                self.scan_symlink(entry.path(), &at)?
            } else {
                trace!(path = %at, "Skipping special file");
                self.statistics.skipped += 1;
                None
            };

            if let Some(scanned) = scanned {
                insert_child(&mut stack, entry.path(), name, scanned)?;
            }
        }

        while stack.len() > 1 {
            close_directory(&mut stack)?;
        }
        let (_, contents) = stack.pop().unwrap_or_default();
        Ok(Entry::Directory { contents })
    }

    fn scan_file(&mut self, native: &Path, at: &str, metadata: &fs::Metadata) -> Result<Entry, ScanError> {
        self.statistics.files += 1;
        let fingerprint = Fingerprint::from_metadata(metadata);

        let digest = match self.previous.lookup(at, &fingerprint) {
            Some(digest) => {
                self.statistics.cache_hits += 1;
                digest.clone()
            }
            None => {
                trace!(path = %at, "Hashing file");
                let mut file = fs::File::open(native).map_err(|e| ScanError::io(native, e))?;
                let digest = self
                    .hasher
                    .digest_reader(&mut file)
                    .map_err(|e| ScanError::io(native, e))?;
                self.statistics.hashed += 1;
                digest
            }
        };
        self.cache.update(at, fingerprint, digest.clone());

        let executable = self.preserves_executability && fingerprint.mode & 0o111 != 0;
        Ok(Entry::File {
            digest,
            executable,
            size: metadata.len(),
        })
    }

    fn scan_symlink(&mut self, native: &Path, at: &str) -> Result<Option<Entry>, ScanError> {
        if self.options.symlink_mode == SymlinkMode::Ignore {
            self.statistics.skipped += 1;
            return Ok(None);
        }

        let target = fs::read_link(native).map_err(|e| ScanError::io(native, e))?;
        let target = target
            .to_str()
            .ok_or_else(|| ScanError::InvalidName(native.to_path_buf()))?
            .to_string();

        if self.options.symlink_mode == SymlinkMode::Portable && !symlink::is_portable_target(at, &target) {
            return Err(ScanError::UnsafeSymlink {
                path: at.to_string(),
                target,
            });
        }

        self.statistics.symlinks += 1;
        Ok(Some(Entry::Symlink { target }))
    }
}

fn close_directory(stack: &mut Vec<(String, BTreeMap<String, Entry>)>) -> Result<(), ScanError> {
    if let Some((name, contents)) = stack.pop() {
        let native = PathBuf::from(&name);
        insert_child(stack, &native, name, Entry::Directory { contents })?;
    }
    Ok(())
}

fn insert_child(
    stack: &mut [(String, BTreeMap<String, Entry>)],
    native: &Path,
    name: String,
    entry: Entry,
) -> Result<(), ScanError> {
    let Some((_, parent)) = stack.last_mut() else {
        return Err(ScanError::InvalidName(native.to_path_buf()));
    };
    // Two names can collide only after Unicode recomposition.
    if parent.insert(name, entry).is_some() {
        return Err(ScanError::InvalidName(native.to_path_buf()));
    }
    Ok(())
}

/// Compute the synchronization path of `native` relative to `root`
fn relative_path(root: &Path, native: &Path, recompose: bool) -> Result<String, ScanError> {
    let relative = native
        .strip_prefix(root)
        .map_err(|_| ScanError::InvalidName(native.to_path_buf()))?;
    let mut at = String::new();
    for component in relative.components() {
        let name = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| ScanError::InvalidName(native.to_path_buf()))?;
        let name = if recompose {
            path::recompose_name(name)
        } else {
            name.to_string()
        };
        at = path::join(&at, &name);
    }
    Ok(at)
}

fn walk_error(root: &Path) -> impl Fn(walkdir::Error) -> ScanError + '_ {
    move |e| {
        let at = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
        ScanError::io(at, walkdir_io(e))
    }
}

fn walkdir_io(e: walkdir::Error) -> io::Error {
    let message = e.to_string();
    e.into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, message))
}

/// Check whether files created under `dir` keep their executable bits
///
/// Falls back to the platform default when no probe file can be created.
pub fn probe_executability(dir: &Path) -> bool {
    match probe_in(dir) {
        Ok(preserved) => preserved,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Executability probe failed, using platform default");
            cfg!(unix)
        }
    }
}

#[cfg(unix)]
fn probe_in(dir: &Path) -> io::Result<bool> {
    use std::os::unix::fs::PermissionsExt;

    let probe = tempfile::Builder::new()
        .prefix(".twinsync-probe-")
        .tempfile_in(dir)?;
    let file = probe.as_file();
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    if file.metadata()?.permissions().mode() & 0o111 != 0 {
        return Ok(false);
    }
    file.set_permissions(fs::Permissions::from_mode(0o700))?;
    Ok(file.metadata()?.permissions().mode() & 0o111 == 0o100)
}

#[cfg(not(unix))]
fn probe_in(_dir: &Path) -> io::Result<bool> {
    Ok(false)
}

/// Resolve a user-supplied root, tolerating roots that do not exist yet
pub fn normalize_root(root: &Path) -> PathBuf {
    dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf())
}
