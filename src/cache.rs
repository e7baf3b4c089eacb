//! Content cache
//!
//! Maps synchronization paths to the metadata fingerprint observed when the
//! file was last hashed, so unchanged files are not re-read on the next scan.

use crate::error::EntryError;
use crate::tree::path;
use crate::types::Digest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::Metadata;
use std::time::UNIX_EPOCH;

/// Metadata snapshot used to detect file changes without reading content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Fingerprint {
    pub modified_seconds: i64,
    pub modified_nanoseconds: u32,
    pub size: u64,
    pub mode: u32,
}

impl Fingerprint {
    /// Build a fingerprint from file metadata
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let (modified_seconds, modified_nanoseconds) = match metadata.modified() {
            Ok(modified) => match modified.duration_since(UNIX_EPOCH) {
                Ok(since) => (since.as_secs() as i64, since.subsec_nanos()),
                Err(before) => {
                    let before = before.duration();
                    (-(before.as_secs() as i64), before.subsec_nanos())
                }
            },
            // Platforms without mtime never produce cache hits.
            Err(_) => (i64::MIN, 0),
        };

        Self {
            modified_seconds,
            modified_nanoseconds,
            size: metadata.len(),
            mode: file_mode(metadata),
        }
    }
}

#[cfg(unix)]
fn file_mode(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn file_mode(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// A cached digest together with the fingerprint it was computed under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub digest: Digest,
}

/// Per-root content cache
///
/// A cache belongs to exactly one scan root. The scanner always builds a fresh
/// cache, so paths that vanished are dropped on the next scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Cache {
    entries: BTreeMap<String, CacheEntry>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached digest only when the fingerprint matches exactly
    pub fn lookup(&self, at: &str, fingerprint: &Fingerprint) -> Option<&Digest> {
        self.entries
            .get(at)
            .filter(|entry| entry.fingerprint == *fingerprint)
            .map(|entry| &entry.digest)
    }

    /// Insert or overwrite an entry
    pub fn update(&mut self, at: impl Into<String>, fingerprint: Fingerprint, digest: Digest) {
        self.entries
            .insert(at.into(), CacheEntry { fingerprint, digest });
    }

    pub fn get(&self, at: &str) -> Option<&CacheEntry> {
        self.entries.get(at)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CacheEntry)> {
        self.entries.iter()
    }

    /// Reject caches with empty digests or malformed paths
    pub fn ensure_valid(&self) -> Result<(), EntryError> {
        for (at, entry) in &self.entries {
            if entry.digest.is_empty() || !path::is_valid_path(at) {
                return Err(EntryError::InvalidCacheEntry(at.clone()));
            }
        }
        Ok(())
    }
}
