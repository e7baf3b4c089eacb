//! Content hashing for file entries
//!
//! The hash function is pluggable: scans take any [`ContentHasher`], and the
//! configuration selects one of the built-in algorithms.

use crate::types::Digest;
use serde::{Deserialize, Serialize};
use sha1::Digest as _;
use std::io::Read;
use std::sync::Arc;

/// Read buffer size used when streaming file content
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Streaming content hash function
pub trait ContentHasher: Send + Sync {
    /// Hash everything the reader yields
    fn digest_reader(&self, reader: &mut dyn Read) -> std::io::Result<Digest>;

    /// Hash an in-memory byte slice
    fn digest_bytes(&self, data: &[u8]) -> Digest {
        let mut cursor = std::io::Cursor::new(data);
        // Reading from memory cannot fail.
        self.digest_reader(&mut cursor).unwrap_or_default()
    }
}

/// Built-in hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Sha1,
}

impl HashAlgorithm {
    /// Instantiate the hasher for this algorithm
    pub fn hasher(self) -> Arc<dyn ContentHasher> {
        match self {
            HashAlgorithm::Blake3 => Arc::new(Blake3Hasher),
            HashAlgorithm::Sha1 => Arc::new(Sha1Hasher),
        }
    }

    /// Digest length in bytes
    pub fn digest_len(self) -> usize {
        match self {
            HashAlgorithm::Blake3 => 32,
            HashAlgorithm::Sha1 => 20,
        }
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blake3" => Ok(HashAlgorithm::Blake3),
            "sha1" => Ok(HashAlgorithm::Sha1),
            other => Err(format!("unknown hash algorithm: {}", other)),
        }
    }
}

/// BLAKE3 content hasher
#[derive(Debug, Default, Clone, Copy)]
pub struct Blake3Hasher;

impl ContentHasher for Blake3Hasher {
    fn digest_reader(&self, reader: &mut dyn Read) -> std::io::Result<Digest> {
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }
        Ok(hasher.finalize().as_bytes().to_vec())
    }
}

/// SHA-1 content hasher
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha1Hasher;

impl ContentHasher for Sha1Hasher {
    fn digest_reader(&self, reader: &mut dyn Read) -> std::io::Result<Digest> {
        let mut hasher = sha1::Sha1::new();
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }
        Ok(hasher.finalize().to_vec())
    }
}

/// Short hex rendering of a digest for logs and status output
pub fn short_hex(digest: &[u8]) -> String {
    let encoded = hex::encode(digest);
    encoded.get(..12).unwrap_or(&encoded).to_string()
}
