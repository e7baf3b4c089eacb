//! Core types shared across the synchronization engine.

/// Digest: content hash produced by the configured hash function.
///
/// The length depends on the algorithm (20 bytes for SHA-1, 32 for BLAKE3).
pub type Digest = Vec<u8>;

/// SessionID: stable identifier of a synchronization session
pub type SessionID = String;

/// Separator used in all synchronization paths, independent of the host platform.
pub const PATH_SEPARATOR: char = '/';
