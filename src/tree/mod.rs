//! Synchronization trees
//!
//! Immutable snapshots of a directory hierarchy and the scanner that produces
//! them from disk.

pub mod entry;
pub mod hasher;
pub mod path;
pub mod symlink;
pub mod walker;

pub use entry::{Entry, EntryKind};
pub use hasher::{ContentHasher, HashAlgorithm};
pub use symlink::SymlinkMode;
pub use walker::{scan, ScanOptions, ScanOutput, ScanStatistics};
