//! Error types for the synchronization engine.

use std::path::PathBuf;
use thiserror::Error;

/// Structural problems in an entry tree or cache.
///
/// These indicate corruption (a tree from storage or the network that could not
/// have been produced by a scan) and must never be fed into reconciliation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error("Invalid entry name {name:?} in directory {path:?}")]
    InvalidName { path: String, name: String },

    #[error("File entry at {0:?} has an empty digest")]
    EmptyDigest(String),

    #[error("Symlink entry at {0:?} has an empty target")]
    EmptySymlinkTarget(String),

    #[error("Cache entry for {0:?} is invalid")]
    InvalidCacheEntry(String),
}

/// Scan failures. Any of these aborts the scan for the current cycle.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsafe symbolic link at {path:?} (target {target:?})")]
    UnsafeSymlink { path: String, target: String },

    #[error("Invalid or colliding name encountered at {0:?}")]
    InvalidName(PathBuf),

    #[error("Invalid ignore pattern {pattern:?}: {reason}")]
    InvalidIgnorePattern { pattern: String, reason: String },

    #[error("Scan task failed: {0}")]
    Task(String),
}

impl ScanError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScanError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures of endpoint mutation primitives.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Endpoint I/O error at {path:?}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid synchronization path: {0:?}")]
    InvalidPath(String),

    #[error("Endpoint disconnected: {0}")]
    Disconnected(String),

    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
}

impl EndpointError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        EndpointError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Transition application failures.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("Failed to apply change at {path:?}: {source}")]
    Endpoint {
        path: String,
        #[source]
        source: EndpointError,
    },

    #[error("Content at {path:?} changed since it was scanned")]
    DigestMismatch { path: String },

    #[error("Destination {path:?} changed since it was scanned")]
    TargetChanged { path: String },

    #[error("Cannot apply change at {path:?}: {reason}")]
    Simulation { path: String, reason: String },
}

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("State database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Failed to encode state: {0}")]
    Encode(String),

    #[error("Failed to decode state: {0}")]
    Decode(String),

    #[error("Stored state is corrupt: {0}")]
    Corrupt(#[from] EntryError),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Errors surfaced by a synchronization cycle.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{endpoint} endpoint unavailable: {source}")]
    Unavailable {
        endpoint: &'static str,
        #[source]
        source: EndpointError,
    },

    #[error("Scan of {endpoint} failed: {source}")]
    Scan {
        endpoint: &'static str,
        #[source]
        source: EndpointError,
    },

    #[error("Applying transitions to {endpoint} failed: {source}")]
    Apply {
        endpoint: &'static str,
        #[source]
        source: ApplyError,
    },

    #[error("Session state error: {0}")]
    Storage(#[from] StorageError),
}

/// Supervisor command failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Session {0} is no longer running")]
    Stopped(String),

    #[error("Session {0} already exists")]
    Duplicate(String),

    #[error("Synchronization cycle failed: {0}")]
    Cycle(String),
}

/// Command-line surface errors
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Invalid(String),
}

impl SessionError {
    /// Whether the session should stop cycling until a user intervenes.
    ///
    /// Unsafe symlinks need a configuration change and corrupt state needs
    /// inspection; retrying either would only repeat the failure.
    pub fn is_halting(&self) -> bool {
        match self {
            SessionError::Scan {
                source: EndpointError::Scan(ScanError::UnsafeSymlink { .. }),
                ..
            } => true,
            SessionError::Scan {
                source: EndpointError::Scan(ScanError::InvalidIgnorePattern { .. }),
                ..
            } => true,
            SessionError::Storage(StorageError::Corrupt(_)) => true,
            SessionError::Storage(StorageError::Decode(_)) => true,
            _ => false,
        }
    }

    /// Whether the failure indicates a lost endpoint connection.
    pub fn is_disconnect(&self) -> Option<&'static str> {
        match self {
            SessionError::Unavailable { endpoint, .. } => Some(*endpoint),
            SessionError::Scan {
                endpoint,
                source: EndpointError::Disconnected(_),
            } => Some(*endpoint),
            SessionError::Apply {
                endpoint,
                source:
                    ApplyError::Endpoint {
                        source: EndpointError::Disconnected(_),
                        ..
                    },
            } => Some(*endpoint),
            _ => None,
        }
    }
}
