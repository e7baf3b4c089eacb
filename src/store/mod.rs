//! Session state store
//!
//! Holds everything a session has to remember between cycles: the last agreed
//! ancestor and the content cache of each endpoint.

pub mod memory;
pub mod persistence;

pub use memory::MemoryStateStore;
pub use persistence::SledStateStore;

use crate::cache::Cache;
use crate::error::StorageError;
use crate::tree::entry::{self, Entry};
use crate::types::SessionID;
use serde::{Deserialize, Serialize};

/// Persisted state of one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub ancestor: Option<Entry>,
    pub alpha_cache: Cache,
    pub beta_cache: Cache,
}

impl SessionState {
    /// Reject state that could not have been produced by a successful cycle
    pub fn ensure_valid(&self) -> Result<(), StorageError> {
        entry::ensure_valid(self.ancestor.as_ref())?;
        self.alpha_cache.ensure_valid()?;
        self.beta_cache.ensure_valid()?;
        Ok(())
    }
}

/// Session state store interface
pub trait StateStore: Send + Sync {
    /// Load a session's state; unknown sessions start from the default state
    fn load(&self, session: &SessionID) -> Result<SessionState, StorageError>;

    /// Atomically replace a session's state
    fn commit(&self, session: &SessionID, state: &SessionState) -> Result<(), StorageError>;

    /// Forget a session
    fn remove(&self, session: &SessionID) -> Result<(), StorageError>;

    /// Sessions with stored state
    fn sessions(&self) -> Result<Vec<SessionID>, StorageError>;
}
