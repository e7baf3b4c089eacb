//! In-memory session state store
//!
//! Backs sessions that should not outlive the process, such as one-off
//! comparisons and tests.

use crate::error::StorageError;
use crate::store::{SessionState, StateStore};
use crate::types::SessionID;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// StateStore kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: RwLock<BTreeMap<SessionID, SessionState>>,
    commits: RwLock<u64>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful commits since creation
    pub fn commits(&self) -> u64 {
        *self.commits.read()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, session: &SessionID) -> Result<SessionState, StorageError> {
        let state = self.states.read().get(session).cloned().unwrap_or_default();
        state.ensure_valid()?;
        Ok(state)
    }

    fn commit(&self, session: &SessionID, state: &SessionState) -> Result<(), StorageError> {
        state.ensure_valid()?;
        self.states.write().insert(session.clone(), state.clone());
        *self.commits.write() += 1;
        Ok(())
    }

    fn remove(&self, session: &SessionID) -> Result<(), StorageError> {
        self.states.write().remove(session);
        Ok(())
    }

    fn sessions(&self) -> Result<Vec<SessionID>, StorageError> {
        Ok(self.states.read().keys().cloned().collect())
    }
}
