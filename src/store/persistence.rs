//! Persistence layer for session state

use crate::error::StorageError;
use crate::store::{SessionState, StateStore};
use crate::types::SessionID;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

const ANCESTOR_KEY: &str = "ancestor";
const ALPHA_CACHE_KEY: &str = "alpha_cache";
const BETA_CACHE_KEY: &str = "beta_cache";
const KEYS: [&str; 3] = [ANCESTOR_KEY, ALPHA_CACHE_KEY, BETA_CACHE_KEY];

/// Sled-based implementation of StateStore
///
/// Keys are `session/<id>/<field>` with bincode encoded values.
pub struct SledStateStore {
    db: sled::Db,
}

impl SledStateStore {
    /// Open (or create) a store in the given directory
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        std::fs::create_dir_all(path.as_ref())?;
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Open a throwaway store that lives only in memory
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    fn key(session: &SessionID, field: &str) -> String {
        format!("session/{}/{}", session, field)
    }

    fn get<T: DeserializeOwned + Default>(&self, session: &SessionID, field: &str) -> Result<T, StorageError> {
        match self.db.get(Self::key(session, field))? {
            Some(value) => bincode::deserialize(&value)
                .map_err(|e| StorageError::Decode(format!("{} of session {}: {}", field, session, e))),
            None => Ok(T::default()),
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    bincode::serialize(value).map_err(|e| StorageError::Encode(e.to_string()))
}

impl StateStore for SledStateStore {
    fn load(&self, session: &SessionID) -> Result<SessionState, StorageError> {
        let state = SessionState {
            ancestor: self.get(session, ANCESTOR_KEY)?,
            alpha_cache: self.get(session, ALPHA_CACHE_KEY)?,
            beta_cache: self.get(session, BETA_CACHE_KEY)?,
        };
        state.ensure_valid()?;
        debug!(
            session = %session,
            ancestor_entries = crate::tree::entry::count(state.ancestor.as_ref()),
            "Loaded session state"
        );
        Ok(state)
    }

    fn commit(&self, session: &SessionID, state: &SessionState) -> Result<(), StorageError> {
        let mut batch = sled::Batch::default();
        batch.insert(Self::key(session, ANCESTOR_KEY).as_bytes(), encode(&state.ancestor)?);
        batch.insert(Self::key(session, ALPHA_CACHE_KEY).as_bytes(), encode(&state.alpha_cache)?);
        batch.insert(Self::key(session, BETA_CACHE_KEY).as_bytes(), encode(&state.beta_cache)?);
        self.db.apply_batch(batch)?;
        self.db.flush()?;
        Ok(())
    }

    fn remove(&self, session: &SessionID) -> Result<(), StorageError> {
        let mut batch = sled::Batch::default();
        for field in KEYS {
            batch.remove(Self::key(session, field).as_bytes());
        }
        self.db.apply_batch(batch)?;
        self.db.flush()?;
        Ok(())
    }

    fn sessions(&self) -> Result<Vec<SessionID>, StorageError> {
        let mut sessions = BTreeSet::new();
        for item in self.db.scan_prefix("session/") {
            let (key, _) = item?;
            let key = String::from_utf8_lossy(&key);
            if let Some(id) = key
                .strip_prefix("session/")
                .and_then(|rest| rest.rsplit_once('/'))
                .map(|(id, _)| id.to_string())
            {
                sessions.insert(id);
            }
        }
        Ok(sessions.into_iter().collect())
    }
}
