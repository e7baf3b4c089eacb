//! Synchronization sessions
//!
//! A session pairs two endpoints with the state they last agreed on and runs
//! synchronization cycles between them.

pub mod status;
pub mod supervisor;

pub use status::{CyclePhase, EndpointStatus, SessionStatus};
pub use supervisor::Supervisor;

use crate::endpoint::Endpoint;
use crate::error::SessionError;
use crate::store::{SessionState, StateStore};
use crate::sync::apply::{apply, ApplyReport};
use crate::sync::change::Conflict;
use crate::sync::executability;
use crate::sync::reconcile::reconcile;
use crate::tree::hasher::ContentHasher;
use crate::tree::walker::ScanStatistics;
use crate::types::SessionID;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Derive a stable session identifier from the two endpoint locations
pub fn session_id(alpha: &str, beta: &str) -> SessionID {
    let mut hasher = blake3::Hasher::new();
    hasher.update(alpha.as_bytes());
    hasher.update(&[0]);
    hasher.update(beta.as_bytes());
    hex::encode(&hasher.finalize().as_bytes()[..8])
}

/// Summary of one completed cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleReport {
    pub alpha_scan: ScanStatistics,
    pub beta_scan: ScanStatistics,
    pub alpha_applied: ApplyReport,
    pub beta_applied: ApplyReport,
    pub conflicts: Vec<Conflict>,
    pub duration: Duration,
}

impl CycleReport {
    /// Whether the cycle changed either endpoint
    pub fn changed(&self) -> bool {
        self.alpha_applied.operations() > 0 || self.beta_applied.operations() > 0
    }
}

/// A pair of endpoints kept in sync
pub struct Session {
    id: SessionID,
    alpha: Arc<dyn Endpoint>,
    beta: Arc<dyn Endpoint>,
    hasher: Arc<dyn ContentHasher>,
    store: Arc<dyn StateStore>,
    state: Option<SessionState>,
}

impl Session {
    pub fn new(
        id: SessionID,
        alpha: Arc<dyn Endpoint>,
        beta: Arc<dyn Endpoint>,
        hasher: Arc<dyn ContentHasher>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            id,
            alpha,
            beta,
            hasher,
            store,
            state: None,
        }
    }

    pub fn id(&self) -> &SessionID {
        &self.id
    }

    pub fn alpha(&self) -> &Arc<dyn Endpoint> {
        &self.alpha
    }

    pub fn beta(&self) -> &Arc<dyn Endpoint> {
        &self.beta
    }

    /// Run one cycle without phase reporting
    pub async fn run_cycle(&mut self) -> Result<CycleReport, SessionError> {
        self.run_cycle_observed(&|_| {}).await
    }

    /// Run one synchronization cycle
    ///
    /// State is persisted only after both endpoints applied all their
    /// transitions. Dropping the future at any await point leaves the stored
    /// state untouched.
    #[instrument(skip_all, fields(session = %self.id))]
    pub async fn run_cycle_observed<F>(&mut self, observe: &F) -> Result<CycleReport, SessionError>
    where
        F: Fn(CyclePhase) + Sync,
    {
        let start = Instant::now();

        observe(CyclePhase::Connecting);
        let (alpha_ping, beta_ping) = tokio::join!(self.alpha.ping(), self.beta.ping());
        alpha_ping.map_err(|source| SessionError::Unavailable {
            endpoint: "alpha",
            source,
        })?;
        beta_ping.map_err(|source| SessionError::Unavailable {
            endpoint: "beta",
            source,
        })?;

        let state = match &self.state {
            Some(state) => state.clone(),
            None => {
                let loaded = self.store.load(&self.id)?;
                self.state = Some(loaded.clone());
                loaded
            }
        };

        observe(CyclePhase::Scanning);
        let (alpha_scan, beta_scan) = tokio::join!(
            self.alpha.scan(Arc::new(state.alpha_cache)),
            self.beta.scan(Arc::new(state.beta_cache))
        );
        let alpha_scan = alpha_scan.map_err(|source| SessionError::Scan {
            endpoint: "alpha",
            source,
        })?;
        let beta_scan = beta_scan.map_err(|source| SessionError::Scan {
            endpoint: "beta",
            source,
        })?;

        observe(CyclePhase::Reconciling);
        let normalized = executability::normalize(
            state.ancestor.as_ref(),
            alpha_scan.tree,
            alpha_scan.preserves_executability,
            beta_scan.tree,
            beta_scan.preserves_executability,
        );
        let reconciliation = reconcile(
            normalized.ancestor.as_ref(),
            normalized.alpha.as_ref(),
            normalized.beta.as_ref(),
        );
        debug!(
            alpha_transitions = reconciliation.alpha_transitions.len(),
            beta_transitions = reconciliation.beta_transitions.len(),
            conflicts = reconciliation.conflicts.len(),
            "Reconciled"
        );
        for conflict in &reconciliation.conflicts {
            warn!(path = %conflict.path, "Conflict");
        }

        observe(CyclePhase::Transitioning);
        let hasher = self.hasher.as_ref();
        let (alpha_applied, beta_applied) = tokio::join!(
            apply(
                self.alpha.as_ref(),
                self.beta.as_ref(),
                hasher,
                &reconciliation.alpha_transitions
            ),
            apply(
                self.beta.as_ref(),
                self.alpha.as_ref(),
                hasher,
                &reconciliation.beta_transitions
            )
        );
        let alpha_applied = alpha_applied.map_err(|source| SessionError::Apply {
            endpoint: "alpha",
            source,
        })?;
        let beta_applied = beta_applied.map_err(|source| SessionError::Apply {
            endpoint: "beta",
            source,
        })?;

        observe(CyclePhase::Saving);
        let next = SessionState {
            ancestor: reconciliation.ancestor,
            alpha_cache: alpha_scan.cache,
            beta_cache: beta_scan.cache,
        };
        self.store.commit(&self.id, &next)?;
        self.state = Some(next);

        let report = CycleReport {
            alpha_scan: alpha_scan.statistics,
            beta_scan: beta_scan.statistics,
            alpha_applied,
            beta_applied,
            conflicts: reconciliation.conflicts,
            duration: start.elapsed(),
        };
        info!(
            alpha_operations = report.alpha_applied.operations(),
            beta_operations = report.beta_applied.operations(),
            conflicts = report.conflicts.len(),
            duration_ms = report.duration.as_millis(),
            "Cycle completed"
        );
        Ok(report)
    }
}
