//! Synchronization algorithms
//!
//! Pure tree operations (diff, reconcile, executability normalization) plus the
//! applier that executes transitions against an endpoint.

pub mod apply;
pub mod change;
pub mod diff;
pub mod executability;
pub mod reconcile;

pub use apply::{apply, apply_changes, ApplyReport};
pub use change::{Change, Conflict};
pub use diff::diff;
pub use executability::{propagate_executability, strip_executability};
pub use reconcile::{reconcile, Reconciliation};
