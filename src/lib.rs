//! twinsync: Bidirectional Three-Way File Synchronization
//!
//! Scans two endpoint roots into immutable entry trees, reconciles them
//! against the last agreed ancestor, and applies the resulting transitions
//! so both sides converge. Conflicting edits are reported, never resolved
//! silently.

pub mod cache;
pub mod cli;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod ignore;
pub mod logging;
pub mod session;
pub mod store;
pub mod sync;
pub mod tree;
pub mod types;
