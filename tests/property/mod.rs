//! Property-based tests for tree algebra and reconciliation

mod strategies;
mod tree_algebra;
