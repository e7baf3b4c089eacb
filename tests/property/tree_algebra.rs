//! Properties of differencing and executability normalization

use crate::property::strategies::arb_tree;
use proptest::prelude::*;
use proptest::test_runner::TestRunner;
use twinsync::sync::{apply_changes, diff, propagate_executability, strip_executability};

/// Diffing a tree against itself yields nothing
#[test]
fn test_self_diff_is_empty() {
    let mut runner = TestRunner::default();
    runner
        .run(&arb_tree(), |tree| {
            prop_assert!(diff(tree.as_ref(), tree.as_ref()).is_empty());
            Ok(())
        })
        .unwrap();
}

/// Applying the diff from A to B onto A reproduces B
#[test]
fn test_diff_then_apply_reaches_target() {
    let mut runner = TestRunner::default();
    runner
        .run(&(arb_tree(), arb_tree()), |(from, to)| {
            let changes = diff(from.as_ref(), to.as_ref());
            let applied = apply_changes(from.as_ref(), &changes).unwrap();
            prop_assert_eq!(applied, to.clone());
            if from != to {
                prop_assert!(!changes.is_empty());
            }
            Ok(())
        })
        .unwrap();
}

/// Stripping after propagating onto a stripped copy changes nothing
#[test]
fn test_strip_propagate_law() {
    let mut runner = TestRunner::default();
    runner
        .run(&arb_tree(), |tree| {
            let stripped = strip_executability(tree.as_ref());
            let propagated = propagate_executability(tree.as_ref(), stripped.as_ref());
            prop_assert_eq!(strip_executability(propagated.as_ref()), stripped.clone());
            // A stripped copy has the same shape, so propagation restores every flag.
            prop_assert_eq!(propagated, tree.clone());
            Ok(())
        })
        .unwrap();
}

/// Stripping is idempotent
#[test]
fn test_strip_idempotent() {
    let mut runner = TestRunner::default();
    runner
        .run(&arb_tree(), |tree| {
            let once = strip_executability(tree.as_ref());
            prop_assert_eq!(strip_executability(once.as_ref()), once.clone());
            Ok(())
        })
        .unwrap();
}
