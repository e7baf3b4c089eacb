//! Three-way reconciliation
//!
//! Compares both endpoints against their last agreed state and decides, path
//! by path, which side's change propagates and where the two sides conflict.

use crate::sync::change::{Change, Conflict};
use crate::sync::diff::diff_at;
use crate::tree::entry::Entry;
use crate::tree::path;
use std::collections::{BTreeMap, BTreeSet};

/// Output of [`reconcile`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Ancestor to persist once both sides have applied their transitions
    pub ancestor: Option<Entry>,
    /// Changes to apply to alpha, `old` being alpha's current value
    pub alpha_transitions: Vec<Change>,
    /// Changes to apply to beta, `old` being beta's current value
    pub beta_transitions: Vec<Change>,
    pub conflicts: Vec<Conflict>,
}

impl Reconciliation {
    /// Whether the cycle has nothing to apply
    pub fn is_quiescent(&self) -> bool {
        self.alpha_transitions.is_empty() && self.beta_transitions.is_empty()
    }
}

/// Reconcile two endpoint trees against their common ancestor
pub fn reconcile(ancestor: Option<&Entry>, alpha: Option<&Entry>, beta: Option<&Entry>) -> Reconciliation {
    let mut reconciler = Reconciler::default();
    let ancestor = reconciler.reconcile_at("", ancestor, alpha, beta);
    Reconciliation {
        ancestor,
        alpha_transitions: reconciler.alpha_transitions,
        beta_transitions: reconciler.beta_transitions,
        conflicts: reconciler.conflicts,
    }
}

#[derive(Default)]
struct Reconciler {
    alpha_transitions: Vec<Change>,
    beta_transitions: Vec<Change>,
    conflicts: Vec<Conflict>,
}

impl Reconciler {
    /// Returns the new ancestor value at `at`
    fn reconcile_at(
        &mut self,
        at: &str,
        ancestor: Option<&Entry>,
        alpha: Option<&Entry>,
        beta: Option<&Entry>,
    ) -> Option<Entry> {
        if alpha == beta {
            return alpha.cloned();
        }

        if let (Some(Entry::Directory { contents: alpha_contents }), Some(Entry::Directory { contents: beta_contents })) =
            (alpha, beta)
        {
            let ancestor_contents = match ancestor {
                Some(Entry::Directory { contents }) => Some(contents),
                _ => None,
            };
            let names: BTreeSet<&String> = alpha_contents.keys().chain(beta_contents.keys()).collect();

            let mut merged = BTreeMap::new();
            for name in names {
                let child = self.reconcile_at(
                    &path::join(at, name),
                    ancestor_contents.and_then(|contents| contents.get(name)),
                    alpha_contents.get(name),
                    beta_contents.get(name),
                );
                if let Some(child) = child {
                    merged.insert(name.clone(), child);
                }
            }
            return Some(Entry::Directory { contents: merged });
        }

        if ancestor == alpha {
            self.alpha_transitions
                .push(Change::new(at, alpha.cloned(), beta.cloned()));
            return beta.cloned();
        }

        if ancestor == beta {
            self.beta_transitions
                .push(Change::new(at, beta.cloned(), alpha.cloned()));
            return alpha.cloned();
        }

        let mut alpha_changes = Vec::new();
        diff_at(at, ancestor, alpha, &mut alpha_changes);
        let mut beta_changes = Vec::new();
        diff_at(at, ancestor, beta, &mut beta_changes);
        self.conflicts.push(Conflict {
            path: at.to_string(),
            alpha_changes,
            beta_changes,
        });
        ancestor.cloned()
    }
}
