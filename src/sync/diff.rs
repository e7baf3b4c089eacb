//! Tree differencing

use crate::sync::change::Change;
use crate::tree::entry::Entry;
use crate::tree::path;
use std::collections::BTreeSet;

/// Compute the changes that turn `old` into `new`
///
/// Changes are reported at the coarsest path possible: a kind change or an
/// appearing/disappearing node yields a single change for the whole subtree.
pub fn diff(old: Option<&Entry>, new: Option<&Entry>) -> Vec<Change> {
    let mut changes = Vec::new();
    diff_at("", old, new, &mut changes);
    changes
}

/// Like [`diff`], with paths rooted at `at`
pub fn diff_at(at: &str, old: Option<&Entry>, new: Option<&Entry>, changes: &mut Vec<Change>) {
    match (old, new) {
        (None, None) => {}
        (Some(Entry::Directory { contents: a }), Some(Entry::Directory { contents: b })) => {
            let names: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            for name in names {
                diff_at(&path::join(at, name), a.get(name), b.get(name), changes);
            }
        }
        (
            Some(Entry::File {
                digest: old_digest,
                executable: old_executable,
                ..
            }),
            Some(Entry::File {
                digest: new_digest,
                executable: new_executable,
                ..
            }),
        ) => {
            if old_digest != new_digest || old_executable != new_executable {
                changes.push(Change::new(at, old.cloned(), new.cloned()));
            }
        }
        (Some(Entry::Symlink { target: a }), Some(Entry::Symlink { target: b })) => {
            if a != b {
                changes.push(Change::new(at, old.cloned(), new.cloned()));
            }
        }
        _ => changes.push(Change::new(at, old.cloned(), new.cloned())),
    }
}
