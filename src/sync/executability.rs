//! Executability normalization
//!
//! Filesystems that cannot store the executable bit report every file as
//! non-executable. Before reconciliation such a side borrows executability
//! from another tree so that the missing bit is not mistaken for a change.

use crate::tree::entry::Entry;

/// Copy `target`, taking each file's executable flag from `source`
///
/// Only files present at the same path in both trees are touched. Kind
/// mismatches and paths missing from `source` leave that part of `target`
/// unchanged.
pub fn propagate_executability(source: Option<&Entry>, target: Option<&Entry>) -> Option<Entry> {
    let target = target?;
    let Some(source) = source else {
        return Some(target.clone());
    };
    Some(propagate(source, target))
}

fn propagate(source: &Entry, target: &Entry) -> Entry {
    match (source, target) {
        (Entry::Directory { contents: source_contents }, Entry::Directory { contents: target_contents }) => {
            Entry::Directory {
                contents: target_contents
                    .iter()
                    .map(|(name, child)| {
                        let child = match source_contents.get(name) {
                            Some(source_child) => propagate(source_child, child),
                            None => child.clone(),
                        };
                        (name.clone(), child)
                    })
                    .collect(),
            }
        }
        (Entry::File { executable, .. }, Entry::File { digest, size, .. }) => Entry::File {
            digest: digest.clone(),
            executable: *executable,
            size: *size,
        },
        _ => target.clone(),
    }
}

/// Copy `tree` with every file marked non-executable
pub fn strip_executability(tree: Option<&Entry>) -> Option<Entry> {
    tree.map(strip)
}

fn strip(entry: &Entry) -> Entry {
    match entry {
        Entry::Directory { contents } => Entry::Directory {
            contents: contents
                .iter()
                .map(|(name, child)| (name.clone(), strip(child)))
                .collect(),
        },
        Entry::File { digest, size, .. } => Entry::File {
            digest: digest.clone(),
            executable: false,
            size: *size,
        },
        Entry::Symlink { .. } => entry.clone(),
    }
}

/// Trees prepared for reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTrees {
    pub ancestor: Option<Entry>,
    pub alpha: Option<Entry>,
    pub beta: Option<Entry>,
}

/// Recover the executable flags of a side that cannot store them
///
/// A file whose digest still matches the ancestor keeps the ancestor's flag.
/// Otherwise a file matching the other side's fresh scan takes that side's
/// flag, so identical content never differs by executability alone. Files
/// matching neither fall back to the ancestor when it holds a file there.
fn borrow_executability(ancestor: Option<&Entry>, preserving: Option<&Entry>, target: &Entry) -> Entry {
    match target {
        Entry::Directory { contents } => Entry::Directory {
            contents: contents
                .iter()
                .map(|(name, child)| {
                    let ancestor_child = directory_child(ancestor, name);
                    let preserving_child = directory_child(preserving, name);
                    (name.clone(), borrow_executability(ancestor_child, preserving_child, child))
                })
                .collect(),
        },
        Entry::File { digest, executable, size } => {
            let matching = |entry: Option<&Entry>| match entry {
                Some(Entry::File { digest: other, executable, .. }) if other == digest => Some(*executable),
                _ => None,
            };
            let inherited = match ancestor {
                Some(Entry::File { executable, .. }) => Some(*executable),
                _ => None,
            };
            Entry::File {
                digest: digest.clone(),
                executable: matching(ancestor)
                    .or_else(|| matching(preserving))
                    .or(inherited)
                    .unwrap_or(*executable),
                size: *size,
            }
        }
        Entry::Symlink { .. } => target.clone(),
    }
}

fn directory_child<'a>(entry: Option<&'a Entry>, name: &str) -> Option<&'a Entry> {
    match entry {
        Some(Entry::Directory { contents }) => contents.get(name),
        _ => None,
    }
}

/// Apply the cycle's executability rules
///
/// A side that cannot preserve executability recovers it from the ancestor
/// and the other side's scan. When neither side preserves it, the ancestor
/// is stripped instead so all three trees agree that nothing is executable.
pub fn normalize(
    ancestor: Option<&Entry>,
    alpha: Option<Entry>,
    alpha_preserves: bool,
    beta: Option<Entry>,
    beta_preserves: bool,
) -> NormalizedTrees {
    if !alpha_preserves && !beta_preserves {
        return NormalizedTrees {
            ancestor: strip_executability(ancestor),
            alpha,
            beta,
        };
    }

    let alpha = if alpha_preserves {
        alpha
    } else {
        alpha.map(|tree| borrow_executability(ancestor, beta.as_ref(), &tree))
    };
    let beta = if beta_preserves {
        beta
    } else {
        beta.map(|tree| borrow_executability(ancestor, alpha.as_ref(), &tree))
    };
    NormalizedTrees {
        ancestor: ancestor.cloned(),
        alpha,
        beta,
    }
}
