//! Change and conflict records

use crate::tree::entry::Entry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A change at one path: `old` becomes `new`
///
/// Absence on either side is `None`. The root path is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub path: String,
    pub old: Option<Entry>,
    pub new: Option<Entry>,
}

impl Change {
    pub fn new(path: impl Into<String>, old: Option<Entry>, new: Option<Entry>) -> Self {
        Self {
            path: path.into(),
            old,
            new,
        }
    }

    /// Short human readable description of what the change does
    pub fn describe(&self) -> String {
        match (&self.old, &self.new) {
            (None, None) => "no change".to_string(),
            (None, Some(new)) => format!("{} created", new.kind()),
            (Some(old), None) => format!("{} deleted", old.kind()),
            (Some(old), Some(new)) if old.kind() != new.kind() => {
                format!("{} replaced by {}", old.kind(), new.kind())
            }
            (Some(Entry::File { digest: a, .. }), Some(Entry::File { digest: b, .. })) if a == b => {
                "executability changed".to_string()
            }
            (Some(old), Some(_)) => format!("{} modified", old.kind()),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = if self.path.is_empty() { "<root>" } else { &self.path };
        write!(f, "{}: {}", at, self.describe())
    }
}

/// Divergent modifications at one path
///
/// Each change list is the diff from the ancestor to that side at `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub path: String,
    pub alpha_changes: Vec<Change>,
    pub beta_changes: Vec<Change>,
}

impl Conflict {
    /// One-line summary of each side
    pub fn summarize(changes: &[Change]) -> String {
        match changes {
            [] => "unchanged".to_string(),
            [single] => single.describe(),
            [first, rest @ ..] => format!("{} (+{} more)", first, rest.len()),
        }
    }
}
