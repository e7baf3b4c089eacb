//! Entry tree data model
//!
//! An [`Entry`] is an immutable snapshot of a filesystem node. Absence is
//! expressed as `Option<Entry>` and never as a variant. Directory contents are
//! kept in a [`BTreeMap`] so iteration is always sorted by name.

use crate::error::EntryError;
use crate::tree::path;
use crate::types::Digest;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A node in a synchronization tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entry {
    /// A directory with its named children
    Directory {
        #[serde(deserialize_with = "deserialize_unique_contents")]
        contents: BTreeMap<String, Entry>,
    },
    /// A regular file
    File {
        digest: Digest,
        executable: bool,
        /// Content length in bytes
        size: u64,
    },
    /// A symbolic link
    Symlink { target: String },
}

/// Discriminant of an [`Entry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Directory => write!(f, "directory"),
            EntryKind::File => write!(f, "file"),
            EntryKind::Symlink => write!(f, "symlink"),
        }
    }
}

impl Entry {
    /// An empty directory
    pub fn empty_directory() -> Self {
        Entry::Directory {
            contents: BTreeMap::new(),
        }
    }

    /// A directory built from (name, entry) pairs
    pub fn directory<I, S>(children: I) -> Self
    where
        I: IntoIterator<Item = (S, Entry)>,
        S: Into<String>,
    {
        Entry::Directory {
            contents: children.into_iter().map(|(n, e)| (n.into(), e)).collect(),
        }
    }

    /// A file entry
    pub fn file(digest: impl Into<Digest>, executable: bool, size: u64) -> Self {
        Entry::File {
            digest: digest.into(),
            executable,
            size,
        }
    }

    /// A symlink entry
    pub fn symlink(target: impl Into<String>) -> Self {
        Entry::Symlink {
            target: target.into(),
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::Directory { .. } => EntryKind::Directory,
            Entry::File { .. } => EntryKind::File,
            Entry::Symlink { .. } => EntryKind::Symlink,
        }
    }

    /// Directory contents, if this entry is a directory
    pub fn contents(&self) -> Option<&BTreeMap<String, Entry>> {
        match self {
            Entry::Directory { contents } => Some(contents),
            _ => None,
        }
    }

    /// Number of entries in the tree rooted here (this entry included)
    pub fn count(&self) -> u64 {
        match self {
            Entry::Directory { contents } => 1 + contents.values().map(Entry::count).sum::<u64>(),
            _ => 1,
        }
    }

    /// Look up the entry at a slash-separated path below this one
    pub fn lookup(&self, path: &str) -> Option<&Entry> {
        let mut current = self;
        for component in path::components(path) {
            current = current.contents()?.get(component)?;
        }
        Some(current)
    }

    /// Reject trees that a scan could never have produced
    ///
    /// Must be called on every tree loaded from storage or received from a
    /// remote before it takes part in diff or reconciliation.
    pub fn ensure_valid(&self) -> Result<(), EntryError> {
        self.ensure_valid_at("")
    }

    fn ensure_valid_at(&self, at: &str) -> Result<(), EntryError> {
        match self {
            Entry::Directory { contents } => {
                for (name, child) in contents {
                    if !path::is_valid_name(name) {
                        return Err(EntryError::InvalidName {
                            path: at.to_string(),
                            name: name.clone(),
                        });
                    }
                    child.ensure_valid_at(&path::join(at, name))?;
                }
                Ok(())
            }
            Entry::File { digest, .. } => {
                if digest.is_empty() {
                    Err(EntryError::EmptyDigest(at.to_string()))
                } else {
                    Ok(())
                }
            }
            Entry::Symlink { target } => {
                if target.is_empty() {
                    Err(EntryError::EmptySymlinkTarget(at.to_string()))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Validate an optional tree (absence is always valid)
pub fn ensure_valid(entry: Option<&Entry>) -> Result<(), EntryError> {
    match entry {
        Some(entry) => entry.ensure_valid(),
        None => Ok(()),
    }
}

/// Look up a path in an optional tree
pub fn lookup<'a>(entry: Option<&'a Entry>, at: &str) -> Option<&'a Entry> {
    entry?.lookup(at)
}

/// Total entry count of an optional tree
pub fn count(entry: Option<&Entry>) -> u64 {
    entry.map(Entry::count).unwrap_or(0)
}

/// Return a copy of `root` with the node at `at` replaced by `replacement`
///
/// Passing `None` removes the node. The parent of `at` must exist and be a
/// directory, except when `at` is the root.
pub fn with_entry_at(
    root: Option<&Entry>,
    at: &str,
    replacement: Option<Entry>,
) -> Result<Option<Entry>, String> {
    let Some((parent, name)) = path::split_last(at) else {
        return Ok(replacement);
    };
    let mut updated = root.cloned();
    {
        let mut current = updated
            .as_mut()
            .ok_or_else(|| format!("parent of {:?} does not exist", at))?;
        for component in path::components(parent) {
            current = match current {
                Entry::Directory { contents } => contents
                    .get_mut(component)
                    .ok_or_else(|| format!("parent of {:?} does not exist", at))?,
                _ => return Err(format!("parent of {:?} is not a directory", at)),
            };
        }
        let Entry::Directory { contents } = current else {
            return Err(format!("parent of {:?} is not a directory", at));
        };
        match replacement {
            Some(entry) => {
                contents.insert(name.to_string(), entry);
            }
            None => {
                contents.remove(name);
            }
        }
    }
    Ok(updated)
}

fn deserialize_unique_contents<'de, D>(deserializer: D) -> Result<BTreeMap<String, Entry>, D::Error>
where
    D: Deserializer<'de>,
{
    struct UniqueContents;

    impl<'de> Visitor<'de> for UniqueContents {
        type Value = BTreeMap<String, Entry>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of unique entry names to entries")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut contents = BTreeMap::new();
            while let Some((name, entry)) = access.next_entry::<String, Entry>()? {
                if contents.contains_key(&name) {
                    return Err(serde::de::Error::custom(format!(
                        "duplicate entry name {:?}",
                        name
                    )));
                }
                contents.insert(name, entry);
            }
            Ok(contents)
        }
    }

    deserializer.deserialize_map(UniqueContents)
}
