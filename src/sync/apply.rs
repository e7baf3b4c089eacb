//! Transition application
//!
//! Turns reconciler transitions into endpoint primitives. Removals run first,
//! deepest path first, so only leaves and empty directories are ever removed.
//! Creations follow, shallowest path first, so parents exist before children.
//! Every removal and file write first checks that the endpoint still holds
//! what the scan saw there.

use crate::endpoint::{Endpoint, Occupant};
use crate::error::ApplyError;
use crate::sync::change::Change;
use crate::sync::diff::diff_at;
use crate::tree::entry::{self, Entry};
use crate::tree::hasher::{short_hex, ContentHasher};
use crate::tree::path;
use crate::types::Digest;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Counts of primitives executed against an endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub removed: u64,
    pub directories_created: u64,
    pub files_written: u64,
    pub symlinks_created: u64,
    pub bytes_written: u64,
}

impl ApplyReport {
    pub fn operations(&self) -> u64 {
        self.removed + self.directories_created + self.files_written + self.symlinks_created
    }
}

/// What a path held when it was scanned
#[derive(Debug, Clone, PartialEq, Eq)]
enum Expectation {
    Directory,
    File(Digest),
    Symlink(String),
}

impl Expectation {
    fn of(entry: &Entry) -> Self {
        match entry {
            Entry::Directory { .. } => Expectation::Directory,
            Entry::File { digest, .. } => Expectation::File(digest.clone()),
            Entry::Symlink { target } => Expectation::Symlink(target.clone()),
        }
    }
}

/// A single removal primitive
#[derive(Debug, Clone, PartialEq, Eq)]
struct Removal {
    path: String,
    expected: Expectation,
}

/// A single creation primitive
#[derive(Debug, Clone, PartialEq, Eq)]
enum Creation {
    Directory {
        path: String,
    },
    File {
        path: String,
        digest: Digest,
        executable: bool,
        /// Digest of the file being replaced in place, if any
        replaces: Option<Digest>,
    },
    Symlink {
        path: String,
        target: String,
    },
}

impl Creation {
    fn path(&self) -> &str {
        match self {
            Creation::Directory { path } | Creation::File { path, .. } | Creation::Symlink { path, .. } => path,
        }
    }
}

/// Ordered primitive operations for a set of transitions
#[derive(Debug, Default, PartialEq, Eq)]
struct Plan {
    removals: Vec<Removal>,
    creations: Vec<Creation>,
}

fn plan(transitions: &[Change]) -> Plan {
    let mut plan = Plan::default();
    for transition in transitions {
        let mut primitives = Vec::new();
        diff_at(
            &transition.path,
            transition.old.as_ref(),
            transition.new.as_ref(),
            &mut primitives,
        );
        for primitive in primitives {
            match (primitive.old, primitive.new) {
                (Some(Entry::File { digest: old, .. }), Some(new @ Entry::File { .. })) => {
                    // Files are replaced atomically in place.
                    push_creations(&primitive.path, &new, Some(old), &mut plan.creations);
                }
                (old, new) => {
                    if let Some(old) = old {
                        push_removals(&primitive.path, &old, &mut plan.removals);
                    }
                    if let Some(new) = new {
                        push_creations(&primitive.path, &new, None, &mut plan.creations);
                    }
                }
            }
        }
    }

    // Stable sorts keep the children-first and parent-first expansion order
    // among paths at the same depth.
    plan.removals
        .sort_by(|a, b| path::depth(&b.path).cmp(&path::depth(&a.path)));
    plan.creations
        .sort_by(|a, b| path::depth(a.path()).cmp(&path::depth(b.path())));
    plan
}

fn push_removals(at: &str, entry: &Entry, removals: &mut Vec<Removal>) {
    if let Entry::Directory { contents } = entry {
        for (name, child) in contents {
            push_removals(&path::join(at, name), child, removals);
        }
    }
    removals.push(Removal {
        path: at.to_string(),
        expected: Expectation::of(entry),
    });
}

fn push_creations(at: &str, entry: &Entry, replaces: Option<Digest>, creations: &mut Vec<Creation>) {
    match entry {
        Entry::Directory { contents } => {
            creations.push(Creation::Directory { path: at.to_string() });
            for (name, child) in contents {
                push_creations(&path::join(at, name), child, None, creations);
            }
        }
        Entry::File {
            digest, executable, ..
        } => creations.push(Creation::File {
            path: at.to_string(),
            digest: digest.clone(),
            executable: *executable,
            replaces,
        }),
        Entry::Symlink { target } => creations.push(Creation::Symlink {
            path: at.to_string(),
            target: target.clone(),
        }),
    }
}

/// Fail unless `endpoint` still holds `expected` at `at`
///
/// Directories are compared by kind only; their children are checked by
/// their own primitives. Files are re-read and hashed.
async fn verify_target(
    endpoint: &dyn Endpoint,
    hasher: &dyn ContentHasher,
    at: &str,
    expected: Option<&Expectation>,
) -> Result<(), ApplyError> {
    let current = endpoint
        .inspect(at)
        .await
        .map_err(|source| ApplyError::Endpoint { path: at.to_string(), source })?;
    let unchanged = match (expected, current) {
        (None, None) => true,
        (Some(Expectation::Directory), Some(Occupant::Directory)) => true,
        (Some(Expectation::Symlink(expected)), Some(Occupant::Symlink { target })) => *expected == target,
        (Some(Expectation::File(digest)), Some(Occupant::File)) => {
            let content = endpoint
                .read_file(at)
                .await
                .map_err(|source| ApplyError::Endpoint { path: at.to_string(), source })?;
            hasher.digest_bytes(&content) == *digest
        }
        _ => false,
    };
    if unchanged {
        Ok(())
    } else {
        warn!(path = %at, "Target changed since scan");
        Err(ApplyError::TargetChanged { path: at.to_string() })
    }
}

/// Apply `transitions` to `endpoint`, fetching file content from `source`
///
/// Stops at the first failure; anything already done stays done and the next
/// cycle rescans.
#[instrument(skip_all, fields(endpoint = %endpoint.describe(), transitions = transitions.len()))]
pub async fn apply(
    endpoint: &dyn Endpoint,
    source: &dyn Endpoint,
    hasher: &dyn ContentHasher,
    transitions: &[Change],
) -> Result<ApplyReport, ApplyError> {
    let mut report = ApplyReport::default();
    if transitions.is_empty() {
        return Ok(report);
    }

    let plan = plan(transitions);
    debug!(
        removals = plan.removals.len(),
        creations = plan.creations.len(),
        "Planned transition primitives"
    );

    for removal in &plan.removals {
        verify_target(endpoint, hasher, &removal.path, Some(&removal.expected)).await?;
        endpoint
            .remove(&removal.path)
            .await
            .map_err(|source| ApplyError::Endpoint {
                path: removal.path.clone(),
                source,
            })?;
        report.removed += 1;
    }

    for creation in plan.creations {
        match creation {
            Creation::Directory { path } => {
                endpoint
                    .create_directory(&path)
                    .await
                    .map_err(|source| ApplyError::Endpoint { path: path.clone(), source })?;
                report.directories_created += 1;
            }
            Creation::File {
                path,
                digest,
                executable,
                replaces,
            } => {
                let content = source
                    .read_file(&path)
                    .await
                    .map_err(|source| ApplyError::Endpoint { path: path.clone(), source })?;
                let actual = hasher.digest_bytes(&content);
                if actual != digest {
                    warn!(
                        path = %path,
                        expected = %short_hex(&digest),
                        actual = %short_hex(&actual),
                        "Source content changed since scan"
                    );
                    return Err(ApplyError::DigestMismatch { path });
                }
                let replaced = replaces.map(Expectation::File);
                verify_target(endpoint, hasher, &path, replaced.as_ref()).await?;
                let length = content.len() as u64;
                endpoint
                    .write_file(&path, content, executable)
                    .await
                    .map_err(|source| ApplyError::Endpoint { path: path.clone(), source })?;
                report.files_written += 1;
                report.bytes_written += length;
            }
            Creation::Symlink { path, target } => {
                endpoint
                    .create_symlink(&path, &target)
                    .await
                    .map_err(|source| ApplyError::Endpoint { path: path.clone(), source })?;
                report.symlinks_created += 1;
            }
        }
    }

    info!(
        operations = report.operations(),
        bytes_written = report.bytes_written,
        "Applied transitions"
    );
    Ok(report)
}

/// Apply changes to an in-memory tree
///
/// Each change's `old` value must match the tree at that path.
pub fn apply_changes(tree: Option<&Entry>, changes: &[Change]) -> Result<Option<Entry>, ApplyError> {
    let mut current = tree.cloned();
    for change in changes {
        if entry::lookup(current.as_ref(), &change.path) != change.old.as_ref() {
            return Err(ApplyError::Simulation {
                path: change.path.clone(),
                reason: "current contents do not match the expected old value".to_string(),
            });
        }
        current = entry::with_entry_at(current.as_ref(), &change.path, change.new.clone())
            .map_err(|reason| ApplyError::Simulation {
                path: change.path.clone(),
                reason,
            })?;
    }
    Ok(current)
}
