//! Symbolic link handling modes

use crate::tree::path;
use crate::types::PATH_SEPARATOR;
use serde::{Deserialize, Serialize};

/// How scans treat symbolic links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SymlinkMode {
    /// Symlinks are left out of the tree
    Ignore,
    /// Only relative targets that stay inside the root are accepted
    #[default]
    Portable,
    /// Targets are recorded verbatim
    PosixRaw,
}

impl std::str::FromStr for SymlinkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ignore" => Ok(SymlinkMode::Ignore),
            "portable" => Ok(SymlinkMode::Portable),
            "posix-raw" => Ok(SymlinkMode::PosixRaw),
            other => Err(format!("unknown symlink mode: {}", other)),
        }
    }
}

/// Whether a link at `link_path` with `target` is safe in portable mode
///
/// The target must be relative, use only `/` separators, and never climb above
/// the synchronization root when resolved from the link's parent directory.
pub fn is_portable_target(link_path: &str, target: &str) -> bool {
    if target.is_empty()
        || target.starts_with(PATH_SEPARATOR)
        || target.contains('\\')
        || target.contains('\0')
        || has_drive_prefix(target)
    {
        return false;
    }

    let mut depth = path::depth(link_path) as i64 - 1;
    for component in target.split(PATH_SEPARATOR) {
        match component {
            "" | "." => {}
            ".." => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => depth += 1,
        }
    }
    true
}

fn has_drive_prefix(target: &str) -> bool {
    let bytes = target.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
