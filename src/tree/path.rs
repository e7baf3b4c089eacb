//! Synchronization path utilities
//!
//! Synchronization paths are relative, slash-separated and independent of the
//! host platform. The root of a synchronization tree is the empty path.

use crate::types::PATH_SEPARATOR;
use std::path::{Path, PathBuf};
use unicode_normalization::{is_nfc, UnicodeNormalization};

/// Join a child name onto a synchronization path
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        let mut joined = String::with_capacity(parent.len() + 1 + name.len());
        joined.push_str(parent);
        joined.push(PATH_SEPARATOR);
        joined.push_str(name);
        joined
    }
}

/// Number of components in a path (the root has depth 0)
pub fn depth(path: &str) -> usize {
    if path.is_empty() {
        0
    } else {
        path.split(PATH_SEPARATOR).count()
    }
}

/// Iterate over the components of a path
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split(PATH_SEPARATOR).filter(|c| !c.is_empty())
}

/// Split a path into its parent path and final name
///
/// Returns None for the root.
pub fn split_last(path: &str) -> Option<(&str, &str)> {
    if path.is_empty() {
        return None;
    }
    match path.rfind(PATH_SEPARATOR) {
        Some(index) => Some((&path[..index], &path[index + 1..])),
        None => Some(("", path)),
    }
}

/// Whether a single entry name is acceptable inside a directory
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(PATH_SEPARATOR)
        && !name.contains('\0')
}

/// Validate a full synchronization path (root included)
pub fn is_valid_path(path: &str) -> bool {
    path.is_empty() || path.split(PATH_SEPARATOR).all(is_valid_name)
}

/// Resolve a synchronization path beneath a filesystem root
pub fn to_native(root: &Path, path: &str) -> PathBuf {
    let mut native = root.to_path_buf();
    for component in components(path) {
        native.push(component);
    }
    native
}

/// Recompose a name to Unicode NFC
///
/// Some filesystems hand back decomposed names; recomposing them keeps names
/// comparable across endpoints.
pub fn recompose_name(name: &str) -> String {
    if is_nfc(name) {
        name.to_string()
    } else {
        name.nfc().collect()
    }
}
