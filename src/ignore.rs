//! Ignore rules for scans.
//!
//! Rules are ordered gitignore-style globs matched against synchronization
//! paths. A leading `!` re-includes a path, the last matching rule wins, and
//! paths that match nothing are included. When a directory is ignored its whole
//! subtree is skipped, so a negated rule cannot re-include a child of an
//! ignored directory.

use crate::error::ScanError;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::Match;
use std::path::Path;

/// Version control metadata directories ignored when `ignore_vcs` is set.
pub const VCS_DEFAULTS: &[&str] = &[".git", ".svn", ".hg", ".bzr", "_darcs"];

/// Compiled ignore rules
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    patterns: Vec<String>,
    matcher: Gitignore,
}

impl IgnoreMatcher {
    /// Compile the given patterns in order.
    ///
    /// When `ignore_vcs` is set the VCS directories are ignored first, so user
    /// patterns can still negate them.
    pub fn new(patterns: &[String], ignore_vcs: bool) -> Result<Self, ScanError> {
        let mut builder = GitignoreBuilder::new("");
        let mut all = Vec::with_capacity(patterns.len() + VCS_DEFAULTS.len());
        if ignore_vcs {
            all.extend(VCS_DEFAULTS.iter().map(|p| p.to_string()));
        }
        all.extend(patterns.iter().cloned());

        for pattern in &all {
            validate_pattern(pattern)?;
            builder
                .add_line(None, pattern)
                .map_err(|e| ScanError::InvalidIgnorePattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
        }
        let matcher = builder
            .build()
            .map_err(|e| ScanError::InvalidIgnorePattern {
                pattern: all.join(", "),
                reason: e.to_string(),
            })?;

        Ok(Self {
            patterns: all,
            matcher,
        })
    }

    /// A matcher that includes everything
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            matcher: Gitignore::empty(),
        }
    }

    /// Whether the path (relative, slash-separated) is excluded
    pub fn is_ignored(&self, path: &str, is_dir: bool) -> bool {
        if self.patterns.is_empty() || path.is_empty() {
            return false;
        }
        matches!(self.matcher.matched(Path::new(path), is_dir), Match::Ignore(_))
    }

    /// The effective patterns, in evaluation order
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for IgnoreMatcher {
    fn default() -> Self {
        Self::empty()
    }
}

/// Reject patterns that can never match anything meaningful.
fn validate_pattern(pattern: &str) -> Result<(), ScanError> {
    let body = pattern.strip_prefix('!').unwrap_or(pattern);
    if body.trim().is_empty() {
        return Err(ScanError::InvalidIgnorePattern {
            pattern: pattern.to_string(),
            reason: "empty pattern".to_string(),
        });
    }
    if body.starts_with('#') {
        return Err(ScanError::InvalidIgnorePattern {
            pattern: pattern.to_string(),
            reason: "patterns cannot start with '#'".to_string(),
        });
    }
    Ok(())
}
