//! `.cplignore` handling, layered over the universal excludes.
//!
//! The ignore file lives at the repository root, one fnmatch-style
//! pattern per line, `#` comments allowed. Patterns match against
//! repo-relative POSIX paths. Universal excludes always apply and
//! cannot be re-included by the ignore file.

use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::warn;

/// Directory segments excluded from indexing everywhere.
pub const UNIVERSAL_EXCLUDE_SEGMENTS: &[&str] = &[
    "node_modules",
    ".git",
    "target",
    "dist",
    "build",
    "vendor",
    "venv",
    "__pycache__",
    ".codeplane",
];

/// True when any path segment is universally excluded.
pub fn has_excluded_segment(path: &str) -> bool {
    path.split('/')
        .any(|seg| UNIVERSAL_EXCLUDE_SEGMENTS.contains(&seg))
}

/// Compiled ignore rules for one repository.
#[derive(Debug)]
pub struct IgnoreRules {
    set: Option<GlobSet>,
    /// Raw file bytes backing `content_hash`; empty when no ignore file.
    raw: String,
}

impl IgnoreRules {
    pub const FILE_NAME: &'static str = ".cplignore";

    /// Load `.cplignore` from the repository root. A missing file yields
    /// empty rules; an unreadable one is treated the same with a warning.
    pub fn load(repo_root: &Path) -> Self {
        match std::fs::read_to_string(repo_root.join(Self::FILE_NAME)) {
            Ok(text) => Self::from_text(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::empty(),
            Err(e) => {
                warn!(error = %e, "failed to read .cplignore, ignoring it");
                Self::empty()
            }
        }
    }

    pub fn empty() -> Self {
        Self {
            set: None,
            raw: String::new(),
        }
    }

    /// Parse ignore rules from file text.
    pub fn from_text(text: &str) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut any = false;
        for line in text.lines() {
            let pattern = line.trim();
            if pattern.is_empty() || pattern.starts_with('#') {
                continue;
            }
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                    any = true;
                }
                Err(e) => warn!(pattern, error = %e, "invalid .cplignore pattern, skipped"),
            }
        }
        let set = if any { builder.build().ok() } else { None };
        Self {
            set,
            raw: text.to_string(),
        }
    }

    /// Is the path excluded, either universally or by the ignore file?
    pub fn is_ignored(&self, path: &str) -> bool {
        if has_excluded_segment(path) {
            return true;
        }
        match &self.set {
            Some(set) => set.is_match(path),
            None => false,
        }
    }

    /// Hash of the ignore file contents, used to detect changes between
    /// epochs. Stable empty-file hash when no ignore file exists.
    pub fn content_hash(&self) -> String {
        let digest = Sha256::digest(self.raw.as_bytes());
        format!("{digest:x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_universal_excludes() {
        let rules = IgnoreRules::empty();
        assert!(rules.is_ignored("node_modules/react/index.js"));
        assert!(rules.is_ignored("a/b/__pycache__/x.pyc"));
        assert!(rules.is_ignored(".codeplane/index.db"));
        assert!(!rules.is_ignored("src/main.py"));
    }

    #[test]
    fn test_cplignore_patterns() {
        let rules = IgnoreRules::from_text("# generated files\n**/generated*.py\n\n*.lock\n");
        assert!(rules.is_ignored("src/generated_api.py"));
        assert!(rules.is_ignored("generated.py"));
        assert!(rules.is_ignored("deps/Cargo.lock"));
        assert!(!rules.is_ignored("src/main.py"));
    }

    #[test]
    fn test_universal_cannot_be_reincluded() {
        // No negation syntax exists; a pattern never un-ignores.
        let rules = IgnoreRules::from_text("!node_modules/**\n");
        assert!(rules.is_ignored("node_modules/pkg/index.js"));
    }

    #[test]
    fn test_invalid_pattern_skipped() {
        let rules = IgnoreRules::from_text("[invalid\n*.tmp\n");
        assert!(rules.is_ignored("a.tmp"));
    }

    #[test]
    fn test_content_hash_changes() {
        let a = IgnoreRules::from_text("*.tmp\n");
        let b = IgnoreRules::from_text("*.log\n");
        assert_ne!(a.content_hash(), b.content_hash());
        assert_eq!(
            IgnoreRules::empty().content_hash(),
            IgnoreRules::from_text("").content_hash()
        );
    }
}
