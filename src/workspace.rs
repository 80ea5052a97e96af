//! External collaborator seams: the working tree and git.
//!
//! The core never walks the filesystem directly during extraction; it
//! consumes a [`WorkingTree`] so tests can feed in-memory trees and the
//! production path can swap walkers. Git is reduced to the two reads
//! the coordinator needs: HEAD for epoch stamping, blobs for the
//! semantic-diff collaborator.

use ignore::WalkBuilder;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::ignore_rules::has_excluded_segment;
use crate::paths;

/// Read access to the repository's working tree. Paths are POSIX and
/// repo-relative.
pub trait WorkingTree: Send + Sync {
    /// File content, or None when the path does not exist.
    fn read_file(&self, path: &str) -> Option<Vec<u8>>;

    /// Every candidate file path, unordered. Universal excludes are
    /// already filtered; `.cplignore` is applied later by the caller.
    fn list_paths(&self) -> Vec<String>;
}

/// OS-backed working tree rooted at a repository directory.
pub struct OsWorkingTree {
    root: PathBuf,
}

impl OsWorkingTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl WorkingTree for OsWorkingTree {
    fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        std::fs::read(self.root.join(path)).ok()
    }

    fn list_paths(&self) -> Vec<String> {
        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .follow_links(false)
            .require_git(false)
            .build();

        let mut out = Vec::new();
        for entry in walker.flatten() {
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let posix = paths::to_posix(rel);
            if posix.is_empty() || has_excluded_segment(&posix) {
                continue;
            }
            out.push(posix);
        }
        debug!(count = out.len(), "working tree enumerated");
        out
    }
}

/// In-memory working tree for tests.
#[derive(Default)]
pub struct MemoryWorkingTree {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryWorkingTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, content: impl Into<Vec<u8>>) {
        self.files.insert(path.to_string(), content.into());
    }

    pub fn remove(&mut self, path: &str) {
        self.files.remove(path);
    }
}

impl WorkingTree for MemoryWorkingTree {
    fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.get(path).cloned()
    }

    fn list_paths(&self) -> Vec<String> {
        self.files
            .keys()
            .filter(|p| !has_excluded_segment(p))
            .cloned()
            .collect()
    }
}

/// Minimal git access used to stamp epochs.
pub trait GitReader: Send + Sync {
    /// Current HEAD commit sha, or None outside a repository.
    fn head_sha(&self) -> Option<String>;

    /// Blob content at a ref, for the semantic-diff collaborator.
    fn read_blob_at(&self, reference: &str, path: &str) -> Option<Vec<u8>>;
}

/// Reads `.git/HEAD` and loose refs directly; enough for epoch stamping
/// without shelling out.
pub struct DotGitReader {
    root: PathBuf,
}

impl DotGitReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl GitReader for DotGitReader {
    fn head_sha(&self) -> Option<String> {
        let head = std::fs::read_to_string(self.root.join(".git/HEAD")).ok()?;
        let head = head.trim();
        if let Some(reference) = head.strip_prefix("ref: ") {
            let loose = self.root.join(".git").join(reference);
            if let Ok(sha) = std::fs::read_to_string(loose) {
                return Some(sha.trim().to_string());
            }
            // Packed refs fallback
            let packed = std::fs::read_to_string(self.root.join(".git/packed-refs")).ok()?;
            for line in packed.lines() {
                if let Some((sha, name)) = line.split_once(' ') {
                    if name.trim() == reference {
                        return Some(sha.trim().to_string());
                    }
                }
            }
            None
        } else {
            // Detached HEAD holds the sha inline
            Some(head.to_string())
        }
    }

    fn read_blob_at(&self, _reference: &str, _path: &str) -> Option<Vec<u8>> {
        // Blob access requires object-store plumbing this core does not
        // carry; collaborators with real git bindings implement it.
        None
    }
}

/// Git reader for repositories without git state.
pub struct NoGit;

impl GitReader for NoGit {
    fn head_sha(&self) -> Option<String> {
        None
    }

    fn read_blob_at(&self, _reference: &str, _path: &str) -> Option<Vec<u8>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_os_working_tree_lists_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/main.py"), "x = 1\n").unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "").unwrap();

        let tree = OsWorkingTree::new(root);
        let mut listed = tree.list_paths();
        listed.sort();
        assert_eq!(listed, vec!["src/main.py"]);
        assert_eq!(tree.read_file("src/main.py").unwrap(), b"x = 1\n");
        assert!(tree.read_file("missing.py").is_none());
    }

    #[test]
    fn test_memory_working_tree() {
        let mut tree = MemoryWorkingTree::new();
        tree.insert("a.py", "pass");
        tree.insert("target/skip.rs", "fn main() {}");
        assert_eq!(tree.list_paths(), vec!["a.py"]);
        tree.remove("a.py");
        assert!(tree.read_file("a.py").is_none());
    }

    #[test]
    fn test_dot_git_reader_loose_ref() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join(".git/refs/heads")).unwrap();
        fs::write(root.join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        fs::write(root.join(".git/refs/heads/main"), "abc123\n").unwrap();

        let git = DotGitReader::new(root);
        assert_eq!(git.head_sha().as_deref(), Some("abc123"));
    }

    #[test]
    fn test_no_git() {
        assert!(NoGit.head_sha().is_none());
    }
}
