//! Repository-relative POSIX path utilities.
//!
//! Every path that crosses a component boundary in this crate is a
//! forward-slash, repo-relative string. The helpers here are the only
//! place where `\` and `.`/`..` segments are dealt with.

use std::path::Path;

/// Convert a host path into a POSIX string. Backslashes become forward
/// slashes regardless of platform; no other normalization is applied.
pub fn to_posix(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Normalize a relative POSIX path: resolve `.` and `..` segments and
/// collapse empty segments. `..` at the root is dropped.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let normalized = path.replace('\\', "/");
    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Directory component of a POSIX path; empty string for top-level paths.
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Final component of a POSIX path.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Final component without its extension.
pub fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

/// Extension without the leading dot, lowercased. Empty when absent.
pub fn extension(path: &str) -> String {
    let name = file_name(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[idx + 1..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Segment-safe containment: is `path` equal to or nested under `root`?
/// An empty root contains everything.
pub fn is_inside(path: &str, root: &str) -> bool {
    if root.is_empty() {
        return true;
    }
    path == root || path.starts_with(&format!("{root}/"))
}

/// Strip `root` from `path`. Returns `path` unchanged when it is not
/// inside `root`, and the empty string when they are equal.
pub fn relative_to<'a>(path: &'a str, root: &str) -> &'a str {
    if root.is_empty() {
        return path;
    }
    if path == root {
        return "";
    }
    match path.strip_prefix(root) {
        Some(rest) => rest.strip_prefix('/').unwrap_or(path),
        None => path,
    }
}

/// Join two POSIX fragments, tolerating an empty left side.
pub fn join(base: &str, rest: &str) -> String {
    if base.is_empty() {
        rest.to_string()
    } else if rest.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{rest}")
    }
}

/// Directory depth of a path (number of separators in its parent).
pub fn depth(path: &str) -> usize {
    let dir = parent_dir(path);
    if dir.is_empty() {
        0
    } else {
        dir.matches('/').count() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("src/utils/../models/user"), "src/models/user");
        assert_eq!(normalize("src/./utils"), "src/utils");
        assert_eq!(normalize("./a/b"), "a/b");
        assert_eq!(normalize("../a"), "a");
        assert_eq!(normalize("a//b"), "a/b");
        assert_eq!(normalize(r"a\b\c"), "a/b/c");
    }

    #[test]
    fn test_components() {
        assert_eq!(parent_dir("src/mypkg/a.py"), "src/mypkg");
        assert_eq!(parent_dir("a.py"), "");
        assert_eq!(file_name("src/mypkg/a.py"), "a.py");
        assert_eq!(file_stem("src/mypkg/a.py"), "a");
        assert_eq!(file_stem("Makefile"), "Makefile");
        assert_eq!(file_stem(".gitignore"), ".gitignore");
        assert_eq!(extension("src/a.PY"), "py");
        assert_eq!(extension("Dockerfile"), "");
    }

    #[test]
    fn test_containment() {
        assert!(is_inside("src/app/main.rs", "src"));
        assert!(is_inside("src", "src"));
        assert!(is_inside("anything", ""));
        assert!(!is_inside("srcx/main.rs", "src"));

        assert_eq!(relative_to("src/app/main.rs", "src"), "app/main.rs");
        assert_eq!(relative_to("src", "src"), "");
        assert_eq!(relative_to("other/x", "src"), "other/x");
    }

    #[test]
    fn test_join_and_depth() {
        assert_eq!(join("", "a.py"), "a.py");
        assert_eq!(join("src", "a.py"), "src/a.py");
        assert_eq!(depth("a.py"), 0);
        assert_eq!(depth("src/a.py"), 1);
        assert_eq!(depth("src/pkg/a.py"), 2);
    }
}
