//! Python module/path mapping.
//!
//! `path_to_module` turns a file path into the dotted module it
//! provides (`src/pkg/a.py` → `src.pkg.a`, with `__init__.py` standing
//! for its package). The reverse direction is probing: dots become
//! slashes and both `m.py` and `m/__init__.py` are tried, under every
//! directory level so `src/` layouts resolve without configuration.

use crate::paths;

/// Dotted module provided by a Python file, or None for non-Python
/// paths.
pub fn path_to_module(file_path: &str) -> Option<String> {
    let ext = paths::extension(file_path);
    if ext != "py" && ext != "pyi" {
        return None;
    }
    let dir = paths::parent_dir(file_path);
    let stem = paths::file_stem(file_path);

    let mut parts: Vec<&str> = if dir.is_empty() {
        Vec::new()
    } else {
        dir.split('/').collect()
    };
    if stem != "__init__" {
        parts.push(stem);
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("."))
}

/// Candidate relative paths for a dotted module, without any directory
/// prefix: `a.b` → `a/b.py`, `a/b/__init__.py`.
pub fn module_to_candidate_paths(module: &str) -> [String; 2] {
    let rel = module.replace('.', "/");
    [format!("{rel}.py"), format!("{rel}/__init__.py")]
}

/// Resolve a relative import literal (leading dots) against the
/// importing file, producing an absolute dotted module.
///
/// `__init__.py` *is* its package, so `from . import x` inside one
/// resolves to the package itself; regular modules drop their final
/// segment first. Each dot beyond the first walks one more level up.
pub fn resolve_relative_literal(source_literal: &str, importer_path: &str) -> Option<String> {
    let stripped = source_literal.trim_start_matches('.');
    let dot_count = source_literal.len() - stripped.len();
    if dot_count == 0 {
        return Some(source_literal.to_string());
    }

    let importer_module = path_to_module(importer_path)?;
    let parts: Vec<&str> = importer_module.split('.').collect();
    let is_init = importer_path.ends_with("__init__.py");
    let mut package_parts: Vec<&str> = if is_init {
        parts
    } else {
        parts[..parts.len().saturating_sub(1)].to_vec()
    };

    let levels_up = dot_count - 1;
    if levels_up > 0 {
        if levels_up < package_parts.len() {
            package_parts.truncate(package_parts.len() - levels_up);
        } else {
            package_parts.clear();
        }
    }

    if package_parts.is_empty() {
        if stripped.is_empty() {
            return None;
        }
        return Some(stripped.to_string());
    }
    if stripped.is_empty() {
        Some(package_parts.join("."))
    } else {
        Some(format!("{}.{}", package_parts.join("."), stripped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_to_module() {
        assert_eq!(
            path_to_module("src/mypkg/a.py").as_deref(),
            Some("src.mypkg.a")
        );
        assert_eq!(
            path_to_module("src/mypkg/__init__.py").as_deref(),
            Some("src.mypkg")
        );
        assert_eq!(path_to_module("top.py").as_deref(), Some("top"));
        assert_eq!(path_to_module("__init__.py"), None);
        assert_eq!(path_to_module("src/a.rs"), None);
    }

    #[test]
    fn test_candidate_paths() {
        assert_eq!(
            module_to_candidate_paths("a.b"),
            ["a/b.py".to_string(), "a/b/__init__.py".to_string()]
        );
    }

    #[test]
    fn test_relative_from_module() {
        // `from ._make import x` inside src/attr/validators.py
        assert_eq!(
            resolve_relative_literal("._make", "src/attr/validators.py").as_deref(),
            Some("src.attr._make")
        );
    }

    #[test]
    fn test_relative_from_init() {
        // __init__.py IS the package
        assert_eq!(
            resolve_relative_literal("._make", "src/attr/__init__.py").as_deref(),
            Some("src.attr._make")
        );
        assert_eq!(
            resolve_relative_literal(".", "src/attr/__init__.py").as_deref(),
            Some("src.attr")
        );
    }

    #[test]
    fn test_double_dot() {
        assert_eq!(
            resolve_relative_literal("..utils", "src/pkg/sub/a.py").as_deref(),
            Some("src.pkg.utils")
        );
    }

    #[test]
    fn test_too_many_dots() {
        assert_eq!(
            resolve_relative_literal("...x", "a.py").as_deref(),
            Some("x")
        );
        assert_eq!(resolve_relative_literal("...", "a.py"), None);
    }
}
