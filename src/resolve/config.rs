//! Config-augmented declared modules for Go and Rust.
//!
//! Go files declare only a short package name; the full import path
//! comes from the nearest go.mod. Rust modules are derived from the
//! crate name in the nearest Cargo.toml plus the file's location under
//! `src/`, with `lib.rs`/`main.rs`/`mod.rs` contributing no terminal
//! segment.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

use crate::paths;

static GO_MOD_MODULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^module\s+(\S+)").unwrap());

/// Module path from a go.mod file.
pub fn parse_go_mod(text: &str) -> Option<String> {
    GO_MOD_MODULE
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// Crate name from a Cargo.toml file.
pub fn parse_cargo_name(text: &str) -> Option<String> {
    let table = text.parse::<toml::Table>().ok()?;
    table
        .get("package")?
        .get("name")?
        .as_str()
        .map(String::from)
}

/// Full Go import path for a file under a go.mod.
pub fn resolve_go_module(file_path: &str, go_mod_path: &str, module: &str) -> Option<String> {
    let go_mod_dir = paths::parent_dir(go_mod_path);
    let file_dir = paths::parent_dir(file_path);

    let rel_dir = if go_mod_dir.is_empty() {
        file_dir
    } else if paths::is_inside(file_dir, go_mod_dir) {
        paths::relative_to(file_dir, go_mod_dir)
    } else {
        return None;
    };

    if rel_dir.is_empty() {
        Some(module.to_string())
    } else {
        Some(format!("{module}/{rel_dir}"))
    }
}

/// Crate-qualified Rust module path for a file under a Cargo.toml.
pub fn resolve_rust_module(file_path: &str, cargo_path: &str, crate_name: &str) -> Option<String> {
    let cargo_dir = paths::parent_dir(cargo_path);
    let file_dir = paths::parent_dir(file_path);
    let stem = paths::file_stem(file_path);

    let mut rel = if cargo_dir.is_empty() {
        file_dir.to_string()
    } else if paths::is_inside(file_dir, cargo_dir) {
        paths::relative_to(file_dir, cargo_dir).to_string()
    } else {
        return None;
    };

    if let Some(stripped) = rel.strip_prefix("src/") {
        rel = stripped.to_string();
    } else if rel == "src" {
        rel = String::new();
    }

    let mut parts = vec![crate_name.to_string()];
    if !rel.is_empty() {
        parts.extend(rel.split('/').map(String::from));
    }
    if !matches!(stem, "lib" | "main" | "mod") {
        parts.push(stem.to_string());
    }
    Some(parts.join("::"))
}

/// Caches parsed config files for one repository and resolves declared
/// modules for Go and Rust files.
pub struct ConfigResolver {
    go_mods: HashMap<String, String>,
    cargo_tomls: HashMap<String, String>,
}

impl ConfigResolver {
    /// Discover and parse every go.mod and Cargo.toml in the file list.
    pub fn discover(all_paths: &[String], read_file: impl Fn(&str) -> Option<Vec<u8>>) -> Self {
        let mut go_mods = HashMap::new();
        let mut cargo_tomls = HashMap::new();
        for path in all_paths {
            match paths::file_name(path) {
                "go.mod" => {
                    if let Some(text) = read_file(path).and_then(|b| String::from_utf8(b).ok()) {
                        if let Some(module) = parse_go_mod(&text) {
                            debug!(path, module, "go.mod discovered");
                            go_mods.insert(path.clone(), module);
                        }
                    }
                }
                "Cargo.toml" => {
                    if let Some(text) = read_file(path).and_then(|b| String::from_utf8(b).ok()) {
                        if let Some(name) = parse_cargo_name(&text) {
                            debug!(path, name, "Cargo.toml discovered");
                            cargo_tomls.insert(path.clone(), name);
                        }
                    }
                }
                _ => {}
            }
        }
        Self {
            go_mods,
            cargo_tomls,
        }
    }

    /// Declared module for a Go or Rust file, or None for other
    /// languages and files outside any config's directory.
    pub fn resolve(&self, file_path: &str, language: &str) -> Option<String> {
        match language {
            "go" => {
                let (cfg_path, module) = nearest_config(file_path, &self.go_mods)?;
                resolve_go_module(file_path, cfg_path, module)
            }
            "rust" => {
                let (cfg_path, name) = nearest_config(file_path, &self.cargo_tomls)?;
                resolve_rust_module(file_path, cfg_path, name)
            }
            _ => None,
        }
    }
}

/// The deepest config whose directory contains the file.
fn nearest_config<'a>(
    file_path: &str,
    configs: &'a HashMap<String, String>,
) -> Option<(&'a str, &'a str)> {
    let file_dir = paths::parent_dir(file_path);
    let mut best: Option<(&str, &str)> = None;
    let mut best_depth: i64 = -1;
    for (cfg_path, value) in configs {
        let cfg_dir = paths::parent_dir(cfg_path);
        if cfg_dir.is_empty() || paths::is_inside(file_dir, cfg_dir) {
            let depth = if cfg_dir.is_empty() {
                0
            } else {
                cfg_dir.matches('/').count() as i64 + 1
            };
            let better = depth > best_depth
                || (depth == best_depth
                    && best.is_some_and(|(existing, _)| cfg_path.as_str() < existing));
            if better {
                best = Some((cfg_path.as_str(), value.as_str()));
                best_depth = depth;
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_go_mod() {
        assert_eq!(
            parse_go_mod("module github.com/user/repo\n\ngo 1.21\n").as_deref(),
            Some("github.com/user/repo")
        );
        assert_eq!(parse_go_mod("go 1.21\n"), None);
    }

    #[test]
    fn test_parse_cargo_name() {
        assert_eq!(
            parse_cargo_name("[package]\nname = \"my_crate\"\nversion = \"0.1.0\"\n").as_deref(),
            Some("my_crate")
        );
        assert_eq!(parse_cargo_name("[workspace]\nmembers = []\n"), None);
    }

    #[test]
    fn test_resolve_go_module() {
        assert_eq!(
            resolve_go_module("pkg/auth/token.go", "go.mod", "example.com/app").as_deref(),
            Some("example.com/app/pkg/auth")
        );
        assert_eq!(
            resolve_go_module("cmd/main.go", "go.mod", "example.com/app").as_deref(),
            Some("example.com/app/cmd")
        );
        assert_eq!(
            resolve_go_module("root.go", "go.mod", "example.com/app").as_deref(),
            Some("example.com/app")
        );
        assert_eq!(
            resolve_go_module("outside/x.go", "svc/go.mod", "example.com/svc"),
            None
        );
    }

    #[test]
    fn test_resolve_rust_module() {
        assert_eq!(
            resolve_rust_module("src/auth/token.rs", "Cargo.toml", "my_crate").as_deref(),
            Some("my_crate::auth::token")
        );
        assert_eq!(
            resolve_rust_module("src/lib.rs", "Cargo.toml", "my_crate").as_deref(),
            Some("my_crate")
        );
        assert_eq!(
            resolve_rust_module("src/auth/mod.rs", "Cargo.toml", "my_crate").as_deref(),
            Some("my_crate::auth")
        );
        assert_eq!(
            resolve_rust_module("crates/core/src/x.rs", "crates/core/Cargo.toml", "core")
                .as_deref(),
            Some("core::x")
        );
    }

    #[test]
    fn test_nearest_config_wins() {
        let all_paths = vec![
            "go.mod".to_string(),
            "svc/api/go.mod".to_string(),
            "svc/api/handler.go".to_string(),
        ];
        let resolver = ConfigResolver::discover(&all_paths, |p| match p {
            "go.mod" => Some(b"module example.com/root\n".to_vec()),
            "svc/api/go.mod" => Some(b"module example.com/api\n".to_vec()),
            _ => None,
        });
        assert_eq!(
            resolver.resolve("svc/api/handler.go", "go").as_deref(),
            Some("example.com/api")
        );
        assert_eq!(resolver.resolve("svc/api/handler.go", "python"), None);
    }
}
