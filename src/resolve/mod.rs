//! Import resolution: source literal → repository-relative file path.
//!
//! Runs at index time over the full batch of extracted facts, so query
//! time pays nothing. Five strategies, dispatched on the import kind:
//!
//! - **Declaration match** (Java, Kotlin, Scala, C#, Go, Haskell,
//!   Elixir, Ruby, PHP): the literal is compared against known
//!   `declared_module` values, exact first, then longest prefix with
//!   the rest treated as a symbol path.
//! - **Path rewrite** (Python): dots become slashes, `m.py` and
//!   `m/__init__.py` are probed under every directory level.
//! - **Relative path** (JS/TS, C/C++): resolve against the importer's
//!   directory with extension and index probing.
//! - **Config-augmented** (Go, Rust): declared modules come from
//!   go.mod / Cargo.toml (see [`config::ConfigResolver`]); Rust
//!   `crate::`/`self::`/`super::` prefixes are rewritten before the
//!   declaration match.
//! - **Require probe** (Lua): dotted module probed as `m.lua` and
//!   `m/init.lua` under common source prefixes.
//!
//! Unresolvable imports are not errors: `resolved_path` stays None.

pub mod config;
pub mod modmap;

pub use config::ConfigResolver;

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::paths;
use crate::types::ImportKind;

/// JS/TS extensions probed when resolving relative imports.
const JS_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".mts", ".cts"];

/// Common directory prefixes probed for C/C++ includes and Lua requires.
const C_PREFIXES: &[&str] = &["include", "src", "lib", "third_party"];
const LUA_PREFIXES: &[&str] = &["", "src/", "lib/", "lua/"];

/// Resolves import source literals against the indexed file set.
pub struct ImportPathResolver {
    all_paths: HashSet<String>,
    /// declared_module → file paths (several files can share a module).
    module_to_paths: HashMap<String, Vec<String>>,
    /// file path → declared_module (Rust self::/super:: rewriting).
    path_to_module: HashMap<String, String>,
    /// First `::`-segment seen in any Rust declared module.
    rust_crate_prefix: Option<String>,
    /// Every directory in the repo, shallow first then alphabetical,
    /// with the root first. Probe order for Python's src layouts.
    directory_prefixes: Vec<String>,
}

impl ImportPathResolver {
    pub fn new(all_paths: &[String], declared_modules: &HashMap<String, String>) -> Self {
        let mut module_to_paths: HashMap<String, Vec<String>> = HashMap::new();
        for (file_path, module) in declared_modules {
            module_to_paths
                .entry(module.clone())
                .or_default()
                .push(file_path.clone());
        }
        for paths_for_module in module_to_paths.values_mut() {
            paths_for_module.sort();
        }

        let rust_crate_prefix = {
            let mut prefixes: Vec<&str> = declared_modules
                .values()
                .filter(|m| m.contains("::"))
                .map(|m| m.split("::").next().unwrap())
                .collect();
            prefixes.sort();
            prefixes.first().map(|s| s.to_string())
        };

        let mut dirs: BTreeSet<String> = BTreeSet::new();
        for path in all_paths {
            let mut dir = paths::parent_dir(path);
            while !dir.is_empty() {
                dirs.insert(dir.to_string());
                dir = paths::parent_dir(dir);
            }
        }
        let mut directory_prefixes: Vec<String> = vec![String::new()];
        let mut sorted_dirs: Vec<String> = dirs.into_iter().collect();
        sorted_dirs.sort_by_key(|d| (d.matches('/').count(), d.clone()));
        directory_prefixes.extend(sorted_dirs);

        Self {
            all_paths: all_paths.iter().cloned().collect(),
            module_to_paths,
            path_to_module: declared_modules.clone(),
            rust_crate_prefix,
            directory_prefixes,
        }
    }

    /// Resolve one import. Returns a repo-relative path or None.
    pub fn resolve(
        &self,
        source_literal: &str,
        kind: ImportKind,
        importer_path: &str,
    ) -> Option<String> {
        if source_literal.is_empty() {
            return None;
        }
        match kind {
            ImportKind::PythonImport | ImportKind::PythonFrom => {
                self.resolve_python(source_literal, importer_path)
            }
            ImportKind::JsImport | ImportKind::JsRequire | ImportKind::JsDynamicImport => {
                self.resolve_js(source_literal, importer_path)
            }
            ImportKind::CInclude => self.resolve_c(source_literal, importer_path),
            ImportKind::LuaRequire => self.resolve_lua(source_literal),
            ImportKind::RubyRequireRelative => {
                self.resolve_ruby_relative(source_literal, importer_path)
            }
            _ => self.resolve_declaration_based(source_literal, kind, importer_path),
        }
    }

    // ----- Python -----

    fn resolve_python(&self, source_literal: &str, importer_path: &str) -> Option<String> {
        let literal = if source_literal.starts_with('.') {
            modmap::resolve_relative_literal(source_literal, importer_path)?
        } else {
            source_literal.to_string()
        };

        for prefix in &self.directory_prefixes {
            for candidate in modmap::module_to_candidate_paths(&literal) {
                let probe = paths::join(prefix, &candidate);
                if self.all_paths.contains(&probe) {
                    return Some(probe);
                }
            }
        }
        // Longest-prefix fallback: `pkg.mod.symbol` where `symbol` is a
        // name inside `pkg/mod.py`.
        let parts: Vec<&str> = literal.split('.').collect();
        for take in (1..parts.len()).rev() {
            let shorter = parts[..take].join(".");
            for prefix in &self.directory_prefixes {
                for candidate in modmap::module_to_candidate_paths(&shorter) {
                    let probe = paths::join(prefix, &candidate);
                    if self.all_paths.contains(&probe) {
                        return Some(probe);
                    }
                }
            }
        }
        None
    }

    // ----- JS / TS -----

    fn resolve_js(&self, source_literal: &str, importer_path: &str) -> Option<String> {
        if !source_literal.starts_with('.') {
            // Bare specifier: an external package, not a repo file.
            return None;
        }
        let importer_dir = paths::parent_dir(importer_path);
        let resolved = paths::normalize(&format!("{importer_dir}/{source_literal}"));

        if self.all_paths.contains(&resolved) {
            return Some(resolved);
        }

        // TypeScript convention: `./foo.js` may point at `./foo.ts`.
        let mut stem = resolved.as_str();
        for js_ext in [".js", ".jsx", ".mjs"] {
            if let Some(stripped) = resolved.strip_suffix(js_ext) {
                stem = stripped;
                break;
            }
        }

        for ext in JS_EXTENSIONS {
            let candidate = format!("{stem}{ext}");
            if self.all_paths.contains(&candidate) {
                return Some(candidate);
            }
        }

        for ext in JS_EXTENSIONS {
            let candidate = format!("{resolved}/index{ext}");
            if self.all_paths.contains(&candidate) {
                return Some(candidate);
            }
        }

        None
    }

    // ----- C / C++ -----

    fn resolve_c(&self, source_literal: &str, importer_path: &str) -> Option<String> {
        let importer_dir = paths::parent_dir(importer_path);
        let resolved = paths::normalize(&format!("{importer_dir}/{source_literal}"));
        if self.all_paths.contains(&resolved) {
            return Some(resolved);
        }
        if self.all_paths.contains(source_literal) {
            return Some(source_literal.to_string());
        }
        for prefix in C_PREFIXES {
            let candidate = format!("{prefix}/{source_literal}");
            if self.all_paths.contains(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    // ----- Lua -----

    fn resolve_lua(&self, source_literal: &str) -> Option<String> {
        let rel = source_literal.replace('.', "/");
        for prefix in LUA_PREFIXES {
            let candidate = format!("{prefix}{rel}.lua");
            if self.all_paths.contains(&candidate) {
                return Some(candidate);
            }
            let candidate = format!("{prefix}{rel}/init.lua");
            if self.all_paths.contains(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    // ----- Ruby require_relative -----

    fn resolve_ruby_relative(&self, source_literal: &str, importer_path: &str) -> Option<String> {
        let importer_dir = paths::parent_dir(importer_path);
        let resolved = paths::normalize(&format!("{importer_dir}/{source_literal}"));
        if self.all_paths.contains(&resolved) {
            return Some(resolved);
        }
        let candidate = format!("{resolved}.rb");
        if self.all_paths.contains(&candidate) {
            return Some(candidate);
        }
        None
    }

    // ----- Declaration match -----

    fn resolve_declaration_based(
        &self,
        source_literal: &str,
        kind: ImportKind,
        importer_path: &str,
    ) -> Option<String> {
        let literal = if kind == ImportKind::RustUse {
            self.normalize_rust_source(source_literal, importer_path)
        } else {
            source_literal.to_string()
        };

        if let Some(candidates) = self.module_to_paths.get(&literal) {
            return self.pick_best_path(candidates, &[], importer_path);
        }

        let separator = separator_for_kind(kind);
        let parts: Vec<&str> = literal.split(separator).collect();
        for take in (1..parts.len()).rev() {
            let prefix = parts[..take].join(separator);
            if let Some(candidates) = self.module_to_paths.get(&prefix) {
                return self.pick_best_path(candidates, &parts[take..], importer_path);
            }
        }
        None
    }

    /// Disambiguate among files sharing a declared module: match the
    /// suffix's last segment against filename stems (case-insensitive),
    /// then substring containment of the joined suffix, then nearest by
    /// directory depth to the importer, then alphabetical.
    fn pick_best_path(
        &self,
        candidates: &[String],
        suffix_parts: &[&str],
        importer_path: &str,
    ) -> Option<String> {
        if candidates.is_empty() {
            return None;
        }
        if candidates.len() == 1 {
            return Some(candidates[0].clone());
        }

        if let Some(last) = suffix_parts.last() {
            let target = last.to_lowercase();
            if let Some(hit) = candidates
                .iter()
                .find(|p| paths::file_stem(p).to_lowercase() == target)
            {
                return Some(hit.clone());
            }
            if suffix_parts.len() > 1 {
                let sub = suffix_parts
                    .iter()
                    .map(|s| s.to_lowercase())
                    .collect::<Vec<_>>()
                    .join("/");
                if let Some(hit) = candidates.iter().find(|p| p.to_lowercase().contains(&sub)) {
                    return Some(hit.clone());
                }
            }
        }

        let importer_dir = paths::parent_dir(importer_path);
        let mut ranked: Vec<&String> = candidates.iter().collect();
        ranked.sort_by_key(|p| {
            (
                depth_distance(paths::parent_dir(p), importer_dir),
                p.as_str().to_string(),
            )
        });
        ranked.first().map(|p| (*p).clone())
    }

    /// Rewrite Rust relative prefixes to crate-qualified paths:
    /// `crate::m` → `<crate>::m`, `self::x` → `<module>::x`,
    /// `super::x` → `<parent>::x`.
    fn normalize_rust_source(&self, source_literal: &str, importer_path: &str) -> String {
        if let Some(rest) = source_literal.strip_prefix("crate::") {
            return match &self.rust_crate_prefix {
                Some(prefix) => format!("{prefix}::{rest}"),
                None => source_literal.to_string(),
            };
        }
        if source_literal.starts_with("self::") || source_literal.starts_with("super::") {
            let Some(importer_module) = self.path_to_module.get(importer_path) else {
                return source_literal.to_string();
            };
            let parts: Vec<&str> = importer_module.split("::").collect();
            if let Some(rest) = source_literal.strip_prefix("self::") {
                return format!("{}::{rest}", parts.join("::"));
            }
            if let Some(rest) = source_literal.strip_prefix("super::") {
                if parts.len() > 1 {
                    return format!("{}::{rest}", parts[..parts.len() - 1].join("::"));
                }
            }
        }
        source_literal.to_string()
    }
}

/// Module path separator per import kind.
fn separator_for_kind(kind: ImportKind) -> &'static str {
    match kind {
        ImportKind::RustUse => "::",
        ImportKind::GoImport | ImportKind::RubyRequire => "/",
        _ => ".",
    }
}

/// How far apart two directories sit in the tree.
fn depth_distance(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    let a_parts: Vec<&str> = if a.is_empty() { vec![] } else { a.split('/').collect() };
    let b_parts: Vec<&str> = if b.is_empty() { vec![] } else { b.split('/').collect() };
    let common = a_parts
        .iter()
        .zip(b_parts.iter())
        .take_while(|(x, y)| x == y)
        .count();
    (a_parts.len() - common) + (b_parts.len() - common)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(paths: &[&str], modules: &[(&str, &str)]) -> ImportPathResolver {
        let all: Vec<String> = paths.iter().map(|s| s.to_string()).collect();
        let declared: HashMap<String, String> = modules
            .iter()
            .map(|(p, m)| (p.to_string(), m.to_string()))
            .collect();
        ImportPathResolver::new(&all, &declared)
    }

    #[test]
    fn test_python_src_layout() {
        let r = resolver(
            &[
                "pyproject.toml",
                "src/mypkg/__init__.py",
                "src/mypkg/a.py",
                "src/mypkg/b.py",
            ],
            &[],
        );
        assert_eq!(
            r.resolve("mypkg.a", ImportKind::PythonFrom, "src/mypkg/b.py")
                .as_deref(),
            Some("src/mypkg/a.py")
        );
    }

    #[test]
    fn test_python_package_init() {
        let r = resolver(&["pkg/__init__.py", "pkg/mod.py"], &[]);
        assert_eq!(
            r.resolve("pkg", ImportKind::PythonImport, "main.py")
                .as_deref(),
            Some("pkg/__init__.py")
        );
    }

    #[test]
    fn test_python_relative() {
        let r = resolver(&["src/attr/__init__.py", "src/attr/_make.py"], &[]);
        assert_eq!(
            r.resolve("._make", ImportKind::PythonFrom, "src/attr/__init__.py")
                .as_deref(),
            Some("src/attr/_make.py")
        );
    }

    #[test]
    fn test_python_symbol_suffix_fallback() {
        let r = resolver(&["pkg/util.py"], &[]);
        assert_eq!(
            r.resolve("pkg.util.helper", ImportKind::PythonFrom, "main.py")
                .as_deref(),
            Some("pkg/util.py")
        );
    }

    #[test]
    fn test_js_extension_probing() {
        let r = resolver(&["src/app.ts", "src/utils.ts", "src/widgets/index.tsx"], &[]);
        assert_eq!(
            r.resolve("./utils", ImportKind::JsImport, "src/app.ts")
                .as_deref(),
            Some("src/utils.ts")
        );
        // .js literal remaps to the .ts source
        assert_eq!(
            r.resolve("./utils.js", ImportKind::JsImport, "src/app.ts")
                .as_deref(),
            Some("src/utils.ts")
        );
        // Directory resolves through its index file
        assert_eq!(
            r.resolve("./widgets", ImportKind::JsImport, "src/app.ts")
                .as_deref(),
            Some("src/widgets/index.tsx")
        );
        // Bare specifier is an external package
        assert_eq!(r.resolve("react", ImportKind::JsImport, "src/app.ts"), None);
    }

    #[test]
    fn test_js_parent_relative() {
        let r = resolver(&["src/models/user.ts", "src/views/page.ts"], &[]);
        assert_eq!(
            r.resolve("../models/user", ImportKind::JsImport, "src/views/page.ts")
                .as_deref(),
            Some("src/models/user.ts")
        );
    }

    #[test]
    fn test_c_include_prefixes() {
        let r = resolver(&["include/app/config.h", "src/main.c", "src/local.h"], &[]);
        assert_eq!(
            r.resolve("local.h", ImportKind::CInclude, "src/main.c")
                .as_deref(),
            Some("src/local.h")
        );
        assert_eq!(
            r.resolve("app/config.h", ImportKind::CInclude, "src/main.c")
                .as_deref(),
            Some("include/app/config.h")
        );
        assert_eq!(
            r.resolve("sys/missing.h", ImportKind::CInclude, "src/main.c"),
            None
        );
    }

    #[test]
    fn test_lua_require_probes() {
        let r = resolver(&["src/a/b/c.lua", "lib/d/init.lua"], &[]);
        assert_eq!(
            r.resolve("a.b.c", ImportKind::LuaRequire, "main.lua")
                .as_deref(),
            Some("src/a/b/c.lua")
        );
        assert_eq!(
            r.resolve("d", ImportKind::LuaRequire, "main.lua").as_deref(),
            Some("lib/d/init.lua")
        );
    }

    #[test]
    fn test_ruby_require_relative() {
        let r = resolver(&["lib/app/helper.rb", "lib/app/main.rb"], &[]);
        assert_eq!(
            r.resolve(
                "./helper",
                ImportKind::RubyRequireRelative,
                "lib/app/main.rb"
            )
            .as_deref(),
            Some("lib/app/helper.rb")
        );
    }

    #[test]
    fn test_go_declaration_match() {
        let r = resolver(
            &["pkg/util/u.go", "cmd/main.go"],
            &[
                ("pkg/util/u.go", "example.com/app/pkg/util"),
                ("cmd/main.go", "example.com/app/cmd"),
            ],
        );
        assert_eq!(
            r.resolve(
                "example.com/app/pkg/util",
                ImportKind::GoImport,
                "cmd/main.go"
            )
            .as_deref(),
            Some("pkg/util/u.go")
        );
    }

    #[test]
    fn test_java_prefix_match_with_stem() {
        let r = resolver(
            &["src/cats/effect/IO.java", "src/cats/effect/SyncIO.java"],
            &[
                ("src/cats/effect/IO.java", "cats.effect"),
                ("src/cats/effect/SyncIO.java", "cats.effect"),
            ],
        );
        // `cats.effect.IO` prefix-matches `cats.effect`; the suffix's
        // last segment picks the file by stem.
        assert_eq!(
            r.resolve("cats.effect.IO", ImportKind::JavaImport, "src/Main.java")
                .as_deref(),
            Some("src/cats/effect/IO.java")
        );
        assert_eq!(
            r.resolve(
                "cats.effect.SyncIO",
                ImportKind::JavaImport,
                "src/Main.java"
            )
            .as_deref(),
            Some("src/cats/effect/SyncIO.java")
        );
    }

    #[test]
    fn test_rust_crate_rewrite() {
        let r = resolver(
            &["src/lib.rs", "src/auth/token.rs", "src/auth/mod.rs"],
            &[
                ("src/lib.rs", "my_crate"),
                ("src/auth/token.rs", "my_crate::auth::token"),
                ("src/auth/mod.rs", "my_crate::auth"),
            ],
        );
        assert_eq!(
            r.resolve("crate::auth::token", ImportKind::RustUse, "src/lib.rs")
                .as_deref(),
            Some("src/auth/token.rs")
        );
        assert_eq!(
            r.resolve("self::token", ImportKind::RustUse, "src/auth/mod.rs")
                .as_deref(),
            Some("src/auth/token.rs")
        );
        assert_eq!(
            r.resolve("super::auth", ImportKind::RustUse, "src/auth/token.rs")
                .as_deref(),
            Some("src/auth/mod.rs")
        );
    }

    #[test]
    fn test_unresolvable_is_none() {
        let r = resolver(&["a.py"], &[]);
        assert_eq!(r.resolve("missing.module", ImportKind::PythonImport, "a.py"), None);
        assert_eq!(r.resolve("", ImportKind::PythonImport, "a.py"), None);
    }

    #[test]
    fn test_depth_distance() {
        assert_eq!(depth_distance("a/b", "a/b"), 0);
        assert_eq!(depth_distance("a/b", "a/c"), 2);
        assert_eq!(depth_distance("", "a"), 1);
    }
}
