//! Tier-1 authority filtering of discovered candidates.
//!
//! Families with strict workspace management (JavaScript workspaces, Go
//! go.work, Cargo workspaces, Gradle/Maven, .NET solutions) list their
//! member packages in the tier-1 config. A tier-2 candidate nested under
//! such a root that the config does not list is *detached*: it stays a
//! context, but the workspace does not own it.
//!
//! Malformed configs detach everything nested under the root (safety
//! first) and leave a warning; a workspace with no member list at all
//! passes candidates through untouched.

use globset::GlobBuilder;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::discovery::CandidateContext;
use crate::paths;
use crate::registry::LanguageFamily;
use crate::types::{ContextTier, ProbeStatus};
use crate::workspace::WorkingTree;

/// Result of authority filtering.
#[derive(Debug, Default)]
pub struct AuthorityResult {
    pub pending: Vec<CandidateContext>,
    pub detached: Vec<CandidateContext>,
    pub warnings: Vec<String>,
}

/// Member list extracted from one tier-1 root.
struct WorkspaceAuthority {
    root: String,
    entries: Vec<String>,
    /// True when a config existed but could not be parsed; strict mode
    /// then detaches everything nested instead of passing it through.
    parse_failed: bool,
    /// Gradle configs using variables downgrade to permissive.
    permissive: bool,
}

/// Filters tier-2 candidates against tier-1 workspace configuration.
pub struct Tier1AuthorityFilter<'a> {
    tree: &'a dyn WorkingTree,
}

impl<'a> Tier1AuthorityFilter<'a> {
    pub fn new(tree: &'a dyn WorkingTree) -> Self {
        Self { tree }
    }

    /// Apply the filter. Candidates of families without an authority
    /// mechanism pass through unchanged.
    pub fn apply(&self, candidates: Vec<CandidateContext>) -> AuthorityResult {
        let mut result = AuthorityResult::default();

        let mut by_family: Vec<(LanguageFamily, Vec<CandidateContext>)> = Vec::new();
        for candidate in candidates {
            let family = candidate.language_family;
            let index = match by_family.iter().position(|(f, _)| *f == family) {
                Some(index) => index,
                None => {
                    by_family.push((family, Vec::new()));
                    by_family.len() - 1
                }
            };
            by_family[index].1.push(candidate);
        }

        for (family, group) in by_family {
            match family {
                LanguageFamily::JavaScript
                | LanguageFamily::Go
                | LanguageFamily::Rust
                | LanguageFamily::Jvm
                | LanguageFamily::Dotnet => self.filter_strict(family, group, &mut result),
                // No tier-1 workspace mechanism: pyproject.toml, Gemfile,
                // composer.json and friends are only package markers.
                _ => result.pending.extend(group),
            }
        }

        debug!(
            pending = result.pending.len(),
            detached = result.detached.len(),
            "authority filter applied"
        );
        result
    }

    fn filter_strict(
        &self,
        family: LanguageFamily,
        candidates: Vec<CandidateContext>,
        result: &mut AuthorityResult,
    ) {
        let tier1_auth: Vec<WorkspaceAuthority> = candidates
            .iter()
            .filter(|c| c.tier == Some(ContextTier::Workspace))
            .map(|t1| self.load_authority(family, t1, &mut result.warnings))
            .collect();

        if tier1_auth.is_empty() {
            result.pending.extend(candidates);
            return;
        }

        for mut candidate in candidates {
            if candidate.tier == Some(ContextTier::Workspace) {
                result.pending.push(candidate);
                continue;
            }

            let mut governed = false;
            let mut matched = false;
            for auth in &tier1_auth {
                if !paths::is_inside(&candidate.root_path, &auth.root) {
                    continue;
                }
                if auth.permissive {
                    matched = true;
                    break;
                }
                if auth.entries.is_empty() && !auth.parse_failed {
                    // Workspace marker with no member list: no authority
                    // claim is made, nothing detaches.
                    continue;
                }
                governed = true;
                let rel = paths::relative_to(&candidate.root_path, &auth.root);
                if matches_workspace_entry(rel, &auth.entries) {
                    matched = true;
                    break;
                }
            }

            if matched || !governed {
                result.pending.push(candidate);
            } else {
                candidate.probe_status = ProbeStatus::Detached;
                result.detached.push(candidate);
            }
        }
    }

    fn load_authority(
        &self,
        family: LanguageFamily,
        t1: &CandidateContext,
        warnings: &mut Vec<String>,
    ) -> WorkspaceAuthority {
        let mut auth = WorkspaceAuthority {
            root: t1.root_path.clone(),
            entries: Vec::new(),
            parse_failed: false,
            permissive: false,
        };

        for marker in &t1.markers {
            let Some(text) = self
                .tree
                .read_file(marker)
                .and_then(|b| String::from_utf8(b).ok())
            else {
                continue;
            };
            let name = paths::file_name(marker);
            match (family, name) {
                (LanguageFamily::JavaScript, "pnpm-workspace.yaml") => {
                    match serde_yaml::from_str::<serde_yaml::Value>(&text) {
                        Ok(yaml) => {
                            if let Some(packages) =
                                yaml.get("packages").and_then(|p| p.as_sequence())
                            {
                                auth.entries.extend(
                                    packages
                                        .iter()
                                        .filter_map(|v| v.as_str().map(String::from)),
                                );
                            }
                        }
                        Err(e) => {
                            auth.parse_failed = true;
                            warnings.push(format!("unparseable workspace config '{marker}': {e}"));
                        }
                    }
                }
                (LanguageFamily::JavaScript, "package.json" | "lerna.json") => {
                    match serde_json::from_str::<serde_json::Value>(&text) {
                        Ok(json) => {
                            let globs = json
                                .get("workspaces")
                                .or_else(|| json.get("packages"))
                                .cloned();
                            match globs {
                                Some(serde_json::Value::Array(items)) => auth.entries.extend(
                                    items.iter().filter_map(|v| v.as_str().map(String::from)),
                                ),
                                Some(serde_json::Value::Object(map)) => {
                                    if let Some(serde_json::Value::Array(items)) =
                                        map.get("packages")
                                    {
                                        auth.entries.extend(
                                            items
                                                .iter()
                                                .filter_map(|v| v.as_str().map(String::from)),
                                        );
                                    }
                                }
                                _ => {}
                            }
                        }
                        Err(e) => {
                            auth.parse_failed = true;
                            warnings.push(format!("unparseable workspace config '{marker}': {e}"));
                        }
                    }
                }
                (LanguageFamily::Go, "go.work") => {
                    auth.entries.extend(parse_go_work(&text));
                }
                (LanguageFamily::Rust, "Cargo.toml") => {
                    match text.parse::<toml::Table>() {
                        Ok(table) => {
                            if let Some(members) = table
                                .get("workspace")
                                .and_then(|w| w.get("members"))
                                .and_then(|m| m.as_array())
                            {
                                auth.entries.extend(
                                    members
                                        .iter()
                                        .filter_map(|v| v.as_str().map(String::from)),
                                );
                            }
                        }
                        Err(e) => {
                            auth.parse_failed = true;
                            warnings.push(format!("unparseable workspace config '{marker}': {e}"));
                        }
                    }
                }
                (LanguageFamily::Jvm, "settings.gradle" | "settings.gradle.kts") => {
                    let (includes, strict) = parse_gradle_includes(&text);
                    auth.entries.extend(includes);
                    if !strict {
                        auth.permissive = true;
                    }
                }
                (LanguageFamily::Jvm, "pom.xml") => {
                    auth.entries.extend(parse_maven_modules(&text));
                }
                (LanguageFamily::Dotnet, _) if name.ends_with(".sln") => {
                    auth.entries.extend(parse_sln_projects(&text));
                }
                _ => {}
            }
        }
        auth
    }
}

/// Match a candidate's workspace-relative path against member entries
/// with the normalizations shared by every strict family:
/// trailing `/**` stripped, leading `./` stripped, exact equality before
/// glob matching, glob tried both bare and with a `/*` suffix. Gradle
/// `:a:b` entries and `.sln` backslash paths are normalized to `a/b`
/// before comparison; `.sln` entries additionally reduce to the project
/// file's directory.
fn matches_workspace_entry(rel_path: &str, entries: &[String]) -> bool {
    for entry in entries {
        let mut entry = entry.replace('\\', "/");
        if let Some(stripped) = entry.strip_prefix(':') {
            entry = stripped.replace(':', "/");
        } else if entry.contains(':') && !entry.contains('/') {
            entry = entry.replace(':', "/");
        }
        if entry.ends_with(".csproj") || entry.ends_with(".fsproj") || entry.ends_with(".vbproj") {
            entry = paths::parent_dir(&entry).to_string();
        }
        if let Some(stripped) = entry.strip_suffix("/**") {
            entry = stripped.to_string();
        }
        if let Some(stripped) = entry.strip_prefix("./") {
            entry = stripped.to_string();
        }

        if rel_path == entry {
            return true;
        }
        if fnmatch(rel_path, &entry) || fnmatch(rel_path, &format!("{entry}/*")) {
            return true;
        }
    }
    false
}

/// fnmatch-style single-pattern match: `*` crosses path separators.
fn fnmatch(path: &str, pattern: &str) -> bool {
    GlobBuilder::new(pattern)
        .literal_separator(false)
        .build()
        .map(|g| g.compile_matcher().is_match(path))
        .unwrap_or(false)
}

/// Parse `use` directives from go.work, both the block form and single
/// lines.
fn parse_go_work(text: &str) -> Vec<String> {
    let mut modules = Vec::new();
    let mut in_use_block = false;
    for line in text.lines() {
        let line = line.trim();
        if line.starts_with("use (") {
            in_use_block = true;
            continue;
        }
        if in_use_block {
            if line == ")" {
                in_use_block = false;
                continue;
            }
            if !line.is_empty() && !line.starts_with("//") {
                modules.push(normalize_go_work_entry(line));
            }
        } else if let Some(single) = line.strip_prefix("use ") {
            modules.push(normalize_go_work_entry(single.trim()));
        }
    }
    modules
}

fn normalize_go_work_entry(entry: &str) -> String {
    entry.strip_prefix("./").unwrap_or(entry).to_string()
}

static GRADLE_INCLUDE_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"include\s*\(\s*['"]([^'"]+)['"]"#).unwrap());
static GRADLE_INCLUDE_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"include\s+['"]([^'"]+)['"]"#).unwrap());

/// Parse `include(...)` entries from settings.gradle. Returns the
/// entries plus whether the config is strict; `$` variables anywhere
/// flip it to permissive.
fn parse_gradle_includes(text: &str) -> (Vec<String>, bool) {
    let strict = !text.contains('$');
    let mut includes = Vec::new();
    for caps in GRADLE_INCLUDE_CALL.captures_iter(text) {
        includes.push(caps[1].to_string());
    }
    for caps in GRADLE_INCLUDE_BARE.captures_iter(text) {
        let entry = caps[1].to_string();
        if !includes.contains(&entry) {
            includes.push(entry);
        }
    }
    (includes, strict)
}

static MAVEN_MODULES_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<modules>\s*(.*?)\s*</modules>").unwrap());
static MAVEN_MODULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<module>\s*([^<]+?)\s*</module>").unwrap());

fn parse_maven_modules(text: &str) -> Vec<String> {
    let mut modules = Vec::new();
    if let Some(block) = MAVEN_MODULES_BLOCK.captures(text) {
        for caps in MAVEN_MODULE.captures_iter(&block[1]) {
            modules.push(caps[1].to_string());
        }
    }
    modules
}

static SLN_PROJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"Project\("[^"]+"\)\s*=\s*"[^"]+",\s*"([^"]+)""#).unwrap());

/// Project file paths from a .sln, excluding solution folders.
fn parse_sln_projects(text: &str) -> Vec<String> {
    SLN_PROJECT
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .filter(|p| p.ends_with(".csproj") || p.ends_with(".fsproj") || p.ends_with(".vbproj"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::ContextDiscovery;
    use crate::workspace::MemoryWorkingTree;

    fn run_filter(files: &[(&str, &str)]) -> AuthorityResult {
        let mut tree = MemoryWorkingTree::new();
        for (path, content) in files {
            tree.insert(path, *content);
        }
        let discovery = ContextDiscovery::new(&tree).discover_all();
        Tier1AuthorityFilter::new(&tree).apply(discovery.candidates)
    }

    fn detached_roots(result: &AuthorityResult) -> Vec<&str> {
        result
            .detached
            .iter()
            .map(|c| c.root_path.as_str())
            .collect()
    }

    #[test]
    fn test_pnpm_workspace_detaches_unlisted() {
        let result = run_filter(&[
            ("pnpm-workspace.yaml", "packages:\n  - 'packages/*'\n"),
            ("packages/included/package.json", r#"{"name": "included"}"#),
            ("other/package.json", r#"{"name": "other"}"#),
        ]);

        assert_eq!(detached_roots(&result), vec!["other"]);
        assert!(
            result
                .detached
                .iter()
                .all(|c| c.probe_status == ProbeStatus::Detached)
        );
        assert!(
            result
                .pending
                .iter()
                .any(|c| c.root_path == "packages/included")
        );
    }

    #[test]
    fn test_no_tier1_passes_everything() {
        let result = run_filter(&[
            ("a/package.json", r#"{"name": "a"}"#),
            ("b/package.json", r#"{"name": "b"}"#),
        ]);
        assert!(result.detached.is_empty());
    }

    #[test]
    fn test_go_work_block_and_single() {
        let entries = parse_go_work("go 1.22\n\nuse (\n\t./svc/api\n\t./svc/worker\n)\nuse ./tools\n");
        assert_eq!(entries, vec!["svc/api", "svc/worker", "tools"]);
    }

    #[test]
    fn test_go_work_detaches_unlisted_module() {
        let result = run_filter(&[
            ("go.work", "go 1.22\nuse (\n\t./svc/api\n)\n"),
            ("svc/api/go.mod", "module example.com/api\n"),
            ("svc/other/go.mod", "module example.com/other\n"),
        ]);
        assert_eq!(detached_roots(&result), vec!["svc/other"]);
    }

    #[test]
    fn test_cargo_members_glob() {
        let result = run_filter(&[
            (
                "Cargo.toml",
                "[workspace]\nmembers = [\"crates/*\"]\n",
            ),
            ("crates/core/Cargo.toml", "[package]\nname = \"core\"\n"),
            ("detached/Cargo.toml", "[package]\nname = \"detached\"\n"),
        ]);
        assert_eq!(detached_roots(&result), vec!["detached"]);
        assert!(result.pending.iter().any(|c| c.root_path == "crates/core"));
    }

    #[test]
    fn test_gradle_variables_are_permissive() {
        let result = run_filter(&[
            (
                "settings.gradle",
                "include(':core')\ninclude(\":${dynamicModule}\")\n",
            ),
            ("core/build.gradle", ""),
            ("extras/build.gradle", ""),
        ]);
        // `$` in the settings file means includes cannot be trusted.
        assert!(result.detached.is_empty());
    }

    #[test]
    fn test_gradle_colon_paths_match() {
        let result = run_filter(&[
            ("settings.gradle", "include(':libs:core')\n"),
            ("libs/core/build.gradle", ""),
            ("libs/extra/build.gradle", ""),
        ]);
        assert_eq!(detached_roots(&result), vec!["libs/extra"]);
    }

    #[test]
    fn test_maven_modules_detach() {
        let result = run_filter(&[
            (
                "pom.xml",
                "<project><modules><module>core</module></modules></project>",
            ),
            ("core/pom.xml", "<project/>"),
            ("stray/pom.xml", "<project/>"),
        ]);
        assert_eq!(detached_roots(&result), vec!["stray"]);
    }

    #[test]
    fn test_sln_backslash_paths() {
        let sln = concat!(
            "Microsoft Visual Studio Solution File, Format Version 12.00\n",
            "Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"App\", ",
            "\"src\\App\\App.csproj\", \"{8A1F9C62-0000-0000-0000-000000000001}\"\n",
            "EndProject\n",
        );
        let result = run_filter(&[
            ("App.sln", sln),
            ("src/App/App.csproj", "<Project/>"),
            ("src/Stray/Stray.csproj", "<Project/>"),
        ]);
        assert_eq!(detached_roots(&result), vec!["src/Stray"]);
    }

    #[test]
    fn test_malformed_config_detaches_nested() {
        let result = run_filter(&[
            ("pnpm-workspace.yaml", "packages: [unclosed\n"),
            ("packages/a/package.json", r#"{"name": "a"}"#),
        ]);
        assert_eq!(detached_roots(&result), vec!["packages/a"]);
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn test_python_has_no_authority() {
        let result = run_filter(&[
            ("uv.lock", ""),
            ("pkg/pyproject.toml", ""),
        ]);
        assert!(result.detached.is_empty());
    }

    #[test]
    fn test_workspace_entry_normalizations() {
        let entries = vec!["./packages/*/**".to_string()];
        assert!(matches_workspace_entry("packages/app", &entries));
        assert!(!matches_workspace_entry("other/app", &entries));
    }
}
