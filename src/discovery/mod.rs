//! Context discovery: finding project roots inside the working tree.
//!
//! Scans for marker files (package.json, go.mod, Cargo.toml, ...) and
//! produces candidate contexts. Workspace markers (tier 1) fence off
//! authority boundaries; package markers (tier 2) mark individual
//! packages. Families without markers get one ambient candidate at the
//! repository root, and a single tier-3 fallback catches everything
//! else.

pub mod authority;

pub use authority::{AuthorityResult, Tier1AuthorityFilter};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ignore_rules::UNIVERSAL_EXCLUDE_SEGMENTS;
use crate::paths;
use crate::registry::{self, FAMILY_DEFS, LanguageFamily};
use crate::types::{ContextTier, ProbeStatus};
use crate::workspace::WorkingTree;

/// Tier of a discovered marker file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerTier {
    Workspace,
    Package,
}

/// A marker file discovered during scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredMarker {
    /// Relative POSIX path
    pub path: String,
    pub family: LanguageFamily,
    pub tier: MarkerTier,
}

/// A candidate project context produced by discovery.
#[derive(Debug, Clone)]
pub struct CandidateContext {
    pub language_family: LanguageFamily,
    /// POSIX, empty string for the repository root.
    pub root_path: String,
    /// None means ambient.
    pub tier: Option<ContextTier>,
    /// Marker paths that induced this candidate, in discovery order.
    pub markers: Vec<String>,
    pub include_spec: Vec<String>,
    pub exclude_spec: Vec<String>,
    pub probe_status: ProbeStatus,
    pub is_root_fallback: bool,
}

/// Result of context discovery.
#[derive(Debug, Default)]
pub struct DiscoveryResult {
    pub candidates: Vec<CandidateContext>,
    pub markers: Vec<DiscoveredMarker>,
    pub errors: Vec<String>,
}

/// Universal exclude globs attached to every candidate's exclude spec.
pub fn universal_exclude_globs() -> Vec<String> {
    UNIVERSAL_EXCLUDE_SEGMENTS
        .iter()
        .map(|seg| format!("**/{seg}/**"))
        .collect()
}

/// Discovers project contexts by scanning for marker files.
pub struct ContextDiscovery<'a> {
    tree: &'a dyn WorkingTree,
}

impl<'a> ContextDiscovery<'a> {
    pub fn new(tree: &'a dyn WorkingTree) -> Self {
        Self { tree }
    }

    /// Discover all candidate contexts in the repository.
    pub fn discover_all(&self) -> DiscoveryResult {
        let mut result = DiscoveryResult::default();
        let all_paths = self.tree.list_paths();

        let mut markers = self.scan_markers(&all_paths);
        self.apply_content_upgrades(&mut markers, &mut result.errors);
        debug!(markers = markers.len(), "marker scan complete");

        let mut by_family: Vec<(LanguageFamily, Vec<CandidateContext>)> = Vec::new();
        for marker in &markers {
            let index = match by_family.iter().position(|(f, _)| *f == marker.family) {
                Some(index) => index,
                None => {
                    by_family.push((marker.family, Vec::new()));
                    by_family.len() - 1
                }
            };
            Self::absorb_marker(&mut by_family[index].1, marker);
        }

        // Ambient candidates for families that never carry markers.
        for family in registry::ambient_families() {
            if !by_family.iter().any(|(f, _)| *f == family) {
                by_family.push((family, vec![Self::ambient_candidate(family)]));
            }
        }

        // Tier-3 fallback catching files no other context claims. The
        // family is a placeholder; per-file detection applies downstream.
        result.candidates.push(CandidateContext {
            language_family: LanguageFamily::JsonYaml,
            root_path: String::new(),
            tier: Some(ContextTier::RootFallback),
            markers: Vec::new(),
            include_spec: vec!["**/*".to_string()],
            exclude_spec: universal_exclude_globs(),
            probe_status: ProbeStatus::Valid,
            is_root_fallback: true,
        });

        for (_, family_candidates) in by_family {
            result.candidates.extend(family_candidates);
        }
        result.markers = markers;
        result
    }

    /// Discover contexts for a single language family.
    pub fn discover_family(&self, family: LanguageFamily) -> DiscoveryResult {
        let mut result = DiscoveryResult::default();
        let all_paths = self.tree.list_paths();

        let mut markers: Vec<DiscoveredMarker> = self
            .scan_markers(&all_paths)
            .into_iter()
            .filter(|m| m.family == family)
            .collect();
        self.apply_content_upgrades(&mut markers, &mut result.errors);

        let mut candidates: Vec<CandidateContext> = Vec::new();
        for marker in &markers {
            Self::absorb_marker(&mut candidates, marker);
        }

        if candidates.is_empty() && registry::family_def(family).ambient {
            candidates.push(Self::ambient_candidate(family));
        }

        result.candidates = candidates;
        result.markers = markers;
        result
    }

    /// Fold a marker into the family's candidate list, consolidating
    /// markers that share a directory and keeping the strongest tier.
    fn absorb_marker(candidates: &mut Vec<CandidateContext>, marker: &DiscoveredMarker) {
        let marker_dir = paths::parent_dir(&marker.path).to_string();
        if let Some(existing) = candidates.iter_mut().find(|c| c.root_path == marker_dir) {
            existing.markers.push(marker.path.clone());
            if marker.tier == MarkerTier::Workspace && existing.tier != Some(ContextTier::Workspace)
            {
                existing.tier = Some(ContextTier::Workspace);
            }
            return;
        }
        let def = registry::family_def(marker.family);
        candidates.push(CandidateContext {
            language_family: marker.family,
            root_path: marker_dir,
            tier: Some(match marker.tier {
                MarkerTier::Workspace => ContextTier::Workspace,
                MarkerTier::Package => ContextTier::Package,
            }),
            markers: vec![marker.path.clone()],
            include_spec: def.include_globs.iter().map(|s| s.to_string()).collect(),
            exclude_spec: universal_exclude_globs(),
            probe_status: ProbeStatus::Pending,
            is_root_fallback: false,
        });
    }

    fn ambient_candidate(family: LanguageFamily) -> CandidateContext {
        let def = registry::family_def(family);
        CandidateContext {
            language_family: family,
            root_path: String::new(),
            tier: None,
            markers: Vec::new(),
            include_spec: def.include_globs.iter().map(|s| s.to_string()).collect(),
            exclude_spec: universal_exclude_globs(),
            probe_status: ProbeStatus::Pending,
            is_root_fallback: false,
        }
    }

    fn scan_markers(&self, all_paths: &[String]) -> Vec<DiscoveredMarker> {
        let mut markers = Vec::new();

        for path in all_paths {
            let name = paths::file_name(path);

            for def in FAMILY_DEFS {
                if def.workspace_markers.contains(&name) {
                    markers.push(DiscoveredMarker {
                        path: path.clone(),
                        family: def.family,
                        tier: MarkerTier::Workspace,
                    });
                } else if def.package_markers.contains(&name) {
                    markers.push(DiscoveredMarker {
                        path: path.clone(),
                        family: def.family,
                        tier: MarkerTier::Package,
                    });
                }
            }

            // .NET solution and project files are glob-shaped, not fixed names.
            if name.ends_with(".sln") {
                markers.push(DiscoveredMarker {
                    path: path.clone(),
                    family: LanguageFamily::Dotnet,
                    tier: MarkerTier::Workspace,
                });
            } else if name.ends_with(".csproj")
                || name.ends_with(".fsproj")
                || name.ends_with(".vbproj")
            {
                markers.push(DiscoveredMarker {
                    path: path.clone(),
                    family: LanguageFamily::Dotnet,
                    tier: MarkerTier::Package,
                });
            }
        }

        markers
    }

    /// Content-based tier upgrades. Read failures are non-fatal: the
    /// marker keeps its scanned tier and the error is recorded.
    fn apply_content_upgrades(&self, markers: &mut [DiscoveredMarker], errors: &mut Vec<String>) {
        for marker in markers.iter_mut() {
            if marker.tier == MarkerTier::Workspace {
                continue;
            }
            let name = paths::file_name(&marker.path);
            let upgraded = match (marker.family, name) {
                (LanguageFamily::Rust, "Cargo.toml") => {
                    self.read_text(&marker.path, errors)
                        .is_some_and(|text| text.contains("[workspace]"))
                }
                (LanguageFamily::JavaScript, "package.json") => self
                    .read_text(&marker.path, errors)
                    .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok())
                    .is_some_and(|json| json.get("workspaces").is_some()),
                (LanguageFamily::Jvm, "pom.xml") => {
                    self.read_text(&marker.path, errors)
                        .is_some_and(|text| text.contains("<modules>"))
                }
                _ => false,
            };
            if upgraded {
                marker.tier = MarkerTier::Workspace;
            }
        }
    }

    fn read_text(&self, path: &str, errors: &mut Vec<String>) -> Option<String> {
        match self.tree.read_file(path) {
            Some(bytes) => match String::from_utf8(bytes) {
                Ok(text) => Some(text),
                Err(_) => {
                    errors.push(format!("marker '{path}' is not valid UTF-8"));
                    None
                }
            },
            None => {
                errors.push(format!("marker '{path}' could not be read"));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::MemoryWorkingTree;

    fn tree_with(files: &[(&str, &str)]) -> MemoryWorkingTree {
        let mut tree = MemoryWorkingTree::new();
        for (path, content) in files {
            tree.insert(path, *content);
        }
        tree
    }

    fn find<'a>(
        result: &'a DiscoveryResult,
        family: LanguageFamily,
        root: &str,
    ) -> Option<&'a CandidateContext> {
        result
            .candidates
            .iter()
            .find(|c| c.language_family == family && c.root_path == root && !c.is_root_fallback)
    }

    #[test]
    fn test_python_package_discovery() {
        let tree = tree_with(&[
            ("pyproject.toml", "[project]\nname = \"app\"\n"),
            ("src/app/__init__.py", ""),
        ]);
        let result = ContextDiscovery::new(&tree).discover_all();

        let candidate = find(&result, LanguageFamily::Python, "").unwrap();
        assert_eq!(candidate.tier, Some(ContextTier::Package));
        assert_eq!(candidate.markers, vec!["pyproject.toml"]);
        assert_eq!(candidate.probe_status, ProbeStatus::Pending);
    }

    #[test]
    fn test_marker_paths_are_posix() {
        let tree = tree_with(&[("packages/web/package.json", "{}")]);
        let result = ContextDiscovery::new(&tree).discover_all();
        for marker in &result.markers {
            assert!(!marker.path.contains('\\'));
        }
        for candidate in &result.candidates {
            assert!(!candidate.root_path.contains('\\'));
        }
    }

    #[test]
    fn test_cargo_workspace_upgrade() {
        let tree = tree_with(&[
            ("Cargo.toml", "[workspace]\nmembers = [\"crates/a\"]\n"),
            ("crates/a/Cargo.toml", "[package]\nname = \"a\"\n"),
        ]);
        let result = ContextDiscovery::new(&tree).discover_all();

        let root = find(&result, LanguageFamily::Rust, "").unwrap();
        assert_eq!(root.tier, Some(ContextTier::Workspace));
        let member = find(&result, LanguageFamily::Rust, "crates/a").unwrap();
        assert_eq!(member.tier, Some(ContextTier::Package));
    }

    #[test]
    fn test_package_json_workspaces_upgrade() {
        let tree = tree_with(&[
            ("package.json", r#"{"workspaces": ["packages/*"]}"#),
            ("packages/ui/package.json", r#"{"name": "ui"}"#),
        ]);
        let result = ContextDiscovery::new(&tree).discover_all();

        let root = find(&result, LanguageFamily::JavaScript, "").unwrap();
        assert_eq!(root.tier, Some(ContextTier::Workspace));
        let pkg = find(&result, LanguageFamily::JavaScript, "packages/ui").unwrap();
        assert_eq!(pkg.tier, Some(ContextTier::Package));
    }

    #[test]
    fn test_maven_modules_upgrade() {
        let tree = tree_with(&[(
            "pom.xml",
            "<project><modules><module>core</module></modules></project>",
        )]);
        let result = ContextDiscovery::new(&tree).discover_all();
        let root = find(&result, LanguageFamily::Jvm, "").unwrap();
        assert_eq!(root.tier, Some(ContextTier::Workspace));
    }

    #[test]
    fn test_sln_and_csproj_globs() {
        let tree = tree_with(&[
            ("App.sln", ""),
            ("src/App/App.csproj", "<Project/>"),
        ]);
        let result = ContextDiscovery::new(&tree).discover_all();

        let sln = find(&result, LanguageFamily::Dotnet, "").unwrap();
        assert_eq!(sln.tier, Some(ContextTier::Workspace));
        let proj = find(&result, LanguageFamily::Dotnet, "src/App").unwrap();
        assert_eq!(proj.tier, Some(ContextTier::Package));
    }

    #[test]
    fn test_markers_in_same_dir_consolidate() {
        let tree = tree_with(&[
            ("pyproject.toml", "[project]\n"),
            ("setup.py", "from setuptools import setup\n"),
        ]);
        let result = ContextDiscovery::new(&tree).discover_all();
        let python: Vec<_> = result
            .candidates
            .iter()
            .filter(|c| c.language_family == LanguageFamily::Python)
            .collect();
        assert_eq!(python.len(), 1);
        assert_eq!(python[0].markers.len(), 2);
    }

    #[test]
    fn test_ambient_and_root_fallback() {
        let tree = tree_with(&[("notes/README.md", "# hi")]);
        let result = ContextDiscovery::new(&tree).discover_all();

        let md = find(&result, LanguageFamily::Markdown, "").unwrap();
        assert_eq!(md.tier, None);
        assert!(md.markers.is_empty());

        let fallback = result
            .candidates
            .iter()
            .find(|c| c.is_root_fallback)
            .unwrap();
        assert_eq!(fallback.tier, Some(ContextTier::RootFallback));
        assert_eq!(fallback.include_spec, vec!["**/*"]);
        assert_eq!(fallback.probe_status, ProbeStatus::Valid);
    }

    #[test]
    fn test_discover_family_filters() {
        let tree = tree_with(&[
            ("pyproject.toml", ""),
            ("go.mod", "module example.com/app\n"),
        ]);
        let result = ContextDiscovery::new(&tree).discover_family(LanguageFamily::Go);
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].language_family, LanguageFamily::Go);
    }
}
