//! Static language registry.
//!
//! Pure data: which marker files identify a project of each family, which
//! globs its sources match, which families are ambient (indexed from the
//! repository root without markers), and which tree-sitter grammar, if
//! any, parses a given file. Everything else in the crate consults this
//! table instead of hardcoding extensions.

use serde::{Deserialize, Serialize};

use crate::paths;

/// Language family of a project context. Coarser than a grammar: the JVM
/// family spans Java/Kotlin/Scala, .NET spans C#/F#/VB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageFamily {
    Python,
    JavaScript,
    Go,
    Rust,
    Jvm,
    Dotnet,
    Cpp,
    Ruby,
    Php,
    Lua,
    Swift,
    Elixir,
    Haskell,
    Terraform,
    Sql,
    Docker,
    Markdown,
    JsonYaml,
    Graphql,
}

impl LanguageFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Jvm => "jvm",
            Self::Dotnet => "dotnet",
            Self::Cpp => "cpp",
            Self::Ruby => "ruby",
            Self::Php => "php",
            Self::Lua => "lua",
            Self::Swift => "swift",
            Self::Elixir => "elixir",
            Self::Haskell => "haskell",
            Self::Terraform => "terraform",
            Self::Sql => "sql",
            Self::Docker => "docker",
            Self::Markdown => "markdown",
            Self::JsonYaml => "json_yaml",
            Self::Graphql => "graphql",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        ALL_FAMILIES
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
    }
}

pub const ALL_FAMILIES: &[LanguageFamily] = &[
    LanguageFamily::Python,
    LanguageFamily::JavaScript,
    LanguageFamily::Go,
    LanguageFamily::Rust,
    LanguageFamily::Jvm,
    LanguageFamily::Dotnet,
    LanguageFamily::Cpp,
    LanguageFamily::Ruby,
    LanguageFamily::Php,
    LanguageFamily::Lua,
    LanguageFamily::Swift,
    LanguageFamily::Elixir,
    LanguageFamily::Haskell,
    LanguageFamily::Terraform,
    LanguageFamily::Sql,
    LanguageFamily::Docker,
    LanguageFamily::Markdown,
    LanguageFamily::JsonYaml,
    LanguageFamily::Graphql,
];

/// Registry row for one language family.
#[derive(Debug, Clone, Copy)]
pub struct FamilyDef {
    pub family: LanguageFamily,
    /// Tier-1 markers: monorepo/workspace fences that define authority.
    pub workspace_markers: &'static [&'static str],
    /// Tier-2 markers: individual package roots.
    pub package_markers: &'static [&'static str],
    /// Source globs claimed by contexts of this family.
    pub include_globs: &'static [&'static str],
    /// Globs matching test files, for consumers that want to exclude them.
    pub test_globs: &'static [&'static str],
    /// Ambient families get one marker-less context at the repo root.
    pub ambient: bool,
    /// Separator used in declared-module identifiers (`.`, `::`, `/`).
    pub module_separator: &'static str,
}

pub const FAMILY_DEFS: &[FamilyDef] = &[
    FamilyDef {
        family: LanguageFamily::JavaScript,
        workspace_markers: &[
            "pnpm-workspace.yaml",
            "lerna.json",
            "nx.json",
            "turbo.json",
            "rush.json",
        ],
        package_markers: &[
            "package.json",
            "deno.json",
            "deno.jsonc",
            "tsconfig.json",
            "jsconfig.json",
        ],
        include_globs: &[
            "**/*.js", "**/*.jsx", "**/*.mjs", "**/*.cjs", "**/*.ts", "**/*.tsx", "**/*.mts",
            "**/*.cts",
        ],
        test_globs: &["**/*.test.*", "**/*.spec.*", "**/__tests__/**"],
        ambient: false,
        module_separator: "/",
    },
    FamilyDef {
        family: LanguageFamily::Python,
        workspace_markers: &["uv.lock", "poetry.lock", "Pipfile.lock"],
        package_markers: &[
            "pyproject.toml",
            "setup.py",
            "setup.cfg",
            "requirements.txt",
            "Pipfile",
        ],
        include_globs: &["**/*.py", "**/*.pyi", "**/*.pyw"],
        test_globs: &["**/test_*.py", "**/*_test.py", "**/tests/**"],
        ambient: false,
        module_separator: ".",
    },
    FamilyDef {
        family: LanguageFamily::Go,
        workspace_markers: &["go.work"],
        package_markers: &["go.mod"],
        include_globs: &["**/*.go"],
        test_globs: &["**/*_test.go"],
        ambient: false,
        module_separator: "/",
    },
    FamilyDef {
        family: LanguageFamily::Rust,
        // Cargo.toml with [workspace] is upgraded by content inspection.
        workspace_markers: &[],
        package_markers: &["Cargo.toml"],
        include_globs: &["**/*.rs"],
        test_globs: &["**/tests/**"],
        ambient: false,
        module_separator: "::",
    },
    FamilyDef {
        family: LanguageFamily::Jvm,
        workspace_markers: &["settings.gradle", "settings.gradle.kts"],
        package_markers: &["build.gradle", "build.gradle.kts", "pom.xml", "build.sbt"],
        include_globs: &["**/*.java", "**/*.kt", "**/*.kts", "**/*.scala", "**/*.sc"],
        test_globs: &["**/src/test/**"],
        ambient: false,
        module_separator: ".",
    },
    FamilyDef {
        family: LanguageFamily::Dotnet,
        // .sln / .csproj markers are glob-matched during the scan.
        workspace_markers: &[],
        package_markers: &[],
        include_globs: &["**/*.cs", "**/*.fs", "**/*.fsx", "**/*.vb"],
        test_globs: &["**/*Tests.cs", "**/*Test.cs"],
        ambient: false,
        module_separator: ".",
    },
    FamilyDef {
        family: LanguageFamily::Cpp,
        workspace_markers: &[],
        package_markers: &[
            "CMakeLists.txt",
            "Makefile",
            "meson.build",
            "BUILD",
            "BUILD.bazel",
            "compile_commands.json",
        ],
        include_globs: &[
            "**/*.c", "**/*.cc", "**/*.cpp", "**/*.cxx", "**/*.h", "**/*.hpp", "**/*.hxx",
        ],
        test_globs: &["**/*_test.c*", "**/test/**"],
        ambient: false,
        module_separator: "/",
    },
    FamilyDef {
        family: LanguageFamily::Ruby,
        workspace_markers: &["Gemfile.lock"],
        package_markers: &["Gemfile"],
        include_globs: &["**/*.rb", "**/*.rake"],
        test_globs: &["**/spec/**", "**/*_spec.rb"],
        ambient: false,
        module_separator: "/",
    },
    FamilyDef {
        family: LanguageFamily::Php,
        workspace_markers: &["composer.lock"],
        package_markers: &["composer.json"],
        include_globs: &["**/*.php"],
        test_globs: &["**/*Test.php"],
        ambient: false,
        module_separator: ".",
    },
    FamilyDef {
        family: LanguageFamily::Lua,
        workspace_markers: &[],
        package_markers: &[".luarc.json", "rockspec"],
        include_globs: &["**/*.lua"],
        test_globs: &["**/spec/**"],
        ambient: false,
        module_separator: ".",
    },
    FamilyDef {
        family: LanguageFamily::Swift,
        workspace_markers: &[],
        package_markers: &["Package.swift"],
        include_globs: &["**/*.swift"],
        test_globs: &["**/Tests/**"],
        ambient: false,
        module_separator: ".",
    },
    FamilyDef {
        family: LanguageFamily::Elixir,
        workspace_markers: &[],
        package_markers: &["mix.exs"],
        include_globs: &["**/*.ex", "**/*.exs"],
        test_globs: &["**/test/**"],
        ambient: false,
        module_separator: ".",
    },
    FamilyDef {
        family: LanguageFamily::Haskell,
        workspace_markers: &["stack.yaml", "cabal.project"],
        package_markers: &["package.yaml"],
        include_globs: &["**/*.hs"],
        test_globs: &["**/test/**"],
        ambient: false,
        module_separator: ".",
    },
    FamilyDef {
        family: LanguageFamily::Terraform,
        workspace_markers: &[".terraform.lock.hcl"],
        package_markers: &["main.tf", "versions.tf"],
        include_globs: &["**/*.tf", "**/*.hcl"],
        test_globs: &[],
        ambient: false,
        module_separator: "/",
    },
    FamilyDef {
        family: LanguageFamily::Sql,
        workspace_markers: &[],
        package_markers: &[],
        include_globs: &["**/*.sql"],
        test_globs: &[],
        ambient: true,
        module_separator: "/",
    },
    FamilyDef {
        family: LanguageFamily::Docker,
        workspace_markers: &[],
        package_markers: &[],
        include_globs: &[
            "**/Dockerfile",
            "**/*.Dockerfile",
            "**/docker-compose.yml",
            "**/docker-compose.yaml",
        ],
        test_globs: &[],
        ambient: true,
        module_separator: "/",
    },
    FamilyDef {
        family: LanguageFamily::Markdown,
        workspace_markers: &[],
        package_markers: &[],
        include_globs: &["**/*.md", "**/*.markdown", "**/*.mdx"],
        test_globs: &[],
        ambient: true,
        module_separator: "/",
    },
    FamilyDef {
        family: LanguageFamily::JsonYaml,
        workspace_markers: &[],
        package_markers: &[],
        include_globs: &["**/*.json", "**/*.jsonc", "**/*.yaml", "**/*.yml", "**/*.toml"],
        test_globs: &[],
        ambient: true,
        module_separator: "/",
    },
    FamilyDef {
        family: LanguageFamily::Graphql,
        workspace_markers: &[],
        package_markers: &[],
        include_globs: &["**/*.graphql", "**/*.gql"],
        test_globs: &[],
        ambient: true,
        module_separator: "/",
    },
];

/// Look up the registry row for a family.
pub fn family_def(family: LanguageFamily) -> &'static FamilyDef {
    FAMILY_DEFS
        .iter()
        .find(|d| d.family == family)
        .expect("every family has a registry row")
}

/// Families that always get one ambient candidate at the repo root.
pub fn ambient_families() -> impl Iterator<Item = LanguageFamily> {
    FAMILY_DEFS.iter().filter(|d| d.ambient).map(|d| d.family)
}

/// Grammar-level language name for a file, filename first then extension.
/// `None` for files no wired grammar can parse (they are still indexed
/// lexically).
pub fn language_for_path(path: &str) -> Option<&'static str> {
    match paths::file_name(path) {
        "Dockerfile" => return Some("dockerfile"),
        "Makefile" => return Some("make"),
        _ => {}
    }
    let ext = paths::extension(path);
    language_for_extension(&ext)
}

/// Grammar-level language name by extension alone.
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "py" | "pyi" | "pyw" => "python",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "tsx",
        "go" => "go",
        "rs" => "rust",
        "java" => "java",
        "cs" => "csharp",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" | "hxx" => "cpp",
        "rb" | "rake" => "ruby",
        "php" => "php",
        "lua" => "lua",
        _ => return None,
    })
}

/// Language family for a file path, by extension and well-known filenames.
pub fn family_for_path(path: &str) -> Option<LanguageFamily> {
    let name = paths::file_name(path);
    if name == "Dockerfile" || name.ends_with(".Dockerfile") || name.starts_with("docker-compose.")
    {
        return Some(LanguageFamily::Docker);
    }
    let ext = paths::extension(path);
    Some(match ext.as_str() {
        "py" | "pyi" | "pyw" => LanguageFamily::Python,
        "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" | "mts" | "cts" => LanguageFamily::JavaScript,
        "go" => LanguageFamily::Go,
        "rs" => LanguageFamily::Rust,
        "java" | "kt" | "kts" | "scala" | "sc" => LanguageFamily::Jvm,
        "cs" | "fs" | "fsx" | "vb" => LanguageFamily::Dotnet,
        "c" | "cc" | "cpp" | "cxx" | "h" | "hpp" | "hxx" => LanguageFamily::Cpp,
        "rb" | "rake" => LanguageFamily::Ruby,
        "php" => LanguageFamily::Php,
        "lua" => LanguageFamily::Lua,
        "swift" => LanguageFamily::Swift,
        "ex" | "exs" => LanguageFamily::Elixir,
        "hs" => LanguageFamily::Haskell,
        "tf" | "hcl" => LanguageFamily::Terraform,
        "sql" => LanguageFamily::Sql,
        "md" | "markdown" | "mdx" => LanguageFamily::Markdown,
        "json" | "jsonc" | "yaml" | "yml" | "toml" => LanguageFamily::JsonYaml,
        "graphql" | "gql" => LanguageFamily::Graphql,
        _ => return None,
    })
}

/// Grammar-level language for declared-module computation.
/// Coarser than `language_for_path`: only Go and Rust need config-augmented
/// modules, the rest declare their module in-source.
pub fn is_config_augmented(language: &str) -> bool {
    matches!(language, "go" | "rust")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_family_has_a_row() {
        for family in ALL_FAMILIES {
            let def = family_def(*family);
            assert_eq!(def.family, *family);
            assert!(!def.include_globs.is_empty(), "{family:?} has no globs");
        }
    }

    #[test]
    fn test_ambient_families() {
        let ambient: Vec<_> = ambient_families().collect();
        assert!(ambient.contains(&LanguageFamily::Markdown));
        assert!(ambient.contains(&LanguageFamily::Sql));
        assert!(ambient.contains(&LanguageFamily::JsonYaml));
        assert!(!ambient.contains(&LanguageFamily::Python));
    }

    #[test]
    fn test_language_detection() {
        assert_eq!(language_for_path("src/a.py"), Some("python"));
        assert_eq!(language_for_path("src/App.tsx"), Some("tsx"));
        assert_eq!(language_for_path("Dockerfile"), Some("dockerfile"));
        assert_eq!(language_for_path("deep/dir/Dockerfile"), Some("dockerfile"));
        assert_eq!(language_for_path("README.md"), None);
        assert_eq!(language_for_path("noext"), None);
    }

    #[test]
    fn test_family_detection() {
        assert_eq!(family_for_path("src/a.py"), Some(LanguageFamily::Python));
        assert_eq!(family_for_path("src/a.kt"), Some(LanguageFamily::Jvm));
        assert_eq!(family_for_path("README.md"), Some(LanguageFamily::Markdown));
        assert_eq!(
            family_for_path("infra/Dockerfile"),
            Some(LanguageFamily::Docker)
        );
        assert_eq!(family_for_path("LICENSE"), None);
    }

    #[test]
    fn test_family_round_trip() {
        for family in ALL_FAMILIES {
            assert_eq!(LanguageFamily::parse(family.as_str()), Some(*family));
        }
    }
}
