//! Layered configuration for the index.
//!
//! Sources, lowest to highest precedence:
//! - Built-in defaults
//! - `.codeplane/settings.toml` at the repository root
//! - Environment variables prefixed with `CPL_`, double underscore for
//!   nesting: `CPL_INDEXING__PARALLEL_THREADS=8` sets
//!   `indexing.parallel_threads`.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory under the repository root holding all index state.
pub const STATE_DIR: &str = ".codeplane";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Indexing configuration
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Number of worker threads for parsing and extraction
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    /// Per-file parse timeout in seconds
    #[serde(default = "default_parse_timeout")]
    pub parse_timeout_secs: u64,

    /// Largest file, in bytes, that is parsed and lexically indexed
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// Default result limit when the caller passes none
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,

    /// Lines of context around each matching line in snippets
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
}

fn default_version() -> u32 {
    1
}
fn default_parallel_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
fn default_parse_timeout() -> u64 {
    30
}
fn default_max_file_size() -> u64 {
    2 * 1024 * 1024
}
fn default_search_limit() -> usize {
    20
}
fn default_context_lines() -> usize {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            indexing: IndexingConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
            parse_timeout_secs: default_parse_timeout(),
            max_file_size_bytes: default_max_file_size(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            context_lines: default_context_lines(),
        }
    }
}

impl Settings {
    /// Load configuration for a repository, layering the TOML file under
    /// `.codeplane/` and `CPL_` environment variables over defaults.
    pub fn load(repo_root: &Path) -> Result<Self, figment::Error> {
        let config_path = repo_root.join(STATE_DIR).join("settings.toml");
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("CPL_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
            .extract()
    }

    /// Load configuration from a specific TOML file (tests, tooling).
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .extract()
    }

    /// Path of the relational store for a repository.
    pub fn db_path(repo_root: &Path) -> PathBuf {
        repo_root.join(STATE_DIR).join("index.db")
    }

    /// Directory of the lexical index for a repository.
    pub fn lexical_path(repo_root: &Path) -> PathBuf {
        repo_root.join(STATE_DIR).join("lexical")
    }
}
