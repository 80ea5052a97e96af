//! Tree-sitter parsing layer.
//!
//! [`SourceParser`] wraps grammar loading and whole-file parsing;
//! [`queries`] holds the per-language S-expression configurations the
//! fact extractor runs over parse trees.

pub mod parser;
pub mod queries;

pub use parser::{ParsedFile, ProbeValidation, SourceParser};
pub use queries::{LanguageQueryConfig, SymbolPattern, query_config, scope_kind_for};
