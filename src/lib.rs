//! Local code-intelligence index for a source repository.
//!
//! Ingests a working tree, discovers the logical projects inside it,
//! parses source files with tree-sitter, and maintains a queryable
//! graph of definitions, references, imports, scopes, and bindings,
//! paired with a full-text lexical index. Index state lives under
//! `.codeplane/` in the repository; updates publish as atomic epochs
//! across the relational store and the lexical index.
//!
//! Entry point: [`IndexCoordinator`]. Graph queries: [`store::GraphQueries`].

pub mod config;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod ignore_rules;
pub mod indexing;
pub mod lexical;
pub mod logging;
pub mod parsing;
pub mod paths;
pub mod registry;
pub mod resolve;
pub mod store;
pub mod types;
pub mod workspace;

pub use config::Settings;
pub use error::{IndexError, IndexResult, StorageError};
pub use indexing::{IndexCoordinator, IndexStats, InitResult, SearchMode};
pub use lexical::{LexicalIndex, SearchResult, SearchResults};
pub use registry::LanguageFamily;
pub use store::{FactStore, GraphQueries};
pub use types::*;
