//! Error types for the indexing core.
//!
//! Structured error enums via thiserror, split by layer: `IndexError`
//! for the coordinator surface, `ParseError` for tree-sitter work,
//! `StorageError` for the relational and lexical stores.

use crate::types::FileId;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for indexing operations
#[derive(Error, Debug)]
pub enum IndexError {
    /// File system errors
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No grammar maps to the file's extension or filename
    #[error("Unsupported file extension '{extension}' for file '{path}'")]
    UnsupportedFileExtension { path: PathBuf, extension: String },

    #[error("Failed to parse {language} file '{path}': {reason}")]
    ParseFailed {
        path: PathBuf,
        language: String,
        reason: String,
    },

    #[error("Parsing '{path}' exceeded the {timeout_secs}s per-file timeout")]
    ParseTimeout { path: PathBuf, timeout_secs: u64 },

    #[error("File ID {id:?} not found in index. The file may have been removed or not indexed.")]
    FileNotFound { id: FileId },

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    ConfigError { reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A reindex was cancelled before publishing; the previous epoch is intact
    #[error("Reindex cancelled before epoch publish")]
    Cancelled,

    /// General errors for cases where no finer variant applies
    #[error("{0}")]
    General(String),
}

/// Errors specific to parsing operations
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to load {language} grammar: {reason}")]
    GrammarLoad { language: String, reason: String },

    #[error("No tree produced for '{path}'")]
    NoTree { path: PathBuf },

    #[error("Invalid UTF-8 in source file")]
    InvalidUtf8,
}

/// Errors specific to storage operations (SQL and lexical)
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Tantivy operation failed during {operation}: {cause}")]
    Tantivy { operation: String, cause: String },

    #[error("def_uid collision for '{def_uid}'; the affected epoch was aborted")]
    DefUidCollision { def_uid: String },

    #[error("Epoch {epoch} publish failed: {reason}")]
    EpochPublish { epoch: u32, reason: String },
}

impl StorageError {
    pub(crate) fn tantivy(operation: &str, err: impl std::fmt::Display) -> Self {
        Self::Tantivy {
            operation: operation.to_string(),
            cause: err.to_string(),
        }
    }
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Result type alias for parse operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl IndexError {
    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Storage(StorageError::Tantivy { .. }) => vec![
                "Run a full reindex to rebuild the lexical index",
                "Check disk space and permissions under .codeplane/lexical",
            ],
            Self::Storage(StorageError::EpochPublish { .. }) => vec![
                "The epoch was rolled back; the previously published index is still live",
                "Retry the reindex, it may succeed on the next attempt",
            ],
            Self::Storage(StorageError::DefUidCollision { .. }) => vec![
                "Run a full reindex; persistent collisions indicate duplicate lexical paths",
            ],
            Self::FileRead { .. } => vec![
                "Check that the file exists and you have read permissions",
                "Ensure the file is not locked by another process",
            ],
            Self::UnsupportedFileExtension { .. } => vec![
                "Files without a wired grammar are indexed lexically but produce no facts",
            ],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IndexError::UnsupportedFileExtension {
            path: PathBuf::from("notes.xyz"),
            extension: "xyz".to_string(),
        };
        assert!(err.to_string().contains("xyz"));
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: IndexError = StorageError::EpochPublish {
            epoch: 3,
            reason: "disk full".to_string(),
        }
        .into();
        assert!(matches!(err, IndexError::Storage(_)));
        assert!(!err.recovery_suggestions().is_empty());
    }
}
