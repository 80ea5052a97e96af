//! Thin wrapper over tree-sitter.
//!
//! Loads the grammar for a file, parses the whole content (no
//! incremental reparse between revisions), and reports structural
//! metrics used by probe validation. Grammar objects are cheap to
//! construct from the bundled language functions, so no cache sits in
//! front of them.

use std::path::PathBuf;
use tree_sitter::{Node, Parser, Tree};

use crate::error::{IndexError, IndexResult, ParseError, ParseResult};
use crate::registry;

/// A parsed file plus the structural metrics probe validation needs.
#[derive(Debug)]
pub struct ParsedFile {
    pub tree: Tree,
    /// Grammar-level language name ("python", "tsx", ...).
    pub language: &'static str,
    /// ERROR and missing nodes in the tree.
    pub error_count: usize,
    pub total_nodes: usize,
}

impl ParsedFile {
    pub fn root_node(&self) -> Node<'_> {
        self.tree.root_node()
    }
}

/// Result of validating a file for context probing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeValidation {
    pub is_valid: bool,
    pub error_count: usize,
    pub total_nodes: usize,
    pub has_meaningful_content: bool,
    pub error_ratio: f64,
}

/// Wrapper owning one tree-sitter parser, reconfigured per file.
pub struct SourceParser {
    parser: Parser,
}

impl Default for SourceParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    /// Parse a file. Language is selected by filename first, then by
    /// extension; files no wired grammar covers return
    /// [`IndexError::UnsupportedFileExtension`].
    pub fn parse(&mut self, path: &str, content: &[u8]) -> IndexResult<ParsedFile> {
        let language = registry::language_for_path(path).ok_or_else(|| {
            IndexError::UnsupportedFileExtension {
                path: PathBuf::from(path),
                extension: crate::paths::extension(path),
            }
        })?;

        let grammar = grammar_for(language).ok_or_else(|| IndexError::UnsupportedFileExtension {
            path: PathBuf::from(path),
            extension: crate::paths::extension(path),
        })?;

        let tree = self
            .load_tree(path, language, grammar, content)
            .map_err(|e| IndexError::ParseFailed {
                path: PathBuf::from(path),
                language: language.to_string(),
                reason: e.to_string(),
            })?;

        let (total_nodes, error_count) = count_nodes(tree.root_node());

        Ok(ParsedFile {
            tree,
            language,
            error_count,
            total_nodes,
        })
    }

    /// Configure the grammar and produce a tree. Tree-sitter itself is
    /// byte-oriented, but everything downstream slices the source as
    /// UTF-8, so invalid input is rejected up front.
    fn load_tree(
        &mut self,
        path: &str,
        language: &str,
        grammar: tree_sitter::Language,
        content: &[u8],
    ) -> ParseResult<Tree> {
        if std::str::from_utf8(content).is_err() {
            return Err(ParseError::InvalidUtf8);
        }
        self.parser
            .set_language(&grammar)
            .map_err(|e| ParseError::GrammarLoad {
                language: language.to_string(),
                reason: e.to_string(),
            })?;
        self.parser
            .parse(content, None)
            .ok_or_else(|| ParseError::NoTree {
                path: PathBuf::from(path),
            })
    }

    /// Probe validation for code files: fewer than 10% error nodes and
    /// at least one meaningful named node.
    pub fn validate_code_file(parsed: &ParsedFile) -> ProbeValidation {
        if parsed.total_nodes == 0 {
            return ProbeValidation {
                is_valid: false,
                error_count: 0,
                total_nodes: 0,
                has_meaningful_content: false,
                error_ratio: 0.0,
            };
        }
        let error_ratio = parsed.error_count as f64 / parsed.total_nodes as f64;
        let has_meaningful = has_meaningful_nodes(parsed.root_node());
        ProbeValidation {
            is_valid: error_ratio < 0.10 && has_meaningful,
            error_count: parsed.error_count,
            total_nodes: parsed.total_nodes,
            has_meaningful_content: has_meaningful,
            error_ratio,
        }
    }

    /// Probe validation for data files: zero errors and a non-empty root.
    pub fn validate_data_file(parsed: &ParsedFile) -> ProbeValidation {
        let has_content = parsed.root_node().child_count() > 0;
        ProbeValidation {
            is_valid: has_content && parsed.error_count == 0,
            error_count: parsed.error_count,
            total_nodes: parsed.total_nodes,
            has_meaningful_content: has_content,
            error_ratio: if parsed.total_nodes > 0 {
                parsed.error_count as f64 / parsed.total_nodes as f64
            } else {
                0.0
            },
        }
    }
}

/// Grammar for a grammar-level language name.
pub fn grammar_for(language: &str) -> Option<tree_sitter::Language> {
    Some(match language {
        "python" => tree_sitter_python::LANGUAGE.into(),
        "javascript" => tree_sitter_javascript::LANGUAGE.into(),
        "typescript" => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        "tsx" => tree_sitter_typescript::LANGUAGE_TSX.into(),
        "go" => tree_sitter_go::LANGUAGE.into(),
        "rust" => tree_sitter_rust::LANGUAGE.into(),
        "java" => tree_sitter_java::LANGUAGE.into(),
        "csharp" => tree_sitter_c_sharp::LANGUAGE.into(),
        "c" => tree_sitter_c::LANGUAGE.into(),
        "cpp" => tree_sitter_cpp::LANGUAGE.into(),
        "ruby" => tree_sitter_ruby::LANGUAGE.into(),
        "php" => tree_sitter_php::LANGUAGE_PHP.into(),
        "lua" => tree_sitter_lua::LANGUAGE.into(),
        _ => return None,
    })
}

/// Count total and ERROR/missing nodes with an iterative cursor walk,
/// immune to deeply nested trees.
fn count_nodes(root: Node) -> (usize, usize) {
    let mut total = 0usize;
    let mut errors = 0usize;
    let mut cursor = root.walk();
    'walk: loop {
        let node = cursor.node();
        total += 1;
        if node.is_error() || node.is_missing() {
            errors += 1;
        }
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                continue 'walk;
            }
            if !cursor.goto_parent() {
                break 'walk;
            }
        }
    }
    (total, errors)
}

/// Does the tree contain at least one named node that is not a comment
/// or an error artifact?
fn has_meaningful_nodes(root: Node) -> bool {
    const MEANINGLESS: &[&str] = &["comment", "line_comment", "block_comment", "ERROR"];
    let mut cursor = root.walk();
    'walk: loop {
        let node = cursor.node();
        if node.is_named()
            && !node.is_error()
            && !node.is_missing()
            && !MEANINGLESS.contains(&node.kind())
            && node.kind() != root.kind()
        {
            return true;
        }
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                continue 'walk;
            }
            if !cursor.goto_parent() {
                return false;
            }
        }
    }
}
