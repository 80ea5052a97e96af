//! Full-text index over file contents, paths, and symbol names.
//!
//! Built on tantivy. Two write modes: direct single-file operations,
//! and staged operations buffered in memory and applied as one writer
//! commit so the SQL transaction and the lexical commit publish
//! together. Search returns one result per *matching line*, not per
//! document, with a symmetric snippet window.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, SchemaBuilder, STORED, STRING, TEXT, Value,
};
use tantivy::{Index, IndexReader, IndexSettings, ReloadPolicy, TantivyDocument, Term};
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::types::{ContextId, FileId};

/// Schema fields for the lexical index.
#[derive(Debug, Clone, Copy)]
struct LexicalSchema {
    path: Field,
    /// Raw-tokenized duplicate of `path`, used only for exact-match
    /// deletion.
    path_exact: Field,
    content: Field,
    symbols: Field,
    context_id: Field,
    file_id: Field,
}

impl LexicalSchema {
    fn build() -> (Schema, LexicalSchema) {
        let mut builder = SchemaBuilder::default();
        let path = builder.add_text_field("path", TEXT | STORED);
        let path_exact = builder.add_text_field("path_exact", STRING);
        let content = builder.add_text_field("content", TEXT | STORED);
        let symbols = builder.add_text_field("symbols", TEXT | STORED);
        let context_id = builder.add_u64_field("context_id", tantivy::schema::INDEXED | STORED);
        let file_id = builder.add_u64_field("file_id", STORED);
        let schema = builder.build();
        (
            schema,
            LexicalSchema {
                path,
                path_exact,
                content,
                symbols,
                context_id,
                file_id,
            },
        )
    }
}

/// A single search hit: one matching line.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub path: String,
    /// 1-indexed line number.
    pub line: u32,
    pub column: u32,
    pub snippet: String,
    pub score: f32,
    pub context_id: Option<ContextId>,
}

/// Search results plus diagnostics.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub results: Vec<SearchResult>,
    /// Number of matching documents (files), before line expansion.
    pub total_hits: usize,
    /// Set when query syntax failed and a literal fallback was used.
    pub fallback_reason: Option<String>,
}

struct StagedDoc {
    path: String,
    content: String,
    symbols: Vec<String>,
    context_id: ContextId,
    file_id: FileId,
}

/// Full-text engine with staged atomic commits.
pub struct LexicalIndex {
    index: Index,
    reader: IndexReader,
    fields: LexicalSchema,
    index_path: PathBuf,
    staged_adds: Mutex<Vec<StagedDoc>>,
    staged_removes: Mutex<Vec<String>>,
    staged_clear: Mutex<bool>,
}

const WRITER_BUFFER_BYTES: usize = 50_000_000;

impl LexicalIndex {
    /// Open or create the index directory.
    pub fn open(index_path: impl AsRef<Path>) -> StorageResult<Self> {
        let index_path = index_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&index_path)
            .map_err(|e| StorageError::tantivy("create-dir", e))?;

        let (schema, fields) = LexicalSchema::build();
        let existing = index_path.join("meta.json").exists();
        let index = if existing {
            Index::open_in_dir(&index_path).map_err(|e| StorageError::tantivy("open", e))?
        } else {
            let dir =
                MmapDirectory::open(&index_path).map_err(|e| StorageError::tantivy("open", e))?;
            Index::create(dir, schema, IndexSettings::default())
                .map_err(|e| StorageError::tantivy("create", e))?
        };

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| StorageError::tantivy("reader", e))?;
        if existing {
            reader
                .reload()
                .map_err(|e| StorageError::tantivy("reload", e))?;
        }

        Ok(Self {
            index,
            reader,
            fields,
            index_path,
            staged_adds: Mutex::new(Vec::new()),
            staged_removes: Mutex::new(Vec::new()),
            staged_clear: Mutex::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.index_path
    }

    fn make_doc(&self, staged: &StagedDoc) -> TantivyDocument {
        let mut doc = TantivyDocument::new();
        doc.add_text(self.fields.path, &staged.path);
        doc.add_text(self.fields.path_exact, &staged.path);
        doc.add_text(self.fields.content, &staged.content);
        doc.add_text(self.fields.symbols, staged.symbols.join(" "));
        doc.add_u64(self.fields.context_id, u64::from(staged.context_id.value()));
        doc.add_u64(self.fields.file_id, u64::from(staged.file_id.value()));
        doc
    }

    // ----- direct operations -----

    /// Add or replace one file immediately.
    pub fn add_file(
        &self,
        path: &str,
        content: &str,
        context_id: ContextId,
        file_id: FileId,
        symbols: &[String],
    ) -> StorageResult<()> {
        let mut writer = self
            .index
            .writer::<TantivyDocument>(WRITER_BUFFER_BYTES)
            .map_err(|e| StorageError::tantivy("writer", e))?;
        writer.delete_term(Term::from_field_text(self.fields.path_exact, path));
        let staged = StagedDoc {
            path: path.to_string(),
            content: content.to_string(),
            symbols: symbols.to_vec(),
            context_id,
            file_id,
        };
        writer
            .add_document(self.make_doc(&staged))
            .map_err(|e| StorageError::tantivy("add", e))?;
        writer
            .commit()
            .map_err(|e| StorageError::tantivy("commit", e))?;
        self.reader
            .reload()
            .map_err(|e| StorageError::tantivy("reload", e))?;
        Ok(())
    }

    /// Remove one file immediately.
    pub fn remove_file(&self, path: &str) -> StorageResult<()> {
        let mut writer = self
            .index
            .writer::<TantivyDocument>(WRITER_BUFFER_BYTES)
            .map_err(|e| StorageError::tantivy("writer", e))?;
        writer.delete_term(Term::from_field_text(self.fields.path_exact, path));
        writer
            .commit()
            .map_err(|e| StorageError::tantivy("commit", e))?;
        self.reader
            .reload()
            .map_err(|e| StorageError::tantivy("reload", e))?;
        Ok(())
    }

    // ----- staged operations -----

    /// Buffer a file upsert for the next [`commit_staged`].
    ///
    /// [`commit_staged`]: LexicalIndex::commit_staged
    pub fn stage_file(
        &self,
        path: &str,
        content: &str,
        context_id: ContextId,
        file_id: FileId,
        symbols: &[String],
    ) {
        self.staged_adds.lock().push(StagedDoc {
            path: path.to_string(),
            content: content.to_string(),
            symbols: symbols.to_vec(),
            context_id,
            file_id,
        });
    }

    /// Buffer a file removal for the next commit.
    pub fn stage_remove(&self, path: &str) {
        self.staged_removes.lock().push(path.to_string());
    }

    /// Buffer a full wipe, applied before the staged upserts on the next
    /// commit. Used by full reindex so the wipe and the rebuild land in
    /// one commit.
    pub fn stage_clear_all(&self) {
        *self.staged_clear.lock() = true;
    }

    pub fn has_staged_changes(&self) -> bool {
        !self.staged_adds.lock().is_empty()
            || !self.staged_removes.lock().is_empty()
            || *self.staged_clear.lock()
    }

    /// (additions, removals) currently staged.
    pub fn staged_count(&self) -> (usize, usize) {
        (self.staged_adds.lock().len(), self.staged_removes.lock().len())
    }

    /// Apply all staged changes in one writer commit. This is the
    /// lexical side of epoch publishing; call it immediately before
    /// committing the SQL transaction. On failure the buffers are
    /// cleared and the error propagates; nothing was made visible.
    pub fn commit_staged(&self) -> StorageResult<usize> {
        if !self.has_staged_changes() {
            return Ok(0);
        }

        let adds = std::mem::take(&mut *self.staged_adds.lock());
        let removes = std::mem::take(&mut *self.staged_removes.lock());
        let clear = std::mem::take(&mut *self.staged_clear.lock());
        let count = adds.len() + removes.len();

        let mut writer = self
            .index
            .writer::<TantivyDocument>(WRITER_BUFFER_BYTES)
            .map_err(|e| StorageError::tantivy("writer", e))?;

        if clear {
            writer
                .delete_all_documents()
                .map_err(|e| StorageError::tantivy("staged-clear", e))?;
        }
        for path in &removes {
            writer.delete_term(Term::from_field_text(self.fields.path_exact, path));
        }
        for staged in &adds {
            writer.delete_term(Term::from_field_text(self.fields.path_exact, &staged.path));
            writer
                .add_document(self.make_doc(staged))
                .map_err(|e| StorageError::tantivy("stage-add", e))?;
        }

        writer
            .commit()
            .map_err(|e| StorageError::tantivy("staged-commit", e))?;
        self.reader
            .reload()
            .map_err(|e| StorageError::tantivy("reload", e))?;
        debug!(adds = adds.len(), removes = removes.len(), "lexical commit");
        Ok(count)
    }

    /// Drop all staged changes without committing.
    pub fn discard_staged(&self) -> usize {
        let adds = std::mem::take(&mut *self.staged_adds.lock());
        let removes = std::mem::take(&mut *self.staged_removes.lock());
        *self.staged_clear.lock() = false;
        adds.len() + removes.len()
    }

    /// Delete every document.
    pub fn clear(&self) -> StorageResult<()> {
        let mut writer = self
            .index
            .writer::<TantivyDocument>(WRITER_BUFFER_BYTES)
            .map_err(|e| StorageError::tantivy("writer", e))?;
        writer
            .delete_all_documents()
            .map_err(|e| StorageError::tantivy("clear", e))?;
        writer
            .commit()
            .map_err(|e| StorageError::tantivy("commit", e))?;
        self.reader
            .reload()
            .map_err(|e| StorageError::tantivy("reload", e))?;
        Ok(())
    }

    pub fn doc_count(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    // ----- search -----

    /// Search content, symbols, and path fields. Field-scoped query
    /// syntax is allowed (`symbols:foo`). On a syntax error the query
    /// is escaped and retried once; if that also fails, an empty result
    /// carries the `fallback_reason`.
    pub fn search(
        &self,
        query: &str,
        limit: usize,
        context_id: Option<ContextId>,
        context_lines: usize,
    ) -> StorageResult<SearchResults> {
        let mut results = SearchResults::default();
        let searcher = self.reader.searcher();

        let parser = QueryParser::for_index(
            &self.index,
            vec![self.fields.content, self.fields.symbols, self.fields.path],
        );

        let (parsed, fallback_reason) = match parser.parse_query(query) {
            Ok(parsed) => (parsed, None),
            Err(e) => {
                let reason = format!("query syntax error: {e}");
                let escaped = escape_query(query);
                match parser.parse_query(&escaped) {
                    Ok(parsed) => (parsed, Some(reason)),
                    Err(_) => {
                        results.fallback_reason =
                            Some("query could not be parsed even after escaping".to_string());
                        return Ok(results);
                    }
                }
            }
        };

        let final_query: Box<dyn Query> = match context_id {
            Some(context) => {
                let context_term = TermQuery::new(
                    Term::from_field_u64(self.fields.context_id, u64::from(context.value())),
                    IndexRecordOption::Basic,
                );
                Box::new(BooleanQuery::new(vec![
                    (Occur::Must, parsed),
                    (Occur::Must, Box::new(context_term)),
                ]))
            }
            None => parsed,
        };

        // Fetch more documents than the caller's limit: each document
        // expands to one result per matching line.
        let doc_limit = limit.clamp(1, 500);
        let top_docs = searcher
            .search(&final_query, &TopDocs::with_limit(doc_limit))
            .map_err(|e| StorageError::tantivy("search", e))?;
        results.total_hits = top_docs.len();

        let terms = extract_search_terms(query);
        'docs: for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| StorageError::tantivy("doc", e))?;
            let path = doc
                .get_first(self.fields.path)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let content = doc
                .get_first(self.fields.content)
                .and_then(|v| v.as_str())
                .unwrap_or("");
            let context = doc
                .get_first(self.fields.context_id)
                .and_then(|v| v.as_u64())
                .and_then(|v| ContextId::new(v as u32));

            for (snippet, line) in matching_lines(content, &terms, context_lines) {
                if results.results.len() >= limit {
                    break 'docs;
                }
                results.results.push(SearchResult {
                    path: path.clone(),
                    line,
                    column: 0,
                    snippet,
                    score,
                    context_id: context,
                });
            }
        }

        results.fallback_reason = fallback_reason;
        Ok(results)
    }

    /// Search only symbol names.
    pub fn search_symbols(
        &self,
        query: &str,
        limit: usize,
        context_id: Option<ContextId>,
        context_lines: usize,
    ) -> StorageResult<SearchResults> {
        self.search(&format!("symbols:{query}"), limit, context_id, context_lines)
    }

    /// Search file paths.
    pub fn search_path(
        &self,
        pattern: &str,
        limit: usize,
        context_id: Option<ContextId>,
        context_lines: usize,
    ) -> StorageResult<SearchResults> {
        self.search(&format!("path:{pattern}"), limit, context_id, context_lines)
    }
}

/// Escape tantivy query operators for a literal retry.
fn escape_query(query: &str) -> String {
    const SPECIAL: &str = "+-&|!(){}[]^\"~*?:\\/ ";
    let mut escaped = String::with_capacity(query.len() * 2);
    for ch in query.chars() {
        if SPECIAL.contains(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Literal search terms from a query: field prefixes stripped, boolean
/// operators dropped, lowercased.
fn extract_search_terms(query: &str) -> Vec<String> {
    let mut terms = Vec::new();
    for raw in query.to_lowercase().split_whitespace() {
        if let Some((_, value)) = raw.split_once(':') {
            if !value.is_empty() {
                terms.push(value.to_string());
            }
        } else if !matches!(raw, "and" | "or" | "not") {
            terms.push(raw.to_string());
        }
    }
    terms
}

/// All lines containing any search term, each with a symmetric context
/// window. Falls back to the head of the file when nothing matches (the
/// document itself was a hit, e.g. on the path field).
fn matching_lines(content: &str, terms: &[String], context_lines: usize) -> Vec<(String, u32)> {
    let lines: Vec<&str> = content.split('\n').collect();
    if terms.is_empty() {
        let head = lines
            .iter()
            .take(1 + 2 * context_lines)
            .copied()
            .collect::<Vec<_>>()
            .join("\n");
        return vec![(head, 1)];
    }

    let mut matches = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let lower = line.to_lowercase();
        if terms.iter().any(|t| lower.contains(t.as_str())) {
            let start = i.saturating_sub(context_lines);
            let end = (i + context_lines + 1).min(lines.len());
            matches.push((lines[start..end].join("\n"), (i + 1) as u32));
        }
    }

    if matches.is_empty() {
        let head = lines
            .iter()
            .take(1 + 2 * context_lines)
            .copied()
            .collect::<Vec<_>>()
            .join("\n");
        return vec![(head, 1)];
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ctx(v: u32) -> ContextId {
        ContextId::new(v).unwrap()
    }

    fn fid(v: u32) -> FileId {
        FileId::new(v).unwrap()
    }

    #[test]
    fn test_add_and_search() {
        let temp = TempDir::new().unwrap();
        let index = LexicalIndex::open(temp.path()).unwrap();
        index
            .add_file(
                "src/parser.py",
                "def parse_json(data):\n    return json.loads(data)\n",
                ctx(1),
                fid(1),
                &["parse_json".to_string()],
            )
            .unwrap();

        let results = index.search("parse_json", 10, None, 1).unwrap();
        assert_eq!(results.results.len(), 1);
        assert_eq!(results.results[0].path, "src/parser.py");
        assert_eq!(results.results[0].line, 1);
        assert!(results.fallback_reason.is_none());
    }

    #[test]
    fn test_one_result_per_matching_line() {
        let temp = TempDir::new().unwrap();
        let index = LexicalIndex::open(temp.path()).unwrap();
        index
            .add_file(
                "a.py",
                "handler = 1\nx = 2\nhandler2 = handler\n",
                ctx(1),
                fid(1),
                &[],
            )
            .unwrap();

        let results = index.search("handler", 10, None, 0).unwrap();
        assert_eq!(results.total_hits, 1);
        assert_eq!(results.results.len(), 2);
        assert_eq!(results.results[0].line, 1);
        assert_eq!(results.results[1].line, 3);
    }

    #[test]
    fn test_snippet_context_window() {
        let temp = TempDir::new().unwrap();
        let index = LexicalIndex::open(temp.path()).unwrap();
        index
            .add_file("a.py", "one\ntwo\nneedle\nfour\nfive\n", ctx(1), fid(1), &[])
            .unwrap();

        let results = index.search("needle", 10, None, 1).unwrap();
        assert_eq!(results.results[0].snippet, "two\nneedle\nfour");
        assert_eq!(results.results[0].line, 3);
    }

    #[test]
    fn test_context_filter() {
        let temp = TempDir::new().unwrap();
        let index = LexicalIndex::open(temp.path()).unwrap();
        index
            .add_file("a.py", "shared_token\n", ctx(1), fid(1), &[])
            .unwrap();
        index
            .add_file("b.js", "shared_token\n", ctx(2), fid(2), &[])
            .unwrap();

        let all = index.search("shared_token", 10, None, 0).unwrap();
        assert_eq!(all.results.len(), 2);

        let only_one = index.search("shared_token", 10, Some(ctx(1)), 0).unwrap();
        assert_eq!(only_one.results.len(), 1);
        assert_eq!(only_one.results[0].path, "a.py");
        assert_eq!(only_one.results[0].context_id, Some(ctx(1)));
    }

    #[test]
    fn test_staged_commit_atomicity() {
        let temp = TempDir::new().unwrap();
        let index = LexicalIndex::open(temp.path()).unwrap();
        index.stage_file("a.py", "alpha\n", ctx(1), fid(1), &[]);
        index.stage_file("b.py", "beta\n", ctx(1), fid(2), &[]);

        // Nothing visible before the commit.
        assert_eq!(index.search("alpha", 10, None, 0).unwrap().results.len(), 0);
        assert!(index.has_staged_changes());
        assert_eq!(index.staged_count(), (2, 0));

        let applied = index.commit_staged().unwrap();
        assert_eq!(applied, 2);
        assert!(!index.has_staged_changes());
        assert_eq!(index.search("alpha", 10, None, 0).unwrap().results.len(), 1);
    }

    #[test]
    fn test_discard_staged() {
        let temp = TempDir::new().unwrap();
        let index = LexicalIndex::open(temp.path()).unwrap();
        index.stage_file("a.py", "gamma\n", ctx(1), fid(1), &[]);
        assert_eq!(index.discard_staged(), 1);
        assert_eq!(index.commit_staged().unwrap(), 0);
        assert_eq!(index.search("gamma", 10, None, 0).unwrap().results.len(), 0);
    }

    #[test]
    fn test_stage_remove() {
        let temp = TempDir::new().unwrap();
        let index = LexicalIndex::open(temp.path()).unwrap();
        index
            .add_file("a.py", "delta\n", ctx(1), fid(1), &[])
            .unwrap();
        index.stage_remove("a.py");
        index.commit_staged().unwrap();
        assert_eq!(index.search("delta", 10, None, 0).unwrap().results.len(), 0);
        assert_eq!(index.doc_count(), 0);
    }

    #[test]
    fn test_malformed_query_falls_back() {
        let temp = TempDir::new().unwrap();
        let index = LexicalIndex::open(temp.path()).unwrap();
        index
            .add_file("a.py", "weird AND( token\n", ctx(1), fid(1), &[])
            .unwrap();

        let results = index.search("(((", 10, None, 0).unwrap();
        // The literal retry ran; the reason survives either way.
        assert!(results.fallback_reason.is_some());
    }

    #[test]
    fn test_symbol_and_path_search() {
        let temp = TempDir::new().unwrap();
        let index = LexicalIndex::open(temp.path()).unwrap();
        index
            .add_file(
                "src/handlers/auth.py",
                "def login():\n    pass\n",
                ctx(1),
                fid(1),
                &["login".to_string()],
            )
            .unwrap();

        let by_symbol = index.search_symbols("login", 10, None, 0).unwrap();
        assert_eq!(by_symbol.results.len(), 1);

        let by_path = index.search_path("auth", 10, None, 0).unwrap();
        assert_eq!(by_path.results.len(), 1);
    }

    #[test]
    fn test_reopen_preserves_documents() {
        let temp = TempDir::new().unwrap();
        {
            let index = LexicalIndex::open(temp.path()).unwrap();
            index
                .add_file("a.py", "persistent\n", ctx(1), fid(1), &[])
                .unwrap();
        }
        let reopened = LexicalIndex::open(temp.path()).unwrap();
        assert_eq!(
            reopened.search("persistent", 10, None, 0).unwrap().results.len(),
            1
        );
    }
}
