//! Read-only graph queries over the fact store.
//!
//! Every method is one indexed SQL statement returning typed rows by
//! value; nothing here mutates the store.

use rusqlite::{OptionalExtension, Row, params};

use super::FactStore;
use crate::error::StorageResult;
use crate::registry::LanguageFamily;
use crate::types::{
    BindTargetKind, Certainty, ContextId, ContextTier, DefKind, EpochId, FileId, ImportKind,
    ProbeStatus, Range, RefRole, RefTier, ScopeId, ScopeKind,
};

#[derive(Debug, Clone)]
pub struct ContextRow {
    pub id: ContextId,
    pub language_family: LanguageFamily,
    pub root_path: String,
    pub tier: Option<ContextTier>,
    pub markers: Vec<String>,
    pub probe_status: ProbeStatus,
    pub is_root_fallback: bool,
}

#[derive(Debug, Clone)]
pub struct FileRow {
    pub id: FileId,
    pub path: String,
    pub language_family: Option<LanguageFamily>,
    pub declared_module: Option<String>,
    pub context_id: ContextId,
    pub content_hash: String,
    pub size_bytes: u64,
    pub interface_hash: Option<String>,
    pub last_seen_epoch: EpochId,
}

#[derive(Debug, Clone)]
pub struct DefRow {
    pub def_uid: String,
    pub file_id: FileId,
    pub unit_id: ContextId,
    pub kind: DefKind,
    pub name: String,
    pub lexical_path: String,
    pub signature: Option<String>,
    pub range: Range,
}

#[derive(Debug, Clone)]
pub struct RefRow {
    pub file_id: FileId,
    pub unit_id: ContextId,
    pub token_text: String,
    pub role: RefRole,
    pub ref_tier: RefTier,
    pub certainty: Certainty,
    pub target_def_uid: Option<String>,
    pub range: Range,
}

#[derive(Debug, Clone)]
pub struct ScopeRow {
    pub scope_id: ScopeId,
    pub file_id: FileId,
    pub unit_id: ContextId,
    pub parent_scope_id: Option<ScopeId>,
    pub kind: ScopeKind,
    pub range: Range,
}

#[derive(Debug, Clone)]
pub struct BindRow {
    pub file_id: FileId,
    pub scope_id: ScopeId,
    pub name: String,
    pub target_kind: BindTargetKind,
    pub target_uid: Option<String>,
    pub certainty: Certainty,
    pub reason_code: String,
}

#[derive(Debug, Clone)]
pub struct ImportRow {
    pub import_uid: String,
    pub file_id: FileId,
    pub imported_name: String,
    pub alias: Option<String>,
    pub source_literal: String,
    pub import_kind: ImportKind,
    pub resolved_path: Option<String>,
    pub certainty: Certainty,
    pub range: Range,
}

#[derive(Debug, Clone)]
pub struct ExportSurfaceRow {
    pub surface_id: i64,
    pub unit_id: ContextId,
}

#[derive(Debug, Clone)]
pub struct ExportEntryRow {
    pub exported_name: String,
    pub def_uid: String,
}

#[derive(Debug, Clone)]
pub struct AnchorGroupRow {
    pub unit_id: ContextId,
    pub member_token: String,
    pub receiver_shape: Option<String>,
    pub total_count: u32,
}

#[derive(Debug, Clone)]
pub struct EpochRow {
    pub epoch_id: EpochId,
    pub created_at: i64,
    pub head_sha: String,
    pub files_added: u32,
    pub files_modified: u32,
    pub files_removed: u32,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SnapshotRow {
    pub def_uid: String,
    pub epoch_id: EpochId,
    pub file_path: String,
    pub signature_hash: String,
    pub body_hash: String,
    pub range: Range,
    pub tombstone: bool,
}

/// Read-only facade over [`FactStore`].
pub struct GraphQueries<'a> {
    store: &'a FactStore,
}

fn range_from(row: &Row, base: usize) -> rusqlite::Result<Range> {
    Ok(Range::new(
        row.get(base)?,
        row.get(base + 1)?,
        row.get(base + 2)?,
        row.get(base + 3)?,
    ))
}

fn def_from(row: &Row) -> rusqlite::Result<DefRow> {
    Ok(DefRow {
        def_uid: row.get(0)?,
        file_id: FileId::from_i64(row.get(1)?).expect("valid file id"),
        unit_id: ContextId::from_i64(row.get(2)?).expect("valid unit id"),
        kind: DefKind::parse(&row.get::<_, String>(3)?).unwrap_or(DefKind::Function),
        name: row.get(4)?,
        lexical_path: row.get(5)?,
        signature: row.get(6)?,
        range: range_from(row, 7)?,
    })
}

fn ref_from(row: &Row) -> rusqlite::Result<RefRow> {
    Ok(RefRow {
        file_id: FileId::from_i64(row.get(0)?).expect("valid file id"),
        unit_id: ContextId::from_i64(row.get(1)?).expect("valid unit id"),
        token_text: row.get(2)?,
        role: RefRole::parse(&row.get::<_, String>(3)?).unwrap_or(RefRole::Reference),
        ref_tier: RefTier::parse(&row.get::<_, String>(4)?).unwrap_or(RefTier::Unknown),
        certainty: Certainty::parse(&row.get::<_, String>(5)?).unwrap_or(Certainty::Uncertain),
        target_def_uid: row.get(6)?,
        range: range_from(row, 7)?,
    })
}

fn file_from(row: &Row) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: FileId::from_i64(row.get(0)?).expect("valid file id"),
        path: row.get(1)?,
        language_family: row
            .get::<_, Option<String>>(2)?
            .and_then(|s| LanguageFamily::parse(&s)),
        declared_module: row.get(3)?,
        context_id: ContextId::from_i64(row.get(4)?).expect("valid context id"),
        content_hash: row.get(5)?,
        size_bytes: row.get::<_, i64>(6)? as u64,
        interface_hash: row.get(7)?,
        last_seen_epoch: EpochId::from_i64(row.get(8)?).expect("valid epoch id"),
    })
}

fn import_from(row: &Row) -> rusqlite::Result<ImportRow> {
    Ok(ImportRow {
        import_uid: row.get(0)?,
        file_id: FileId::from_i64(row.get(1)?).expect("valid file id"),
        imported_name: row.get(2)?,
        alias: row.get(3)?,
        source_literal: row.get(4)?,
        import_kind: ImportKind::parse(&row.get::<_, String>(5)?)
            .unwrap_or(ImportKind::PythonImport),
        resolved_path: row.get(6)?,
        certainty: Certainty::parse(&row.get::<_, String>(7)?).unwrap_or(Certainty::Uncertain),
        range: range_from(row, 8)?,
    })
}

fn scope_from(row: &Row) -> rusqlite::Result<ScopeRow> {
    Ok(ScopeRow {
        scope_id: ScopeId::from_i64(row.get(0)?).expect("valid scope id"),
        file_id: FileId::from_i64(row.get(1)?).expect("valid file id"),
        unit_id: ContextId::from_i64(row.get(2)?).expect("valid unit id"),
        parent_scope_id: row.get::<_, Option<i64>>(3)?.and_then(ScopeId::from_i64),
        kind: ScopeKind::parse(&row.get::<_, String>(4)?).unwrap_or(ScopeKind::Other),
        range: range_from(row, 5)?,
    })
}

const DEF_COLS: &str =
    "def_uid, file_id, unit_id, kind, name, lexical_path, signature, start_line, start_col, end_line, end_col";
const REF_COLS: &str =
    "file_id, unit_id, token_text, role, ref_tier, certainty, target_def_uid, start_line, start_col, end_line, end_col";
const FILE_COLS: &str =
    "id, path, language_family, declared_module, context_id, content_hash, size_bytes, interface_hash, last_seen_epoch";
const IMPORT_COLS: &str =
    "import_uid, file_id, imported_name, alias, source_literal, import_kind, resolved_path, certainty, start_line, start_col, end_line, end_col";
const SCOPE_COLS: &str =
    "scope_id, file_id, unit_id, parent_scope_id, kind, start_line, start_col, end_line, end_col";

impl<'a> GraphQueries<'a> {
    pub(super) fn new(store: &'a FactStore) -> Self {
        Self { store }
    }

    // ----- defs -----

    pub fn get_def(&self, def_uid: &str) -> StorageResult<Option<DefRow>> {
        Ok(self
            .store
            .conn()
            .query_row(
                &format!("SELECT {DEF_COLS} FROM def_facts WHERE def_uid = ?1"),
                params![def_uid],
                def_from,
            )
            .optional()?)
    }

    pub fn list_defs_by_name(
        &self,
        unit_id: ContextId,
        name: &str,
        limit: usize,
    ) -> StorageResult<Vec<DefRow>> {
        let mut stmt = self.store.conn().prepare_cached(&format!(
            "SELECT {DEF_COLS} FROM def_facts WHERE unit_id = ?1 AND name = ?2 LIMIT ?3"
        ))?;
        let rows = stmt
            .query_map(params![unit_id.as_i64(), name, limit as i64], def_from)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_defs_in_file(&self, file_id: FileId) -> StorageResult<Vec<DefRow>> {
        let mut stmt = self.store.conn().prepare_cached(&format!(
            "SELECT {DEF_COLS} FROM def_facts WHERE file_id = ?1 ORDER BY start_line"
        ))?;
        let rows = stmt
            .query_map(params![file_id.as_i64()], def_from)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ----- refs -----

    pub fn list_refs_by_def_uid(
        &self,
        def_uid: &str,
        tier: Option<RefTier>,
    ) -> StorageResult<Vec<RefRow>> {
        match tier {
            Some(tier) => {
                let mut stmt = self.store.conn().prepare_cached(&format!(
                    "SELECT {REF_COLS} FROM ref_facts WHERE target_def_uid = ?1 AND ref_tier = ?2"
                ))?;
                let rows = stmt
                    .query_map(params![def_uid, tier.as_str()], ref_from)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            }
            None => {
                let mut stmt = self.store.conn().prepare_cached(&format!(
                    "SELECT {REF_COLS} FROM ref_facts WHERE target_def_uid = ?1"
                ))?;
                let rows = stmt
                    .query_map(params![def_uid], ref_from)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            }
        }
    }

    pub fn list_proven_refs(&self, def_uid: &str) -> StorageResult<Vec<RefRow>> {
        self.list_refs_by_def_uid(def_uid, Some(RefTier::Proven))
    }

    pub fn list_refs_in_file(&self, file_id: FileId) -> StorageResult<Vec<RefRow>> {
        let mut stmt = self.store.conn().prepare_cached(&format!(
            "SELECT {REF_COLS} FROM ref_facts WHERE file_id = ?1 ORDER BY start_line, start_col"
        ))?;
        let rows = stmt
            .query_map(params![file_id.as_i64()], ref_from)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_refs_by_token(
        &self,
        unit_id: ContextId,
        token: &str,
    ) -> StorageResult<Vec<RefRow>> {
        let mut stmt = self.store.conn().prepare_cached(&format!(
            "SELECT {REF_COLS} FROM ref_facts WHERE unit_id = ?1 AND token_text = ?2"
        ))?;
        let rows = stmt
            .query_map(params![unit_id.as_i64(), token], ref_from)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ----- scopes & binds -----

    pub fn get_scope(&self, scope_id: ScopeId) -> StorageResult<Option<ScopeRow>> {
        Ok(self
            .store
            .conn()
            .query_row(
                &format!("SELECT {SCOPE_COLS} FROM scopes WHERE scope_id = ?1"),
                params![scope_id.as_i64()],
                scope_from,
            )
            .optional()?)
    }

    pub fn list_scopes_in_file(&self, file_id: FileId) -> StorageResult<Vec<ScopeRow>> {
        let mut stmt = self.store.conn().prepare_cached(&format!(
            "SELECT {SCOPE_COLS} FROM scopes WHERE file_id = ?1 ORDER BY scope_id"
        ))?;
        let rows = stmt
            .query_map(params![file_id.as_i64()], scope_from)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_local_bind(&self, scope_id: ScopeId, name: &str) -> StorageResult<Option<BindRow>> {
        Ok(self
            .store
            .conn()
            .query_row(
                "SELECT file_id, scope_id, name, target_kind, target_uid, certainty, reason_code
                 FROM local_bind_facts WHERE scope_id = ?1 AND name = ?2",
                params![scope_id.as_i64(), name],
                bind_from,
            )
            .optional()?)
    }

    pub fn list_binds_in_scope(&self, scope_id: ScopeId) -> StorageResult<Vec<BindRow>> {
        let mut stmt = self.store.conn().prepare_cached(
            "SELECT file_id, scope_id, name, target_kind, target_uid, certainty, reason_code
             FROM local_bind_facts WHERE scope_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![scope_id.as_i64()], bind_from)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ----- imports -----

    pub fn get_import(&self, import_uid: &str) -> StorageResult<Option<ImportRow>> {
        Ok(self
            .store
            .conn()
            .query_row(
                &format!("SELECT {IMPORT_COLS} FROM import_facts WHERE import_uid = ?1"),
                params![import_uid],
                import_from,
            )
            .optional()?)
    }

    pub fn list_imports(&self, file_id: FileId) -> StorageResult<Vec<ImportRow>> {
        let mut stmt = self.store.conn().prepare_cached(&format!(
            "SELECT {IMPORT_COLS} FROM import_facts WHERE file_id = ?1 ORDER BY start_line"
        ))?;
        let rows = stmt
            .query_map(params![file_id.as_i64()], import_from)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ----- export surfaces -----

    pub fn get_export_surface(&self, unit_id: ContextId) -> StorageResult<Option<ExportSurfaceRow>> {
        Ok(self
            .store
            .conn()
            .query_row(
                "SELECT surface_id, unit_id FROM export_surfaces WHERE unit_id = ?1",
                params![unit_id.as_i64()],
                |row| {
                    Ok(ExportSurfaceRow {
                        surface_id: row.get(0)?,
                        unit_id: ContextId::from_i64(row.get(1)?).expect("valid unit id"),
                    })
                },
            )
            .optional()?)
    }

    pub fn list_export_entries(&self, surface_id: i64) -> StorageResult<Vec<ExportEntryRow>> {
        let mut stmt = self.store.conn().prepare_cached(
            "SELECT exported_name, def_uid FROM export_entries WHERE surface_id = ?1
             ORDER BY exported_name",
        )?;
        let rows = stmt
            .query_map(params![surface_id], |row| {
                Ok(ExportEntryRow {
                    exported_name: row.get(0)?,
                    def_uid: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ----- anchor groups -----

    pub fn get_anchor_group(
        &self,
        unit_id: ContextId,
        member_token: &str,
        receiver_shape: Option<&str>,
    ) -> StorageResult<Option<AnchorGroupRow>> {
        Ok(self
            .store
            .conn()
            .query_row(
                "SELECT unit_id, member_token, receiver_shape, total_count FROM anchor_groups
                 WHERE unit_id = ?1 AND member_token = ?2 AND receiver_shape = ?3",
                params![unit_id.as_i64(), member_token, receiver_shape.unwrap_or("")],
                anchor_from,
            )
            .optional()?)
    }

    pub fn list_anchor_groups(&self, unit_id: ContextId) -> StorageResult<Vec<AnchorGroupRow>> {
        let mut stmt = self.store.conn().prepare_cached(
            "SELECT unit_id, member_token, receiver_shape, total_count FROM anchor_groups
             WHERE unit_id = ?1 ORDER BY member_token, receiver_shape",
        )?;
        let rows = stmt
            .query_map(params![unit_id.as_i64()], anchor_from)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ----- files & contexts -----

    pub fn get_file(&self, file_id: FileId) -> StorageResult<Option<FileRow>> {
        Ok(self
            .store
            .conn()
            .query_row(
                &format!("SELECT {FILE_COLS} FROM files WHERE id = ?1"),
                params![file_id.as_i64()],
                file_from,
            )
            .optional()?)
    }

    pub fn get_file_by_path(&self, path: &str) -> StorageResult<Option<FileRow>> {
        Ok(self
            .store
            .conn()
            .query_row(
                &format!("SELECT {FILE_COLS} FROM files WHERE path = ?1"),
                params![path],
                file_from,
            )
            .optional()?)
    }

    pub fn list_files(&self, limit: usize) -> StorageResult<Vec<FileRow>> {
        let mut stmt = self.store.conn().prepare_cached(&format!(
            "SELECT {FILE_COLS} FROM files ORDER BY path LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(params![limit as i64], file_from)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_contexts(&self) -> StorageResult<Vec<ContextRow>> {
        let mut stmt = self.store.conn().prepare_cached(
            "SELECT id, language_family, root_path, tier, markers, probe_status, is_root_fallback
             FROM contexts ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ContextRow {
                    id: ContextId::from_i64(row.get(0)?).expect("valid context id"),
                    language_family: LanguageFamily::parse(&row.get::<_, String>(1)?)
                        .unwrap_or(LanguageFamily::JsonYaml),
                    root_path: row.get(2)?,
                    tier: row.get::<_, Option<u8>>(3)?.and_then(ContextTier::from_u8),
                    markers: serde_json::from_str(&row.get::<_, String>(4)?).unwrap_or_default(),
                    probe_status: ProbeStatus::parse(&row.get::<_, String>(5)?)
                        .unwrap_or(ProbeStatus::Pending),
                    is_root_fallback: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ----- epochs & snapshots -----

    pub fn list_epochs(&self) -> StorageResult<Vec<EpochRow>> {
        let mut stmt = self.store.conn().prepare_cached(
            "SELECT epoch_id, created_at, head_sha, files_added, files_modified, files_removed,
                    errors
             FROM epochs ORDER BY epoch_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(EpochRow {
                    epoch_id: EpochId::from_i64(row.get(0)?).expect("valid epoch id"),
                    created_at: row.get(1)?,
                    head_sha: row.get(2)?,
                    files_added: row.get(3)?,
                    files_modified: row.get(4)?,
                    files_removed: row.get(5)?,
                    errors: serde_json::from_str(&row.get::<_, String>(6)?).unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// All snapshot records for a def, newest epoch first.
    pub fn list_snapshots(&self, def_uid: &str) -> StorageResult<Vec<SnapshotRow>> {
        let mut stmt = self.store.conn().prepare_cached(
            "SELECT def_uid, epoch_id, file_path, signature_hash, body_hash,
                    start_line, start_col, end_line, end_col, tombstone
             FROM def_snapshot_records WHERE def_uid = ?1 ORDER BY epoch_id DESC",
        )?;
        let rows = stmt
            .query_map(params![def_uid], |row| {
                Ok(SnapshotRow {
                    def_uid: row.get(0)?,
                    epoch_id: EpochId::from_i64(row.get(1)?).expect("valid epoch id"),
                    file_path: row.get(2)?,
                    signature_hash: row.get(3)?,
                    body_hash: row.get(4)?,
                    range: range_from(row, 5)?,
                    tombstone: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn bind_from(row: &Row) -> rusqlite::Result<BindRow> {
    Ok(BindRow {
        file_id: FileId::from_i64(row.get(0)?).expect("valid file id"),
        scope_id: ScopeId::from_i64(row.get(1)?).expect("valid scope id"),
        name: row.get(2)?,
        target_kind: BindTargetKind::parse(&row.get::<_, String>(3)?)
            .unwrap_or(BindTargetKind::Local),
        target_uid: row.get(4)?,
        certainty: Certainty::parse(&row.get::<_, String>(5)?).unwrap_or(Certainty::Uncertain),
        reason_code: row.get(6)?,
    })
}

fn anchor_from(row: &Row) -> rusqlite::Result<AnchorGroupRow> {
    let shape: String = row.get(2)?;
    Ok(AnchorGroupRow {
        unit_id: ContextId::from_i64(row.get(0)?).expect("valid unit id"),
        member_token: row.get(1)?,
        receiver_shape: if shape.is_empty() { None } else { Some(shape) },
        total_count: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract;
    use crate::parsing::SourceParser;
    use crate::store::{NewContext, NewFile};
    use crate::types::ScopeKind;

    fn indexed_store() -> (FactStore, ContextId, FileId) {
        let store = FactStore::open_in_memory().unwrap();
        let context = store
            .insert_context(&NewContext {
                language_family: LanguageFamily::Python,
                root_path: "",
                tier: Some(ContextTier::Package),
                markers: &[],
                include_spec: &[],
                exclude_spec: &[],
                probe_status: ProbeStatus::Valid,
                is_root_fallback: false,
            })
            .unwrap();

        let source = "def helper():\n    pass\n\ndef caller():\n    return helper()\n";
        let mut parser = SourceParser::new();
        let parsed = parser.parse("src/a.py", source.as_bytes()).unwrap();
        let bundle = extract::extract(&parsed, source, "src/a.py");

        let file_id = store
            .insert_file(&NewFile {
                path: "src/a.py",
                language_family: Some(LanguageFamily::Python),
                declared_module: None,
                context_id: context,
                content_hash: "h",
                size_bytes: source.len() as u64,
                interface_hash: Some(&bundle.interface_hash),
                last_seen_epoch: EpochId::FIRST,
            })
            .unwrap();
        store.insert_bundle(file_id, context, &bundle).unwrap();
        (store, context, file_id)
    }

    #[test]
    fn test_get_def_and_list_by_name() {
        let (store, context, file_id) = indexed_store();
        let graph = store.graph();

        let defs = graph.list_defs_by_name(context, "helper", 10).unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].kind, DefKind::Function);
        assert_eq!(defs[0].file_id, file_id);

        let by_uid = graph.get_def(&defs[0].def_uid).unwrap().unwrap();
        assert_eq!(by_uid.name, "helper");
        assert!(graph.get_def("ffffffffffffffff").unwrap().is_none());
    }

    #[test]
    fn test_reverse_refs_by_tier() {
        let (store, _context, _file) = indexed_store();
        let graph = store.graph();
        let def = graph.list_defs_in_file(_file).unwrap();
        let helper = def.iter().find(|d| d.name == "helper").unwrap();

        let proven = graph.list_proven_refs(&helper.def_uid).unwrap();
        // The definition occurrence and the call site both target it.
        assert!(proven.len() >= 2);
        assert!(proven.iter().any(|r| r.role == RefRole::Reference));
        assert!(
            graph
                .list_refs_by_def_uid(&helper.def_uid, Some(RefTier::Anchored))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_scope_queries() {
        let (store, _context, file_id) = indexed_store();
        let graph = store.graph();
        let scopes = graph.list_scopes_in_file(file_id).unwrap();
        let file_scope = scopes.iter().find(|s| s.kind == ScopeKind::File).unwrap();
        assert!(file_scope.parent_scope_id.is_none());

        let fetched = graph.get_scope(file_scope.scope_id).unwrap().unwrap();
        assert_eq!(fetched.kind, ScopeKind::File);

        let binds = graph.list_binds_in_scope(file_scope.scope_id).unwrap();
        assert!(binds.iter().any(|b| b.name == "helper"));
        assert!(
            graph
                .get_local_bind(file_scope.scope_id, "helper")
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_refs_by_token() {
        let (store, context, _file) = indexed_store();
        let graph = store.graph();
        let refs = graph.list_refs_by_token(context, "helper").unwrap();
        assert!(!refs.is_empty());
        assert!(refs.iter().all(|r| r.token_text == "helper"));
    }

    #[test]
    fn test_export_surface() {
        let (store, context, _file) = indexed_store();
        let graph = store.graph();
        let surface = graph.get_export_surface(context).unwrap().unwrap();
        let entries = graph.list_export_entries(surface.surface_id).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.exported_name.as_str()).collect();
        assert!(names.contains(&"helper"));
        assert!(names.contains(&"caller"));
    }

    #[test]
    fn test_list_files_and_contexts() {
        let (store, context, _file) = indexed_store();
        let graph = store.graph();
        let files = graph.list_files(10).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "src/a.py");

        let contexts = graph.list_contexts().unwrap();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].id, context);
    }
}
