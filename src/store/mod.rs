//! Relational fact store over SQLite.
//!
//! One connection per store, writes serialized by the coordinator.
//! The schema keeps every graph query on an index; facts reference
//! each other by id and UID, never by pointer. All writes of a reindex
//! happen inside one explicit transaction that the coordinator commits
//! only after the lexical index commit succeeded.

pub mod graph;

pub use graph::GraphQueries;

use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

use crate::error::{StorageError, StorageResult};
use crate::extract::FactBundle;
use crate::registry::LanguageFamily;
use crate::types::{ContextId, ContextTier, EpochId, FileId, ProbeStatus};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS contexts (
    id INTEGER PRIMARY KEY,
    language_family TEXT NOT NULL,
    root_path TEXT NOT NULL,
    tier INTEGER,
    markers TEXT NOT NULL DEFAULT '[]',
    include_spec TEXT NOT NULL DEFAULT '[]',
    exclude_spec TEXT NOT NULL DEFAULT '[]',
    probe_status TEXT NOT NULL DEFAULT 'pending',
    is_root_fallback INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    language_family TEXT,
    declared_module TEXT,
    context_id INTEGER NOT NULL REFERENCES contexts(id),
    content_hash TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    interface_hash TEXT,
    last_seen_epoch INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_files_last_seen ON files(last_seen_epoch);

CREATE TABLE IF NOT EXISTS scopes (
    scope_id INTEGER PRIMARY KEY,
    file_id INTEGER NOT NULL REFERENCES files(id),
    unit_id INTEGER NOT NULL,
    parent_scope_id INTEGER,
    kind TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    start_col INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    end_col INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_scopes_file ON scopes(file_id);

CREATE TABLE IF NOT EXISTS def_facts (
    id INTEGER PRIMARY KEY,
    def_uid TEXT NOT NULL UNIQUE,
    file_id INTEGER NOT NULL REFERENCES files(id),
    unit_id INTEGER NOT NULL,
    kind TEXT NOT NULL,
    name TEXT NOT NULL,
    lexical_path TEXT NOT NULL,
    signature TEXT,
    start_line INTEGER NOT NULL,
    start_col INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    end_col INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_defs_unit_name ON def_facts(unit_id, name);
CREATE INDEX IF NOT EXISTS idx_defs_file ON def_facts(file_id);

CREATE TABLE IF NOT EXISTS ref_facts (
    id INTEGER PRIMARY KEY,
    file_id INTEGER NOT NULL REFERENCES files(id),
    unit_id INTEGER NOT NULL,
    token_text TEXT NOT NULL,
    role TEXT NOT NULL,
    ref_tier TEXT NOT NULL,
    certainty TEXT NOT NULL,
    target_def_uid TEXT,
    start_line INTEGER NOT NULL,
    start_col INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    end_col INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_refs_target ON ref_facts(target_def_uid);
CREATE INDEX IF NOT EXISTS idx_refs_unit_token ON ref_facts(unit_id, token_text);
CREATE INDEX IF NOT EXISTS idx_refs_file ON ref_facts(file_id);

CREATE TABLE IF NOT EXISTS local_bind_facts (
    id INTEGER PRIMARY KEY,
    file_id INTEGER NOT NULL REFERENCES files(id),
    scope_id INTEGER NOT NULL REFERENCES scopes(scope_id),
    name TEXT NOT NULL,
    target_kind TEXT NOT NULL,
    target_uid TEXT,
    certainty TEXT NOT NULL,
    reason_code TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_binds_scope_name ON local_bind_facts(scope_id, name);
CREATE INDEX IF NOT EXISTS idx_binds_file ON local_bind_facts(file_id);

CREATE TABLE IF NOT EXISTS import_facts (
    id INTEGER PRIMARY KEY,
    import_uid TEXT NOT NULL UNIQUE,
    file_id INTEGER NOT NULL REFERENCES files(id),
    imported_name TEXT NOT NULL,
    alias TEXT,
    source_literal TEXT NOT NULL,
    import_kind TEXT NOT NULL,
    resolved_path TEXT,
    certainty TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    start_col INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    end_col INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_imports_file ON import_facts(file_id);

CREATE TABLE IF NOT EXISTS export_surfaces (
    surface_id INTEGER PRIMARY KEY,
    unit_id INTEGER NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS export_entries (
    id INTEGER PRIMARY KEY,
    surface_id INTEGER NOT NULL REFERENCES export_surfaces(surface_id),
    exported_name TEXT NOT NULL,
    def_uid TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_export_entries_surface ON export_entries(surface_id);

CREATE TABLE IF NOT EXISTS anchor_groups (
    id INTEGER PRIMARY KEY,
    unit_id INTEGER NOT NULL,
    member_token TEXT NOT NULL,
    receiver_shape TEXT NOT NULL DEFAULT '',
    total_count INTEGER NOT NULL DEFAULT 0,
    UNIQUE(unit_id, member_token, receiver_shape)
);

CREATE TABLE IF NOT EXISTS anchor_contribs (
    id INTEGER PRIMARY KEY,
    file_id INTEGER NOT NULL REFERENCES files(id),
    unit_id INTEGER NOT NULL,
    member_token TEXT NOT NULL,
    receiver_shape TEXT NOT NULL DEFAULT '',
    count INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_anchor_contribs_file ON anchor_contribs(file_id);

CREATE TABLE IF NOT EXISTS epochs (
    epoch_id INTEGER PRIMARY KEY,
    created_at INTEGER NOT NULL,
    head_sha TEXT NOT NULL,
    files_added INTEGER NOT NULL DEFAULT 0,
    files_modified INTEGER NOT NULL DEFAULT 0,
    files_removed INTEGER NOT NULL DEFAULT 0,
    errors TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS def_snapshot_records (
    id INTEGER PRIMARY KEY,
    def_uid TEXT NOT NULL,
    epoch_id INTEGER NOT NULL,
    file_path TEXT NOT NULL,
    signature_hash TEXT NOT NULL,
    body_hash TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    start_col INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    end_col INTEGER NOT NULL,
    tombstone INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_snapshots_epoch_path ON def_snapshot_records(epoch_id, file_path);
CREATE INDEX IF NOT EXISTS idx_snapshots_uid_epoch ON def_snapshot_records(def_uid, epoch_id DESC);

CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// The relational fact store.
pub struct FactStore {
    conn: Connection,
}

/// Attributes of a context row at insert time.
pub struct NewContext<'a> {
    pub language_family: LanguageFamily,
    pub root_path: &'a str,
    pub tier: Option<ContextTier>,
    pub markers: &'a [String],
    pub include_spec: &'a [String],
    pub exclude_spec: &'a [String],
    pub probe_status: ProbeStatus,
    pub is_root_fallback: bool,
}

/// Attributes of a file row at insert time.
pub struct NewFile<'a> {
    pub path: &'a str,
    pub language_family: Option<LanguageFamily>,
    pub declared_module: Option<&'a str>,
    pub context_id: ContextId,
    pub content_hash: &'a str,
    pub size_bytes: u64,
    pub interface_hash: Option<&'a str>,
    pub last_seen_epoch: EpochId,
}

impl FactStore {
    /// Open (or create) the store at a path and apply the schema.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::EpochPublish {
                    epoch: 0,
                    reason: format!("cannot create state directory: {e}"),
                }
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Read-only query facade.
    pub fn graph(&self) -> GraphQueries<'_> {
        GraphQueries::new(self)
    }

    // ----- transactions -----

    pub fn begin(&self) -> StorageResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        Ok(())
    }

    pub fn commit(&self) -> StorageResult<()> {
        self.conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    pub fn rollback(&self) -> StorageResult<()> {
        self.conn.execute_batch("ROLLBACK;")?;
        Ok(())
    }

    // ----- meta -----

    pub fn get_meta(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO index_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    // ----- contexts -----

    pub fn insert_context(&self, context: &NewContext) -> StorageResult<ContextId> {
        self.conn.execute(
            "INSERT INTO contexts (language_family, root_path, tier, markers, include_spec,
                                   exclude_spec, probe_status, is_root_fallback)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                context.language_family.as_str(),
                context.root_path,
                context.tier.map(|t| t.as_u8()),
                serde_json::to_string(context.markers).unwrap_or_else(|_| "[]".into()),
                serde_json::to_string(context.include_spec).unwrap_or_else(|_| "[]".into()),
                serde_json::to_string(context.exclude_spec).unwrap_or_else(|_| "[]".into()),
                context.probe_status.as_str(),
                context.is_root_fallback,
            ],
        )?;
        ContextId::from_i64(self.conn.last_insert_rowid()).ok_or_else(|| {
            StorageError::EpochPublish {
                epoch: 0,
                reason: "context rowid out of range".into(),
            }
        })
    }

    // ----- files -----

    pub fn insert_file(&self, file: &NewFile) -> StorageResult<FileId> {
        self.conn.execute(
            "INSERT INTO files (path, language_family, declared_module, context_id,
                                content_hash, size_bytes, interface_hash, last_seen_epoch)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                file.path,
                file.language_family.map(|f| f.as_str()),
                file.declared_module,
                file.context_id.as_i64(),
                file.content_hash,
                file.size_bytes as i64,
                file.interface_hash,
                file.last_seen_epoch.as_i64(),
            ],
        )?;
        FileId::from_i64(self.conn.last_insert_rowid()).ok_or_else(|| StorageError::EpochPublish {
            epoch: 0,
            reason: "file rowid out of range".into(),
        })
    }

    pub fn update_file(&self, id: FileId, file: &NewFile) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE files SET language_family = ?2, declared_module = ?3, context_id = ?4,
                              content_hash = ?5, size_bytes = ?6, interface_hash = ?7,
                              last_seen_epoch = ?8
             WHERE id = ?1",
            params![
                id.as_i64(),
                file.language_family.map(|f| f.as_str()),
                file.declared_module,
                file.context_id.as_i64(),
                file.content_hash,
                file.size_bytes as i64,
                file.interface_hash,
                file.last_seen_epoch.as_i64(),
            ],
        )?;
        Ok(())
    }

    pub fn delete_file(&self, id: FileId) -> StorageResult<()> {
        self.remove_file_derived(id)?;
        self.delete_file_facts(id)?;
        self.conn
            .execute("DELETE FROM files WHERE id = ?1", params![id.as_i64()])?;
        Ok(())
    }

    /// Remove every fact row owned by a file, keeping the file row.
    /// Anchor aggregates drop the file's contribution on the way out.
    pub fn delete_file_facts(&self, id: FileId) -> StorageResult<()> {
        self.retract_anchor_contribs(id)?;
        let id = id.as_i64();
        self.conn
            .execute("DELETE FROM local_bind_facts WHERE file_id = ?1", params![id])?;
        self.conn
            .execute("DELETE FROM scopes WHERE file_id = ?1", params![id])?;
        self.conn
            .execute("DELETE FROM def_facts WHERE file_id = ?1", params![id])?;
        self.conn
            .execute("DELETE FROM ref_facts WHERE file_id = ?1", params![id])?;
        self.conn
            .execute("DELETE FROM import_facts WHERE file_id = ?1", params![id])?;
        Ok(())
    }

    fn retract_anchor_contribs(&self, id: FileId) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE anchor_groups SET total_count = total_count - (
                 SELECT COALESCE(SUM(c.count), 0) FROM anchor_contribs c
                 WHERE c.file_id = ?1 AND c.unit_id = anchor_groups.unit_id
                   AND c.member_token = anchor_groups.member_token
                   AND c.receiver_shape = anchor_groups.receiver_shape)",
            params![id.as_i64()],
        )?;
        self.conn
            .execute("DELETE FROM anchor_groups WHERE total_count <= 0", [])?;
        self.conn.execute(
            "DELETE FROM anchor_contribs WHERE file_id = ?1",
            params![id.as_i64()],
        )?;
        Ok(())
    }

    /// Wipe all fact tables (full reindex).
    pub fn truncate_facts(&self) -> StorageResult<()> {
        for table in [
            "local_bind_facts",
            "scopes",
            "def_facts",
            "ref_facts",
            "import_facts",
            "export_entries",
            "export_surfaces",
            "anchor_groups",
            "anchor_contribs",
            "files",
            "contexts",
        ] {
            self.conn
                .execute(&format!("DELETE FROM {table}"), [])?;
        }
        Ok(())
    }

    // ----- fact bundle writes -----

    /// Write every fact of a bundle under the given file/context. Scope
    /// rows are inserted in preorder so parents always precede children;
    /// local scope indices are rewritten to row ids on the way in.
    pub fn insert_bundle(
        &self,
        file_id: FileId,
        unit_id: ContextId,
        bundle: &FactBundle,
    ) -> StorageResult<()> {
        let mut scope_ids: Vec<i64> = Vec::with_capacity(bundle.scopes.len());
        {
            let mut stmt = self.conn.prepare_cached(
                "INSERT INTO scopes (file_id, unit_id, parent_scope_id, kind,
                                     start_line, start_col, end_line, end_col)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for scope in &bundle.scopes {
                let parent_row = scope.parent.map(|p| scope_ids[p]);
                stmt.execute(params![
                    file_id.as_i64(),
                    unit_id.as_i64(),
                    parent_row,
                    scope.kind.as_str(),
                    scope.range.start_line,
                    scope.range.start_column,
                    scope.range.end_line,
                    scope.range.end_column,
                ])?;
                scope_ids.push(self.conn.last_insert_rowid());
            }
        }

        {
            let mut stmt = self.conn.prepare_cached(
                "INSERT INTO def_facts (def_uid, file_id, unit_id, kind, name, lexical_path,
                                        signature, start_line, start_col, end_line, end_col)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for def in &bundle.defs {
                stmt.execute(params![
                    def.def_uid,
                    file_id.as_i64(),
                    unit_id.as_i64(),
                    def.kind.as_str(),
                    def.name,
                    def.lexical_path,
                    def.signature,
                    def.range.start_line,
                    def.range.start_column,
                    def.range.end_line,
                    def.range.end_column,
                ])
                .map_err(|e| match e {
                    rusqlite::Error::SqliteFailure(f, _)
                        if f.code == rusqlite::ErrorCode::ConstraintViolation =>
                    {
                        StorageError::DefUidCollision {
                            def_uid: def.def_uid.clone(),
                        }
                    }
                    other => StorageError::Sqlite(other),
                })?;
            }
        }

        {
            let mut stmt = self.conn.prepare_cached(
                "INSERT INTO ref_facts (file_id, unit_id, token_text, role, ref_tier, certainty,
                                        target_def_uid, start_line, start_col, end_line, end_col)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for r in &bundle.refs {
                stmt.execute(params![
                    file_id.as_i64(),
                    unit_id.as_i64(),
                    r.token_text,
                    r.role.as_str(),
                    r.tier.as_str(),
                    r.certainty.as_str(),
                    r.target_def_uid,
                    r.range.start_line,
                    r.range.start_column,
                    r.range.end_line,
                    r.range.end_column,
                ])?;
            }
        }

        {
            let mut stmt = self.conn.prepare_cached(
                "INSERT INTO local_bind_facts (file_id, scope_id, name, target_kind, target_uid,
                                               certainty, reason_code)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for bind in &bundle.binds {
                let Some(&scope_row) = scope_ids.get(bind.scope_index) else {
                    continue;
                };
                stmt.execute(params![
                    file_id.as_i64(),
                    scope_row,
                    bind.name,
                    bind.target_kind.as_str(),
                    bind.target_uid,
                    bind.certainty.as_str(),
                    bind.reason_code,
                ])?;
            }
        }

        {
            let mut stmt = self.conn.prepare_cached(
                "INSERT INTO import_facts (import_uid, file_id, imported_name, alias,
                                           source_literal, import_kind, resolved_path, certainty,
                                           start_line, start_col, end_line, end_col)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(import_uid) DO UPDATE SET resolved_path = excluded.resolved_path",
            )?;
            for import in &bundle.imports {
                stmt.execute(params![
                    import.import_uid,
                    file_id.as_i64(),
                    import.imported_name,
                    import.alias,
                    import.source_literal,
                    import.kind.as_str(),
                    import.resolved_path,
                    import.certainty.as_str(),
                    import.range.start_line,
                    import.range.start_column,
                    import.range.end_line,
                    import.range.end_column,
                ])?;
            }
        }

        self.merge_export_entries(unit_id, bundle)?;
        self.merge_anchor_groups(file_id, unit_id, bundle)?;
        Ok(())
    }

    fn merge_export_entries(&self, unit_id: ContextId, bundle: &FactBundle) -> StorageResult<()> {
        if bundle.exports.is_empty() {
            return Ok(());
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO export_surfaces (unit_id) VALUES (?1)",
            params![unit_id.as_i64()],
        )?;
        let surface_id: i64 = self.conn.query_row(
            "SELECT surface_id FROM export_surfaces WHERE unit_id = ?1",
            params![unit_id.as_i64()],
            |row| row.get(0),
        )?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO export_entries (surface_id, exported_name, def_uid) VALUES (?1, ?2, ?3)",
        )?;
        for entry in &bundle.exports {
            stmt.execute(params![surface_id, entry.exported_name, entry.def_uid])?;
        }
        Ok(())
    }

    fn merge_anchor_groups(
        &self,
        file_id: FileId,
        unit_id: ContextId,
        bundle: &FactBundle,
    ) -> StorageResult<()> {
        let mut group = self.conn.prepare_cached(
            "INSERT INTO anchor_groups (unit_id, member_token, receiver_shape, total_count)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(unit_id, member_token, receiver_shape)
             DO UPDATE SET total_count = total_count + excluded.total_count",
        )?;
        let mut contrib = self.conn.prepare_cached(
            "INSERT INTO anchor_contribs (file_id, unit_id, member_token, receiver_shape, count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for anchor in &bundle.anchors {
            let shape = anchor.receiver_shape.as_deref().unwrap_or("");
            group.execute(params![
                unit_id.as_i64(),
                anchor.member_token,
                shape,
                anchor.count,
            ])?;
            contrib.execute(params![
                file_id.as_i64(),
                unit_id.as_i64(),
                anchor.member_token,
                shape,
                anchor.count,
            ])?;
        }
        Ok(())
    }

    /// Remove a file's export entries before reindexing it. Entries are
    /// keyed by def_uid, which embeds the file path, so the file's own
    /// entries are separable from the rest of the surface.
    pub fn remove_file_derived(&self, file_id: FileId) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM export_entries WHERE def_uid IN
               (SELECT def_uid FROM def_facts WHERE file_id = ?1)",
            params![file_id.as_i64()],
        )?;
        Ok(())
    }

    /// Upgrade one identifier occurrence to the proven tier with an
    /// externally supplied target (semantic-indexer merge). Returns the
    /// number of rows touched.
    pub fn upgrade_ref_semantic(
        &self,
        file_id: FileId,
        line: u32,
        column: u16,
        target_def_uid: &str,
    ) -> StorageResult<usize> {
        let touched = self.conn.execute(
            "UPDATE ref_facts SET ref_tier = 'proven', certainty = 'certain',
                                  target_def_uid = ?4
             WHERE file_id = ?1 AND start_line = ?2 AND start_col = ?3",
            params![file_id.as_i64(), line, column, target_def_uid],
        )?;
        Ok(touched)
    }

    // ----- epochs & snapshots -----

    pub fn insert_epoch(
        &self,
        epoch: EpochId,
        created_at: i64,
        head_sha: &str,
        delta: (u32, u32, u32),
        errors: &[String],
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO epochs (epoch_id, created_at, head_sha, files_added, files_modified,
                                 files_removed, errors)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                epoch.as_i64(),
                created_at,
                head_sha,
                delta.0,
                delta.1,
                delta.2,
                serde_json::to_string(errors).unwrap_or_else(|_| "[]".into()),
            ],
        )?;
        Ok(())
    }

    /// Latest published epoch, if any.
    pub fn current_epoch(&self) -> StorageResult<Option<EpochId>> {
        let id: Option<i64> = self
            .conn
            .query_row("SELECT MAX(epoch_id) FROM epochs", [], |row| row.get(0))?;
        Ok(id.and_then(EpochId::from_i64))
    }

    pub fn insert_snapshot(
        &self,
        def_uid: &str,
        epoch: EpochId,
        file_path: &str,
        signature_hash: &str,
        body_hash: &str,
        range: crate::types::Range,
        tombstone: bool,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO def_snapshot_records (def_uid, epoch_id, file_path, signature_hash,
                                               body_hash, start_line, start_col, end_line,
                                               end_col, tombstone)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                def_uid,
                epoch.as_i64(),
                file_path,
                signature_hash,
                body_hash,
                range.start_line,
                range.start_column,
                range.end_line,
                range.end_column,
                tombstone,
            ],
        )?;
        Ok(())
    }

    /// Latest snapshot hashes per def_uid for a file, for change
    /// detection between epochs.
    pub fn latest_snapshot_hashes(
        &self,
        file_path: &str,
    ) -> StorageResult<Vec<(String, String, String)>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT def_uid, signature_hash, body_hash FROM def_snapshot_records s
             WHERE file_path = ?1 AND tombstone = 0
               AND epoch_id = (SELECT MAX(epoch_id) FROM def_snapshot_records
                               WHERE def_uid = s.def_uid)",
        )?;
        let rows = stmt
            .query_map(params![file_path], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
