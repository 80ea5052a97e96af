//! Coordinator: orchestrates discovery, extraction, resolution, and
//! epoch-atomic publication.
//!
//! The pipeline is single-writer. Parsing and extraction fan out on a
//! rayon pool; every SQL and lexical write happens on the calling
//! thread inside one transaction per reindex. A new epoch becomes
//! visible only after the lexical commit and the SQL commit both
//! succeed; any failure or cancellation in between rolls the whole
//! attempt back and leaves the previously published epoch live.

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::Settings;
use crate::discovery::{CandidateContext, ContextDiscovery, Tier1AuthorityFilter};
use crate::error::{IndexError, IndexResult, StorageError};
use crate::extract::{self, FactBundle};
use crate::ignore_rules::IgnoreRules;
use crate::lexical::{LexicalIndex, SearchResults};
use crate::parsing::SourceParser;
use crate::registry;
use crate::resolve::{ConfigResolver, ImportPathResolver};
use crate::store::{FactStore, NewContext, NewFile};
use crate::types::{ContextId, ContextTier, EpochId, FileId, ProbeStatus, RefTier};
use crate::workspace::{DotGitReader, GitReader, OsWorkingTree, WorkingTree};

/// Result of the initial indexing pass.
#[derive(Debug, Default)]
pub struct InitResult {
    pub contexts_discovered: usize,
    pub files_indexed: usize,
    pub errors: Vec<String>,
}

/// Summary of an incremental or full reindex.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub files_added: usize,
    pub files_modified: usize,
    pub files_removed: usize,
    pub files_processed: usize,
}

/// Which field set a search runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Text,
    Symbols,
    Paths,
}

/// Progress callback: (processed, total, files_by_extension, phase).
pub type ProgressFn<'a> = &'a mut dyn FnMut(usize, usize, &HashMap<String, usize>, &str);

const PHASE_DISCOVERY: &str = "discovery";
const PHASE_PARSING: &str = "parsing";
const PHASE_RESOLUTION: &str = "resolution";
const PHASE_LEXICAL: &str = "lexical";

const META_CPLIGNORE_HASH: &str = "cplignore_hash";

/// One file's worth of pipeline output.
struct ProcessedFile {
    path: String,
    context_index: usize,
    text: Option<String>,
    content_hash: String,
    size_bytes: u64,
    bundle: Option<FactBundle>,
    /// Code-probe verdict; None for files without a wired grammar.
    probe_valid: Option<bool>,
    error: Option<String>,
}

/// A candidate with compiled matchers and its eventual row id.
struct ContextSlot {
    candidate: CandidateContext,
    include: GlobSet,
    exclude: GlobSet,
    id: Option<ContextId>,
    claimed: usize,
}

/// The indexing coordinator and epoch manager.
pub struct IndexCoordinator {
    repo_root: PathBuf,
    settings: Settings,
    tree: Box<dyn WorkingTree>,
    git: Box<dyn GitReader>,
    store: FactStore,
    lexical: LexicalIndex,
    cancel: Arc<AtomicBool>,
}

impl IndexCoordinator {
    /// Open a coordinator for a repository with the default working
    /// tree, git reader, and on-disk layout under `.codeplane/`.
    pub fn new(repo_root: impl Into<PathBuf>) -> IndexResult<Self> {
        let repo_root = repo_root.into();
        let settings = Settings::load(&repo_root)
            .map_err(|e| IndexError::ConfigError {
                reason: e.to_string(),
            })?;
        let tree = Box::new(OsWorkingTree::new(repo_root.clone()));
        let git = Box::new(DotGitReader::new(repo_root.clone()));
        let store = FactStore::open(&Settings::db_path(&repo_root))?;
        let lexical = LexicalIndex::open(Settings::lexical_path(&repo_root))?;
        Ok(Self {
            repo_root,
            settings,
            tree,
            git,
            store,
            lexical,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Assemble a coordinator from explicit parts (tests, embedders).
    pub fn with_parts(
        repo_root: impl Into<PathBuf>,
        tree: Box<dyn WorkingTree>,
        git: Box<dyn GitReader>,
        db_path: &Path,
        lexical_path: &Path,
        settings: Settings,
    ) -> IndexResult<Self> {
        Ok(Self {
            repo_root: repo_root.into(),
            settings,
            tree,
            git,
            store: FactStore::open(db_path)?,
            lexical: LexicalIndex::open(lexical_path)?,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Read access to the fact store (graph queries).
    pub fn store(&self) -> &FactStore {
        &self.store
    }

    /// Shared cancellation flag; set it from another thread to abort a
    /// running reindex at the next file boundary.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Release resources. The store and lexical index close on drop;
    /// this makes the lifecycle explicit for embedders.
    pub fn close(self) {}

    // =====================================================================
    // Initialize
    // =====================================================================

    /// Discover contexts, index every file, and publish the first epoch
    /// (or another full epoch over an existing store).
    pub fn initialize(&mut self, progress: ProgressFn) -> IndexResult<InitResult> {
        self.initialize_with(false, progress)
    }

    fn initialize_with(&mut self, truncate: bool, progress: ProgressFn) -> IndexResult<InitResult> {
        self.cancel.store(false, Ordering::SeqCst);
        let mut result = InitResult::default();

        progress(0, 0, &HashMap::new(), PHASE_DISCOVERY);

        let ignore = self.load_ignore_rules();
        let discovery = ContextDiscovery::new(self.tree.as_ref()).discover_all();
        result.errors.extend(discovery.errors.iter().cloned());
        let marker_paths: HashSet<String> =
            discovery.markers.iter().map(|m| m.path.clone()).collect();

        let authority = Tier1AuthorityFilter::new(self.tree.as_ref()).apply(discovery.candidates);
        result.errors.extend(authority.warnings.iter().cloned());

        let mut slots = build_slots(authority.pending.into_iter().chain(authority.detached));

        let work_set: Vec<(String, usize)> = self
            .tree
            .list_paths()
            .into_iter()
            .filter(|p| !ignore.is_ignored(p) && !marker_paths.contains(p))
            .filter_map(|p| assign_context(&slots, &p).map(|slot| (p, slot)))
            .collect();

        for (_, slot) in &work_set {
            slots[*slot].claimed += 1;
        }

        let epoch = self.next_epoch()?;
        let by_ext = count_extensions(work_set.iter().map(|(p, _)| p.as_str()));
        let total = work_set.len();

        let processed = self.parse_and_extract(&work_set, &by_ext, total, progress)?;
        self.check_cancelled()?;

        // Everything below is one SQL transaction paired with one
        // staged lexical commit.
        self.store.begin()?;
        let outcome: IndexResult<usize> = (|| {
            if truncate {
                self.store.truncate_facts()?;
            }
            let files_indexed =
                self.write_epoch_initialize(&mut slots, processed, epoch, &mut result, progress)?;
            self.store
                .set_meta(META_CPLIGNORE_HASH, &ignore.content_hash())?;
            Ok(files_indexed)
        })();
        match outcome {
            Ok(files_indexed) => {
                result.files_indexed = files_indexed;
                result.contexts_discovered = slots.iter().filter(|s| s.id.is_some()).count();
                self.publish(epoch, (files_indexed as u32, 0, 0), &result.errors)?;
                info!(epoch = epoch.value(), files = files_indexed, "initialized");
                Ok(result)
            }
            Err(e) => {
                self.lexical.discard_staged();
                let _ = self.store.rollback();
                Err(e)
            }
        }
    }

    fn write_epoch_initialize(
        &mut self,
        slots: &mut [ContextSlot],
        processed: Vec<ProcessedFile>,
        epoch: EpochId,
        result: &mut InitResult,
        progress: ProgressFn,
    ) -> IndexResult<usize> {
        // Per-context probe aggregation: valid when any claimed code
        // file passes validation, invalid when files were probed and
        // all failed.
        let mut probes: HashMap<usize, (bool, bool)> = HashMap::new();
        for file in &processed {
            if let Some(valid) = file.probe_valid {
                let entry = probes.entry(file.context_index).or_insert((false, false));
                entry.0 = true;
                entry.1 |= valid;
            }
        }

        // Persist contexts that carry markers or claimed files.
        for (index, slot) in slots.iter_mut().enumerate() {
            if slot.claimed == 0 && slot.candidate.markers.is_empty() {
                continue;
            }
            let probe_status = match (slot.candidate.probe_status, probes.get(&index)) {
                (ProbeStatus::Detached, _) => ProbeStatus::Detached,
                (_, Some((true, true))) => ProbeStatus::Valid,
                (_, Some((true, false))) => ProbeStatus::Invalid,
                _ if slot.claimed > 0 => ProbeStatus::Valid,
                (other, _) => other,
            };
            let id = self.store.insert_context(&NewContext {
                language_family: slot.candidate.language_family,
                root_path: &slot.candidate.root_path,
                tier: slot.candidate.tier,
                markers: &slot.candidate.markers,
                include_spec: &slot.candidate.include_spec,
                exclude_spec: &slot.candidate.exclude_spec,
                probe_status,
                is_root_fallback: slot.candidate.is_root_fallback,
            })?;
            slot.id = Some(id);
        }

        let mut bundles = self.finish_bundles(&processed)?;
        let by_ext = count_extensions(processed.iter().map(|p| p.path.as_str()));
        progress(processed.len(), processed.len(), &by_ext, PHASE_RESOLUTION);

        let mut files_indexed = 0usize;
        for (i, file) in processed.iter().enumerate() {
            self.check_cancelled()?;
            let Some(context_id) = slots[file.context_index].id else {
                continue;
            };
            if let Some(error) = &file.error {
                result.errors.push(error.clone());
            }
            let bundle = bundles.remove(&file.path);
            let file_id = self.store.insert_file(&NewFile {
                path: &file.path,
                language_family: registry::family_for_path(&file.path),
                declared_module: bundle
                    .as_ref()
                    .and_then(|b| b.declared_module.as_deref()),
                context_id,
                content_hash: &file.content_hash,
                size_bytes: file.size_bytes,
                interface_hash: bundle.as_ref().map(|b| b.interface_hash.as_str()),
                last_seen_epoch: epoch,
            })?;
            files_indexed += 1;

            let symbols: Vec<String> = bundle
                .as_ref()
                .map(|b| b.defs.iter().map(|d| d.name.clone()).collect())
                .unwrap_or_default();
            if let Some(bundle) = &bundle {
                self.store.insert_bundle(file_id, context_id, bundle)?;
                for def in &bundle.defs {
                    self.store.insert_snapshot(
                        &def.def_uid,
                        epoch,
                        &file.path,
                        &extract::signature_hash(def),
                        &extract::body_hash(def, file.text.as_deref().unwrap_or("")),
                        def.range,
                        false,
                    )?;
                }
            }
            if let Some(text) = &file.text {
                self.lexical
                    .stage_file(&file.path, text, context_id, file_id, &symbols);
            }
            progress(i + 1, processed.len(), &by_ext, PHASE_LEXICAL);
        }
        Ok(files_indexed)
    }

    // =====================================================================
    // Incremental reindex
    // =====================================================================

    /// Apply a set of changed paths (or a `.cplignore` change) as one
    /// new epoch. With no ignore change and no changed paths this is a
    /// no-op.
    pub fn reindex_incremental(&mut self, changed_paths: &[String]) -> IndexResult<IndexStats> {
        self.cancel.store(false, Ordering::SeqCst);

        let ignore = self.load_ignore_rules();
        let ignore_hash = ignore.content_hash();
        let ignore_changed = self
            .store
            .get_meta(META_CPLIGNORE_HASH)?
            .is_some_and(|stored| stored != ignore_hash);

        if !ignore_changed && changed_paths.is_empty() {
            debug!("incremental reindex: nothing to do");
            return Ok(IndexStats::default());
        }

        let discovery = ContextDiscovery::new(self.tree.as_ref()).discover_all();
        let marker_paths: HashSet<String> =
            discovery.markers.iter().map(|m| m.path.clone()).collect();

        let current_set: HashSet<String> = self
            .tree
            .list_paths()
            .into_iter()
            .filter(|p| !ignore.is_ignored(p) && !marker_paths.contains(p))
            .collect();

        // Affected paths: explicit changes, plus every membership flip
        // when the ignore file changed.
        let mut affected: Vec<String> = if ignore_changed {
            let mut all: HashSet<String> = current_set.iter().cloned().collect();
            for file in self.store.graph().list_files(usize::MAX)? {
                all.insert(file.path);
            }
            all.into_iter().collect()
        } else {
            changed_paths.to_vec()
        };
        affected.sort();

        let epoch = self.next_epoch()?;
        let mut stats = IndexStats::default();

        self.store.begin()?;
        let outcome =
            self.write_epoch_incremental(&affected, &current_set, epoch, &ignore_hash, &mut stats);
        match outcome {
            Ok(errors) => {
                self.publish(
                    epoch,
                    (
                        stats.files_added as u32,
                        stats.files_modified as u32,
                        stats.files_removed as u32,
                    ),
                    &errors,
                )?;
                info!(
                    epoch = epoch.value(),
                    added = stats.files_added,
                    modified = stats.files_modified,
                    removed = stats.files_removed,
                    "incremental reindex published"
                );
                Ok(stats)
            }
            Err(e) => {
                self.lexical.discard_staged();
                let _ = self.store.rollback();
                Err(e)
            }
        }
    }

    fn write_epoch_incremental(
        &mut self,
        affected: &[String],
        current_set: &HashSet<String>,
        epoch: EpochId,
        ignore_hash: &str,
        stats: &mut IndexStats,
    ) -> IndexResult<Vec<String>> {
        let mut errors = Vec::new();
        let graph_files: HashMap<String, (FileId, String, ContextId)> = self
            .store
            .graph()
            .list_files(usize::MAX)?
            .into_iter()
            .map(|f| (f.path.clone(), (f.id, f.content_hash, f.context_id)))
            .collect();

        let mut parser = SourceParser::new();
        let timeout = Duration::from_secs(self.settings.indexing.parse_timeout_secs);
        let mut new_bundles: HashMap<String, FactBundle> = HashMap::new();
        let mut pending_writes: Vec<(String, Option<FileId>, ContextId, ProcessedFile)> =
            Vec::new();

        for path in affected {
            self.check_cancelled()?;
            let existing = graph_files.get(path);
            let present = current_set.contains(path);

            match (existing, present) {
                (None, false) => {}
                (Some((file_id, _, _)), false) => {
                    // Removed (or newly ignored): facts go, lexical doc
                    // goes, snapshots get tombstones.
                    for def in self.store.graph().list_defs_in_file(*file_id)? {
                        self.store.insert_snapshot(
                            &def.def_uid,
                            epoch,
                            path,
                            "",
                            "",
                            def.range,
                            true,
                        )?;
                    }
                    self.store.delete_file(*file_id)?;
                    self.lexical.stage_remove(path);
                    stats.files_removed += 1;
                    stats.files_processed += 1;
                }
                (existing, true) => {
                    let Some(content) = self.tree.read_file(path) else {
                        continue;
                    };
                    let content_hash = hash_bytes(&content);
                    if let Some((_, old_hash, _)) = existing {
                        if *old_hash == content_hash {
                            continue;
                        }
                    }
                    let context_id = match existing {
                        Some((_, _, context_id)) => *context_id,
                        None => match self.context_for_new_file(path)? {
                            Some(id) => id,
                            None => continue,
                        },
                    };
                    let processed =
                        process_one(&mut parser, path, content, 0, timeout);
                    if let Some(error) = &processed.error {
                        errors.push(error.clone());
                        // A bad parse must not wipe known-good facts.
                        if processed.bundle.is_none() && existing.is_some() {
                            continue;
                        }
                    }
                    if let Some(bundle) = &processed.bundle {
                        new_bundles.insert(path.clone(), bundle.clone());
                    }
                    pending_writes.push((
                        path.clone(),
                        existing.map(|(id, _, _)| *id),
                        context_id,
                        processed,
                    ));
                }
            }
        }

        // Declared modules and import resolution over the merged view:
        // previously indexed files plus this batch.
        let all_tree_paths = self.tree.list_paths();
        let config_resolver =
            ConfigResolver::discover(&all_tree_paths, |p| self.tree.read_file(p));
        for (path, bundle) in new_bundles.iter_mut() {
            if registry::is_config_augmented(bundle.language) {
                if let Some(module) = config_resolver.resolve(path, bundle.language) {
                    bundle.declared_module = Some(module);
                }
            }
        }

        let mut declared: HashMap<String, String> = HashMap::new();
        let mut known_paths: Vec<String> = Vec::new();
        for file in self.store.graph().list_files(usize::MAX)? {
            if let Some(module) = file.declared_module.clone() {
                declared.insert(file.path.clone(), module);
            }
            known_paths.push(file.path);
        }
        for (path, bundle) in &new_bundles {
            if let Some(module) = &bundle.declared_module {
                declared.insert(path.clone(), module.clone());
            }
            if !known_paths.contains(path) {
                known_paths.push(path.clone());
            }
        }
        let resolver = ImportPathResolver::new(&known_paths, &declared);
        for (path, bundle) in new_bundles.iter_mut() {
            resolve_bundle_imports(bundle, path, &resolver);
        }
        upgrade_strong_refs(&mut new_bundles);

        for (path, old_file_id, context_id, file) in &pending_writes {
            self.check_cancelled()?;
            let bundle = new_bundles.get(path);
            let previous_hashes: HashMap<String, (String, String)> = self
                .store
                .latest_snapshot_hashes(path)?
                .into_iter()
                .map(|(uid, sig, body)| (uid, (sig, body)))
                .collect();

            let new_file = NewFile {
                path,
                language_family: registry::family_for_path(path),
                declared_module: bundle.and_then(|b| b.declared_module.as_deref()),
                context_id: *context_id,
                content_hash: &file.content_hash,
                size_bytes: file.size_bytes,
                interface_hash: bundle.map(|b| b.interface_hash.as_str()),
                last_seen_epoch: epoch,
            };
            let file_id = match old_file_id {
                Some(id) => {
                    self.store.remove_file_derived(*id)?;
                    self.store.delete_file_facts(*id)?;
                    self.store.update_file(*id, &new_file)?;
                    stats.files_modified += 1;
                    *id
                }
                None => {
                    stats.files_added += 1;
                    self.store.insert_file(&new_file)?
                }
            };
            stats.files_processed += 1;

            let symbols: Vec<String> = bundle
                .map(|b| b.defs.iter().map(|d| d.name.clone()).collect())
                .unwrap_or_default();
            if let Some(bundle) = bundle {
                self.store.insert_bundle(file_id, *context_id, bundle)?;
                let mut seen: HashSet<&str> = HashSet::new();
                for def in &bundle.defs {
                    seen.insert(def.def_uid.as_str());
                    let signature_hash = extract::signature_hash(def);
                    let body_hash =
                        extract::body_hash(def, file.text.as_deref().unwrap_or(""));
                    let unchanged = previous_hashes
                        .get(&def.def_uid)
                        .is_some_and(|(s, b)| *s == signature_hash && *b == body_hash);
                    if !unchanged {
                        self.store.insert_snapshot(
                            &def.def_uid,
                            epoch,
                            path,
                            &signature_hash,
                            &body_hash,
                            def.range,
                            false,
                        )?;
                    }
                }
                // Defs that existed at the previous epoch but are gone now.
                for (uid, _) in previous_hashes.iter() {
                    if !seen.contains(uid.as_str()) {
                        self.store.insert_snapshot(
                            uid,
                            epoch,
                            path,
                            "",
                            "",
                            crate::types::Range::new(0, 0, 0, 0),
                            true,
                        )?;
                    }
                }
            }
            if let Some(text) = &file.text {
                self.lexical
                    .stage_file(path, text, *context_id, file_id, &symbols);
            }
        }

        self.store.set_meta(META_CPLIGNORE_HASH, ignore_hash)?;
        Ok(errors)
    }

    /// Membership for a file that appeared after initialization: match
    /// against stored contexts, most specific root first.
    fn context_for_new_file(&self, path: &str) -> IndexResult<Option<ContextId>> {
        let mut contexts = self.store.graph().list_contexts()?;
        contexts.sort_by_key(|c| std::cmp::Reverse(c.root_path.len()));

        let mut fallback: Option<ContextId> = None;
        for context in &contexts {
            if context.is_root_fallback {
                fallback = Some(context.id);
                continue;
            }
            if !crate::paths::is_inside(path, &context.root_path) {
                continue;
            }
            let def = registry::family_def(context.language_family);
            let rel = crate::paths::relative_to(path, &context.root_path);
            let matched = def.include_globs.iter().any(|g| {
                Glob::new(g)
                    .map(|glob| glob.compile_matcher().is_match(rel))
                    .unwrap_or(false)
            });
            if matched {
                return Ok(Some(context.id));
            }
        }
        if fallback.is_none() {
            // No fallback context was persisted at initialize time;
            // create one so the file is still owned by exactly one
            // context.
            let id = self.store.insert_context(&NewContext {
                language_family: registry::family_for_path(path)
                    .unwrap_or(crate::registry::LanguageFamily::JsonYaml),
                root_path: "",
                tier: Some(ContextTier::RootFallback),
                markers: &[],
                include_spec: &["**/*".to_string()],
                exclude_spec: &[],
                probe_status: ProbeStatus::Valid,
                is_root_fallback: true,
            })?;
            fallback = Some(id);
        }
        Ok(fallback)
    }

    // =====================================================================
    // Full reindex
    // =====================================================================

    /// Truncate all facts and the lexical index, then rebuild from the
    /// working tree as one epoch. The truncation, the rebuild, and the
    /// lexical wipe all land in the same transaction/commit pair, so a
    /// failed rebuild leaves the previous epoch intact.
    pub fn reindex_full(&mut self) -> IndexResult<IndexStats> {
        self.lexical.stage_clear_all();
        let result = self.initialize_with(true, &mut |_, _, _, _| {})?;
        Ok(IndexStats {
            files_added: result.files_indexed,
            files_modified: 0,
            files_removed: 0,
            files_processed: result.files_indexed,
        })
    }

    // =====================================================================
    // Semantic merge
    // =====================================================================

    /// Merge references produced by an external semantic indexer over
    /// the extractor's baseline. Each entry is `(line, column,
    /// target_def_uid)` for an occurrence in `file_path`; matching rows
    /// upgrade to the proven tier. Occurrences the extractor never saw
    /// are ignored. Returns how many rows were upgraded.
    pub fn merge_semantic_refs(
        &mut self,
        file_path: &str,
        entries: &[(u32, u16, String)],
    ) -> IndexResult<usize> {
        let Some(file) = self.store.graph().get_file_by_path(file_path)? else {
            return Ok(0);
        };
        let mut upgraded = 0;
        for (line, column, target) in entries {
            upgraded += self
                .store
                .upgrade_ref_semantic(file.id, *line, *column, target)?;
        }
        debug!(file_path, upgraded, "semantic references merged");
        Ok(upgraded)
    }

    // =====================================================================
    // Search
    // =====================================================================

    /// Search the lexical index, optionally filtered by context and by
    /// language family names.
    pub fn search(
        &self,
        query: &str,
        mode: SearchMode,
        context_id: Option<ContextId>,
        filter_languages: Option<&[String]>,
        limit: usize,
    ) -> IndexResult<SearchResults> {
        let context_lines = self.settings.search.context_lines;
        let fetch = match filter_languages {
            // Over-fetch so post-filtering can still fill the limit.
            Some(_) => limit.saturating_mul(4).min(500).max(limit),
            None => limit,
        };
        let mut results = match mode {
            SearchMode::Text => self.lexical.search(query, fetch, context_id, context_lines)?,
            SearchMode::Symbols => {
                self.lexical
                    .search_symbols(query, fetch, context_id, context_lines)?
            }
            SearchMode::Paths => {
                self.lexical
                    .search_path(query, fetch, context_id, context_lines)?
            }
        };

        if let Some(families) = filter_languages {
            if !families.is_empty() {
                results.results.retain(|r| {
                    registry::family_for_path(&r.path)
                        .map(|f| families.iter().any(|name| name == f.as_str()))
                        .unwrap_or(false)
                });
            }
        }
        results.results.truncate(limit);
        Ok(results)
    }

    // =====================================================================
    // Shared pipeline pieces
    // =====================================================================

    fn load_ignore_rules(&self) -> IgnoreRules {
        match self.tree.read_file(IgnoreRules::FILE_NAME) {
            Some(bytes) => match String::from_utf8(bytes) {
                Ok(text) => IgnoreRules::from_text(&text),
                Err(_) => IgnoreRules::empty(),
            },
            None => IgnoreRules::empty(),
        }
    }

    fn next_epoch(&self) -> IndexResult<EpochId> {
        Ok(self
            .store
            .current_epoch()?
            .map(|e| e.next())
            .unwrap_or(EpochId::FIRST))
    }

    fn check_cancelled(&self) -> IndexResult<()> {
        if self.cancel.load(Ordering::SeqCst) {
            Err(IndexError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// CPU-bound fan-out: read, parse, extract. Writes happen later on
    /// the calling thread.
    fn parse_and_extract(
        &self,
        work_set: &[(String, usize)],
        by_ext: &HashMap<String, usize>,
        total: usize,
        progress: ProgressFn,
    ) -> IndexResult<Vec<ProcessedFile>> {
        let timeout = Duration::from_secs(self.settings.indexing.parse_timeout_secs);
        let max_size = self.settings.indexing.max_file_size_bytes;
        let cancel = Arc::clone(&self.cancel);
        let tree = self.tree.as_ref();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.indexing.parallel_threads.max(1))
            .build()
            .map_err(|e| IndexError::General(format!("worker pool: {e}")))?;

        let mut processed: Vec<ProcessedFile> = pool.install(|| {
            work_set
                .par_iter()
                .map_init(SourceParser::new, |parser, item| {
                    let (path, slot) = item;
                    if cancel.load(Ordering::SeqCst) {
                        return None;
                    }
                    let content = tree.read_file(path)?;
                    if content.len() as u64 > max_size {
                        return Some(ProcessedFile {
                            path: path.clone(),
                            context_index: *slot,
                            text: None,
                            content_hash: hash_bytes(&content),
                            size_bytes: content.len() as u64,
                            bundle: None,
                            probe_valid: None,
                            error: None,
                        });
                    }
                    Some(process_one(parser, path, content, *slot, timeout))
                })
                .filter_map(|outcome| outcome)
                .collect()
        });
        processed.sort_by(|a, b| a.path.cmp(&b.path));

        progress(processed.len(), total, by_ext, PHASE_PARSING);
        Ok(processed)
    }

    /// Declared-module augmentation plus import resolution over the
    /// whole batch.
    fn finish_bundles(
        &self,
        processed: &[ProcessedFile],
    ) -> IndexResult<HashMap<String, FactBundle>> {
        let all_tree_paths = self.tree.list_paths();
        let config_resolver =
            ConfigResolver::discover(&all_tree_paths, |p| self.tree.read_file(p));

        let mut bundles: HashMap<String, FactBundle> = HashMap::new();
        for file in processed {
            if let Some(bundle) = &file.bundle {
                let mut bundle = bundle.clone();
                if registry::is_config_augmented(bundle.language) {
                    if let Some(module) = config_resolver.resolve(&file.path, bundle.language) {
                        bundle.declared_module = Some(module);
                    }
                }
                bundles.insert(file.path.clone(), bundle);
            }
        }

        let indexed_paths: Vec<String> = processed.iter().map(|f| f.path.clone()).collect();
        let declared: HashMap<String, String> = bundles
            .iter()
            .filter_map(|(path, b)| {
                b.declared_module
                    .as_ref()
                    .map(|m| (path.clone(), m.clone()))
            })
            .collect();
        let resolver = ImportPathResolver::new(&indexed_paths, &declared);

        let mut unresolved = 0usize;
        for (path, bundle) in bundles.iter_mut() {
            unresolved += resolve_bundle_imports(bundle, path, &resolver);
        }
        if unresolved > 0 {
            debug!(unresolved, "imports left unresolved");
        }

        upgrade_strong_refs(&mut bundles);
        Ok(bundles)
    }

    /// Atomic publish: lexical commit first, then the epoch row and the
    /// SQL commit. A lexical failure discards staging and rolls back; a
    /// SQL failure after a successful lexical commit surfaces as an
    /// epoch-publish error (the next epoch rewrites the lexical docs).
    fn publish(
        &mut self,
        epoch: EpochId,
        delta: (u32, u32, u32),
        errors: &[String],
    ) -> IndexResult<()> {
        if let Err(e) = self.lexical.commit_staged() {
            warn!(error = %e, "lexical commit failed, rolling back epoch");
            self.lexical.discard_staged();
            let _ = self.store.rollback();
            return Err(IndexError::Storage(e));
        }
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let head_sha = self.git.head_sha().unwrap_or_else(|| "unknown".to_string());
        let published = self
            .store
            .insert_epoch(epoch, created_at, &head_sha, delta, errors)
            .and_then(|_| self.store.commit());
        if let Err(e) = published {
            let _ = self.store.rollback();
            return Err(IndexError::Storage(StorageError::EpochPublish {
                epoch: epoch.value(),
                reason: e.to_string(),
            }));
        }
        Ok(())
    }
}

// =========================================================================
// Free helpers
// =========================================================================

fn hash_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{digest:x}")
}

fn count_extensions<'a>(paths: impl Iterator<Item = &'a str>) -> HashMap<String, usize> {
    let mut by_ext: HashMap<String, usize> = HashMap::new();
    for path in paths {
        let ext = crate::paths::extension(path);
        *by_ext.entry(ext).or_insert(0) += 1;
    }
    by_ext
}

/// Read/parse/extract one file. Parse failures and timeouts produce an
/// error string but still index the file lexically.
fn process_one(
    parser: &mut SourceParser,
    path: &str,
    content: Vec<u8>,
    context_index: usize,
    timeout: Duration,
) -> ProcessedFile {
    let content_hash = hash_bytes(&content);
    let size_bytes = content.len() as u64;
    let text = String::from_utf8(content).ok();

    let mut bundle = None;
    let mut error = None;
    let mut probe_valid = None;
    if let Some(text) = &text {
        let started = Instant::now();
        match parser.parse(path, text.as_bytes()) {
            Ok(parsed) => {
                if started.elapsed() > timeout {
                    error = Some(format!(
                        "parse timeout: '{path}' exceeded {}s",
                        timeout.as_secs()
                    ));
                } else {
                    probe_valid = Some(SourceParser::validate_code_file(&parsed).is_valid);
                    bundle = Some(extract::extract(&parsed, text, path));
                }
            }
            Err(IndexError::UnsupportedFileExtension { .. }) => {
                // Lexical-only file; not an error.
            }
            Err(e) => error = Some(e.to_string()),
        }
    }

    ProcessedFile {
        path: path.to_string(),
        context_index,
        text,
        content_hash,
        size_bytes,
        bundle,
        probe_valid,
        error,
    }
}

/// Compile glob matchers and sort candidates for membership: most
/// specific root first, then workspace < package < ambient < fallback.
fn build_slots(candidates: impl Iterator<Item = CandidateContext>) -> Vec<ContextSlot> {
    let mut slots: Vec<ContextSlot> = candidates
        .map(|candidate| {
            let include = compile_globs(&candidate.include_spec);
            let exclude = compile_globs(&candidate.exclude_spec);
            ContextSlot {
                candidate,
                include,
                exclude,
                id: None,
                claimed: 0,
            }
        })
        .collect();
    slots.sort_by_key(|s| {
        (
            std::cmp::Reverse(s.candidate.root_path.len()),
            tier_rank(&s.candidate),
            s.candidate.root_path.clone(),
        )
    });
    slots
}

fn tier_rank(candidate: &CandidateContext) -> u8 {
    if candidate.is_root_fallback {
        return 4;
    }
    match candidate.tier {
        Some(ContextTier::Workspace) => 1,
        Some(ContextTier::Package) => 2,
        Some(ContextTier::RootFallback) => 4,
        None => 3,
    }
}

fn compile_globs(globs: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        if let Ok(compiled) = Glob::new(glob) {
            builder.add(compiled);
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

/// First matching slot, in precedence order. Every file lands in at
/// most one context; files matching nothing (and no fallback) are
/// skipped.
fn assign_context(slots: &[ContextSlot], path: &str) -> Option<usize> {
    for (index, slot) in slots.iter().enumerate() {
        if !crate::paths::is_inside(path, &slot.candidate.root_path) {
            continue;
        }
        let rel = crate::paths::relative_to(path, &slot.candidate.root_path);
        if slot.exclude.is_match(rel) {
            continue;
        }
        if slot.include.is_match(rel) {
            return Some(index);
        }
    }
    None
}

/// Resolve every import of a bundle in place; returns how many stayed
/// unresolved.
fn resolve_bundle_imports(
    bundle: &mut FactBundle,
    path: &str,
    resolver: &ImportPathResolver,
) -> usize {
    let mut unresolved = 0;
    for import in &mut bundle.imports {
        import.resolved_path = resolver.resolve(&import.source_literal, import.kind, path);
        if import.resolved_path.is_none() {
            unresolved += 1;
        }
    }
    unresolved
}

/// Cross-file strong tier: refs whose token matches an import bound
/// name with a resolved target upgrade from unknown, and pick up the
/// target's top-level def uid when the resolved file defines one.
fn upgrade_strong_refs(bundles: &mut HashMap<String, FactBundle>) {
    // (path, top-level def name) -> def_uid
    let mut top_level: HashMap<(String, String), String> = HashMap::new();
    for (path, bundle) in bundles.iter() {
        for def in &bundle.defs {
            if !def.lexical_path.contains('.') {
                top_level.insert((path.clone(), def.name.clone()), def.def_uid.clone());
            }
        }
    }

    for bundle in bundles.values_mut() {
        let imported: Vec<(String, String, String)> = bundle
            .imports
            .iter()
            .filter_map(|import| {
                import.resolved_path.as_ref().map(|target| {
                    let bound = import
                        .alias
                        .clone()
                        .unwrap_or_else(|| import.imported_name.clone());
                    (bound, import.imported_name.clone(), target.clone())
                })
            })
            .collect();
        if imported.is_empty() {
            continue;
        }
        // Names also bound by something other than an import stay on
        // their local resolution.
        let locally_bound: HashSet<&str> = bundle
            .binds
            .iter()
            .filter(|b| b.target_kind != crate::types::BindTargetKind::Import)
            .map(|b| b.name.as_str())
            .collect();
        for r in &mut bundle.refs {
            let upgradable = r.target_def_uid.is_none()
                && matches!(r.tier, RefTier::Unknown | RefTier::Proven)
                && !locally_bound.contains(r.token_text.as_str());
            if !upgradable {
                continue;
            }
            if let Some((_, name, target)) =
                imported.iter().find(|(bound, _, _)| *bound == r.token_text)
            {
                r.tier = RefTier::Strong;
                if let Some(uid) = top_level.get(&(target.clone(), name.clone())) {
                    r.target_def_uid = Some(uid.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_rank_ordering() {
        let base = CandidateContext {
            language_family: crate::registry::LanguageFamily::Python,
            root_path: String::new(),
            tier: Some(ContextTier::Workspace),
            markers: vec![],
            include_spec: vec![],
            exclude_spec: vec![],
            probe_status: ProbeStatus::Pending,
            is_root_fallback: false,
        };
        let workspace = base.clone();
        let ambient = CandidateContext {
            tier: None,
            ..base.clone()
        };
        let fallback = CandidateContext {
            is_root_fallback: true,
            tier: Some(ContextTier::RootFallback),
            ..base
        };
        assert!(tier_rank(&workspace) < tier_rank(&ambient));
        assert!(tier_rank(&ambient) < tier_rank(&fallback));
    }

    #[test]
    fn test_assign_context_specificity() {
        let make = |root: &str, tier: Option<ContextTier>, globs: &[&str], fallback: bool| {
            CandidateContext {
                language_family: crate::registry::LanguageFamily::Python,
                root_path: root.to_string(),
                tier,
                markers: vec!["m".to_string()],
                include_spec: globs.iter().map(|s| s.to_string()).collect(),
                exclude_spec: vec![],
                probe_status: ProbeStatus::Pending,
                is_root_fallback: fallback,
            }
        };
        let slots = build_slots(
            vec![
                make("", Some(ContextTier::Workspace), &["**/*.py"], false),
                make("pkg", Some(ContextTier::Package), &["**/*.py"], false),
                make("", Some(ContextTier::RootFallback), &["**/*"], true),
            ]
            .into_iter(),
        );

        // Nested package root wins over the workspace root.
        let nested = assign_context(&slots, "pkg/sub/a.py").unwrap();
        assert_eq!(slots[nested].candidate.root_path, "pkg");

        let top = assign_context(&slots, "top.py").unwrap();
        assert_eq!(slots[top].candidate.root_path, "");
        assert!(!slots[top].candidate.is_root_fallback);

        // Unmatched extensions land in the fallback.
        let other = assign_context(&slots, "notes.rst").unwrap();
        assert!(slots[other].candidate.is_root_fallback);
    }

    #[test]
    fn test_hash_bytes_stable() {
        assert_eq!(hash_bytes(b"abc"), hash_bytes(b"abc"));
        assert_ne!(hash_bytes(b"abc"), hash_bytes(b"abd"));
        assert_eq!(hash_bytes(b"abc").len(), 64);
    }

    #[test]
    fn test_count_extensions() {
        let by_ext = count_extensions(["a.py", "b.py", "c.rs", "Makefile"].into_iter());
        assert_eq!(by_ext.get("py"), Some(&2));
        assert_eq!(by_ext.get("rs"), Some(&1));
        assert_eq!(by_ext.get(""), Some(&1));
    }
}
