//! AgentDB main struct and lifecycle operations.
//!
//! The [`AgentDB`] struct is the primary interface for interacting with
//! the pattern store. It provides methods for:
//!
//! - Opening, saving and closing a store directory
//! - Recording action patterns
//! - Similarity search with post-filters
//! - Metadata queries, statistics and success-rate learning
//! - Training-data export and import
//!
//! # Quick Start
//!
//! ```rust
//! use agentdb::{ActionPattern, AgentDB, Config, SearchOptions};
//!
//! # fn main() -> agentdb::Result<()> {
//! # let dir = tempfile::tempdir().unwrap();
//! let mut db = AgentDB::open(dir.path().join("memory"), Config::default())?;
//!
//! db.store_action(
//!     ActionPattern::new("fill_form")
//!         .with_selector("input[name=email]")
//!         .with_url("https://x.com/signup")
//!         .with_success(true),
//! )?;
//!
//! let query = ActionPattern::new("fill_form").with_selector("input[name=email]");
//! let hits = db.find_similar(&query, 3, &SearchOptions::successful())?;
//! assert_eq!(hits.len(), 1);
//!
//! db.save()?;
//! db.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Ownership
//!
//! One `AgentDB` owns its directory for its whole life: it holds an
//! exclusive lock on `<dir>/LOCK`, and a second open of the same directory
//! fails with `StorageError::DatabaseLocked`. Writes take `&mut self`, so
//! sharing a store across threads needs external synchronization
//! (e.g. `Arc<Mutex<AgentDB>>`).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::catalog::PatternCatalog;
use crate::config::Config;
use crate::embedding::{cosine_similarity, create_embedding_service, EmbeddingService};
use crate::error::{AgentDBError, ImportError, Result, StorageError, ValidationError};
use crate::pattern::{validate_pattern, ActionPattern, StoredEntry};
use crate::search::{SearchOptions, SimilarityResult};
use crate::stats::{Statistics, StatisticsAggregator, TopPattern};
use crate::storage::schema::INDEX_NAME;
use crate::storage::{DirectoryLock, RedbStorage, Snapshot, SnapshotHeader, StorageEngine};
use crate::training::TrainingData;
use crate::types::{PatternId, Timestamp};
use crate::vector::{HnswIndex, VectorIndex};

/// Minimum similarity a stored embedding must get when probing the rebuilt
/// index with itself.
const SELF_MATCH_THRESHOLD: f32 = 0.999;

/// Search breadth used for the load-time self-retrieval check.
const SELF_CHECK_EF: usize = 200;

/// The main AgentDB store handle.
///
/// This is the primary interface for all store operations. Create an
/// instance with [`AgentDB::open()`] and release it with [`AgentDB::close()`].
///
/// # Ownership
///
/// `AgentDB` exclusively owns its catalog, index and statistics. When you
/// call `close()`, the store is consumed and cannot be used afterward.
/// Unsaved patterns are discarded; call [`save()`](AgentDB::save) first to
/// keep them.
pub struct AgentDB {
    /// Store directory.
    path: PathBuf,

    /// Configuration used to open this store.
    config: Config,

    /// Feature embedder.
    embedding: Box<dyn EmbeddingService>,

    /// HNSW index; shared with in-flight async saves.
    index: Arc<HnswIndex>,

    /// Source of truth for stored patterns.
    catalog: PatternCatalog,

    /// Incrementally maintained counters.
    stats: StatisticsAggregator,

    /// Identifier the next stored pattern receives.
    next_id: PatternId,

    /// Snapshot backend (redb).
    storage: Arc<dyn StorageEngine>,

    /// Held for the store's lifetime. Declared last so it is released after
    /// the storage handle is dropped.
    _lock: DirectoryLock,
}

impl std::fmt::Debug for AgentDB {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentDB")
            .field("path", &self.path)
            .field("config", &self.config)
            .field("patterns", &self.catalog.len())
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

/// In-memory state produced by a successful load.
struct LoadedState {
    catalog: PatternCatalog,
    index: HnswIndex,
    stats: StatisticsAggregator,
    next_id: PatternId,
}

impl LoadedState {
    fn empty(config: &Config) -> Self {
        Self {
            catalog: PatternCatalog::new(),
            index: HnswIndex::new(config.dimension(), &config.hnsw),
            stats: StatisticsAggregator::new(),
            next_id: PatternId::default(),
        }
    }

    /// Rebuilds catalog, index and statistics from a snapshot, then checks
    /// that the index answers for what the catalog holds.
    #[instrument(skip_all, fields(patterns = snapshot.entries.len()))]
    fn restore(
        dir: &Path,
        config: &Config,
        embedder: &dyn EmbeddingService,
        snapshot: Snapshot,
    ) -> Result<Self> {
        let Snapshot {
            header,
            mut entries,
        } = snapshot;
        let dimension = config.dimension();

        let reembed_all = header.ngram_size as usize != config.ngram_size;
        if reembed_all {
            info!(
                stored = header.ngram_size,
                configured = config.ngram_size,
                "N-gram size changed, re-embedding catalog"
            );
        }

        let mut recomputed = 0usize;
        for entry in entries.iter_mut() {
            if reembed_all || entry.embedding.len() != dimension {
                entry.embedding = embedder.embed(&entry.pattern)?;
                recomputed += 1;
            }
        }
        if recomputed > 0 && !reembed_all {
            warn!(recomputed, "Recomputed missing or malformed embeddings");
        }

        match HnswIndex::load_metadata(dir, INDEX_NAME) {
            Ok(Some(meta)) if meta.point_count != entries.len() => {
                warn!(
                    index_points = meta.point_count,
                    catalog_patterns = entries.len(),
                    "Index metadata out of sync with catalog"
                );
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Index metadata unreadable"),
        }

        let vectors: Vec<(PatternId, Vec<f32>)> = entries
            .iter()
            .map(|e| (e.id, e.embedding.clone()))
            .collect();
        let mut index = HnswIndex::rebuild_from_embeddings(dimension, &config.hnsw, &vectors)?;
        let catalog = PatternCatalog::from_entries(entries);

        // The catalog decoded cleanly, so a failed check first costs a rebuild.
        // Counts that still disagree fail the load; a retrieval miss only warns.
        if let Err(e) = verify_index(&index, &catalog) {
            warn!(error = %e, "Rebuilt index failed verification, rebuilding again");
            index = HnswIndex::rebuild_from_embeddings(dimension, &config.hnsw, &vectors)?;
            verify_counts(&index, &catalog)?;
            if let Err(e) = check_self_retrieval(&index, &catalog) {
                warn!(error = %e, "Self-retrieval check still failing, keeping rebuilt index");
            }
        }

        let stats = StatisticsAggregator::from_catalog(&catalog)
            .with_embedding_time(header.embedding_time_total(), header.embedding_samples);

        Ok(Self {
            catalog,
            index,
            stats,
            next_id: header.next_id,
        })
    }
}

/// Checks that the index holds exactly the catalog's entries and that the
/// first and last entries retrieve themselves.
fn verify_index(index: &HnswIndex, catalog: &PatternCatalog) -> Result<()> {
    verify_counts(index, catalog)?;
    check_self_retrieval(index, catalog)
}

/// Checks that every catalog entry has exactly one id in the index and that
/// each distinct vector reached the graph.
fn verify_counts(index: &HnswIndex, catalog: &PatternCatalog) -> Result<()> {
    if index.len() != catalog.len() || index.point_count() != index.distinct_len() {
        return Err(AgentDBError::vector(format!(
            "Index holds {} ids in {} points ({} distinct), catalog holds {} patterns",
            index.len(),
            index.point_count(),
            index.distinct_len(),
            catalog.len()
        )));
    }
    Ok(())
}

/// Searches with the first and last stored embeddings and expects each to
/// come back with full similarity.
fn check_self_retrieval(index: &HnswIndex, catalog: &PatternCatalog) -> Result<()> {
    for entry in [catalog.first(), catalog.last()].into_iter().flatten() {
        let found = index
            .search_nodes(&entry.embedding, 1, index.len().min(SELF_CHECK_EF))?
            .into_iter()
            .find(|(id, _)| *id == entry.id);
        match found {
            Some((_, similarity)) if similarity >= SELF_MATCH_THRESHOLD => {}
            _ => {
                return Err(AgentDBError::vector(format!(
                    "Index did not retrieve pattern {} from its own embedding",
                    entry.id
                )));
            }
        }
    }

    Ok(())
}

/// A snapshot captured from a store, ready to be written.
///
/// Owns everything it needs so it can move to a blocking thread.
struct PendingSave {
    dir: PathBuf,
    storage: Arc<dyn StorageEngine>,
    index: Arc<HnswIndex>,
    snapshot: Snapshot,
}

impl PendingSave {
    /// Writes the index files, then replaces the catalog snapshot.
    fn write(self) -> Result<()> {
        self.index.save(&self.dir, INDEX_NAME)?;
        self.storage.save(&self.snapshot)?;

        info!(
            patterns = self.snapshot.entries.len(),
            next_id = self.snapshot.header.next_id.as_u64(),
            "AgentDB saved"
        );
        Ok(())
    }
}

impl AgentDB {
    /// Opens or creates a store in the given directory.
    ///
    /// The directory is created if needed. If it holds a saved snapshot, the
    /// catalog is loaded and the HNSW index rebuilt from the stored
    /// embeddings, so search works immediately.
    ///
    /// An unreadable snapshot is not an error: it is logged, moved aside as
    /// `catalog.redb.corrupt-<millis>`, and the store starts empty. A rebuilt
    /// index that fails its checks is rebuilt once more. The snapshot is only
    /// set aside if the second index still disagrees with the catalog size; a
    /// failed self-retrieval check is logged and the index kept.
    ///
    /// # Arguments
    ///
    /// * `path` - Store directory (created if it doesn't exist)
    /// * `config` - Configuration options for the store
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration is invalid (see [`Config::validate`])
    /// - The directory cannot be created
    /// - Another store has the directory open (`StorageError::DatabaseLocked`)
    /// - The saved snapshot uses a different embedding dimension
    ///
    /// # Example
    ///
    /// ```rust
    /// use agentdb::{AgentDB, Config, EmbeddingDimension};
    ///
    /// # fn main() -> agentdb::Result<()> {
    /// # let dir = tempfile::tempdir().unwrap();
    /// let db = AgentDB::open(dir.path(), Config {
    ///     embedding_dimension: EmbeddingDimension::D768,
    ///     ..Default::default()
    /// })?;
    /// assert_eq!(db.dimension(), 768);
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        // Validate configuration first
        config.validate().map_err(AgentDBError::from)?;

        let dir = path.as_ref().to_path_buf();
        info!("Opening AgentDB");

        fs::create_dir_all(&dir)?;
        let lock = DirectoryLock::acquire(&dir)?;

        let embedding = create_embedding_service(&config)?;
        let mut storage = match RedbStorage::open(&dir) {
            Ok(storage) => storage,
            Err(e @ AgentDBError::Storage(StorageError::DatabaseLocked)) => return Err(e),
            Err(e) => {
                warn!(error = %e, "Catalog file unreadable, starting empty");
                Self::discard_snapshot(&dir)?;
                RedbStorage::open(&dir)?
            }
        };

        let snapshot = match storage.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Snapshot unreadable, starting empty");
                storage = Self::replace_catalog(&dir, storage)?;
                None
            }
        };

        let state = match snapshot {
            None => LoadedState::empty(&config),
            Some(snapshot) => {
                let persisted = snapshot.header.embedding_dimension.size();
                if persisted != config.dimension() {
                    warn!(
                        expected = config.dimension(),
                        found = persisted,
                        "Embedding dimension mismatch"
                    );
                    return Err(
                        ValidationError::dimension_mismatch(config.dimension(), persisted).into(),
                    );
                }

                match LoadedState::restore(&dir, &config, embedding.as_ref(), snapshot) {
                    Ok(state) => state,
                    Err(e) => {
                        warn!(error = %e, "Snapshot could not be restored, starting empty");
                        storage = Self::replace_catalog(&dir, storage)?;
                        LoadedState::empty(&config)
                    }
                }
            }
        };

        info!(
            dimension = config.dimension(),
            patterns = state.catalog.len(),
            next_id = state.next_id.as_u64(),
            "AgentDB opened successfully"
        );

        Ok(Self {
            path: dir,
            config,
            embedding,
            index: Arc::new(state.index),
            catalog: state.catalog,
            stats: state.stats,
            next_id: state.next_id,
            storage: Arc::new(storage),
            _lock: lock,
        })
    }

    /// Opens a store on tokio's blocking pool.
    ///
    /// Same semantics as [`open()`](AgentDB::open).
    pub async fn open_async(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || Self::open(path, config))
            .await
            .map_err(|e| AgentDBError::Task(e.to_string()))?
    }

    /// Closes the catalog, sets the snapshot aside, and opens a fresh one.
    fn replace_catalog(dir: &Path, storage: RedbStorage) -> Result<RedbStorage> {
        drop(storage);
        Self::discard_snapshot(dir)?;
        RedbStorage::open(dir)
    }

    /// Quarantines the catalog file and removes the index files saved with it.
    fn discard_snapshot(dir: &Path) -> Result<()> {
        RedbStorage::quarantine(dir)?;
        if let Err(e) = HnswIndex::remove_files(dir, INDEX_NAME) {
            warn!(error = %e, "Failed to remove stale index files");
        }
        Ok(())
    }

    /// Closes the store and releases the directory lock.
    ///
    /// This method consumes the `AgentDB` instance, ensuring it cannot
    /// be used after closing. It does **not** save: patterns stored since
    /// the last [`save()`](AgentDB::save) are discarded.
    ///
    /// # Example
    ///
    /// ```rust
    /// use agentdb::{AgentDB, Config};
    ///
    /// # fn main() -> agentdb::Result<()> {
    /// # let dir = tempfile::tempdir().unwrap();
    /// let db = AgentDB::open(dir.path(), Config::default())?;
    /// db.close()?;  // db is consumed here
    /// // db.len() // Compile error: db was moved
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn close(self) -> Result<()> {
        info!(patterns = self.catalog.len(), "Closing AgentDB");
        drop(self);
        Ok(())
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Writes the index files and the catalog snapshot to the store
    /// directory.
    ///
    /// The catalog is replaced in one redb transaction: after a failed save
    /// the previous snapshot is still intact. Saving an empty store writes a
    /// valid empty snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the index files or the catalog cannot be written.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn save(&self) -> Result<()> {
        self.pending_save().write()
    }

    /// Saves on tokio's blocking pool.
    ///
    /// The snapshot is captured before this future first yields, so it
    /// reflects the store exactly as it was when `save_async` was called.
    pub async fn save_async(&self) -> Result<()> {
        let pending = self.pending_save();
        tokio::task::spawn_blocking(move || pending.write())
            .await
            .map_err(|e| AgentDBError::Task(e.to_string()))?
    }

    fn pending_save(&self) -> PendingSave {
        let mut header = SnapshotHeader::new(self.config.embedding_dimension, self.config.ngram_size);
        header.next_id = self.next_id;
        header.pattern_count = self.catalog.len() as u64;
        header.embedding_time_total_micros = self.stats.embedding_time_total().as_micros() as u64;
        header.embedding_samples = self.stats.embedding_samples();

        PendingSave {
            dir: self.path.clone(),
            storage: Arc::clone(&self.storage),
            index: Arc::clone(&self.index),
            snapshot: Snapshot {
                header,
                entries: self.catalog.all().cloned().collect(),
            },
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Records an action pattern and returns its new id.
    ///
    /// The pattern is embedded, given the next id, inserted into the index
    /// and the catalog, and counted in the statistics, all before returning.
    /// A missing `timestamp` is set to the current time.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if the pattern is invalid (empty action,
    /// oversized fields or metadata). The store is unchanged on error.
    pub fn store_action(&mut self, pattern: ActionPattern) -> Result<PatternId> {
        validate_pattern(&pattern)?;
        self.store_validated(pattern)
    }

    /// Records several patterns, returning their ids in input order.
    ///
    /// All patterns are validated before any is stored.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError`; nothing is stored in that case.
    pub fn store_actions(
        &mut self,
        patterns: impl IntoIterator<Item = ActionPattern>,
    ) -> Result<Vec<PatternId>> {
        let patterns: Vec<ActionPattern> = patterns.into_iter().collect();
        for pattern in &patterns {
            validate_pattern(pattern)?;
        }

        patterns
            .into_iter()
            .map(|pattern| self.store_validated(pattern))
            .collect()
    }

    fn store_validated(&mut self, mut pattern: ActionPattern) -> Result<PatternId> {
        if pattern.timestamp.is_none() {
            pattern.timestamp = Some(Timestamp::now());
        }

        let started = Instant::now();
        let embedding = self.embedding.embed(&pattern)?;
        let elapsed = started.elapsed();

        self.embedding.validate_embedding(&embedding)?;

        let id = self.next_id;
        self.index.insert(id, &embedding)?;

        self.next_id = id.next();
        self.stats.record(&pattern);
        self.stats.record_embedding_time(elapsed);

        debug!(id = %id, action = %pattern.action, "Stored action pattern");

        self.catalog.put(StoredEntry {
            id,
            pattern,
            embedding,
        });

        Ok(id)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Finds up to `k` stored patterns most similar to `query`.
    ///
    /// Results are sorted by descending similarity, ties by ascending id.
    /// Filters in `options` are applied after the index returns candidates:
    /// the store fetches the `k * overfetch_factor` nearest distinct vectors
    /// (every pattern sharing one of them is a candidate) and, while fewer
    /// than `k` survive and the index holds more, doubles the factor up to
    /// `max_refetch_rounds` times. Fewer than `k` results may be returned.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if `query` is invalid.
    pub fn find_similar(
        &self,
        query: &ActionPattern,
        k: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SimilarityResult>> {
        validate_pattern(query)?;

        if k == 0 || self.catalog.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedding.embed(query)?;
        // Repeated vectors share a graph node, so fetch counts distinct vectors
        let total = self.index.distinct_len();
        let mut factor = self.config.search.overfetch_factor;
        let mut rounds = 0usize;

        loop {
            let fetch = k.saturating_mul(factor).min(total);
            let ef = self.config.hnsw.ef_search.max(fetch);
            let candidates = self.index.search_nodes(&query_embedding, fetch, ef)?;
            let fetched = candidates.len();

            // Exact similarity from stored vectors; the index only nominates
            let mut kept: Vec<(&StoredEntry, f32)> = candidates
                .into_iter()
                .filter_map(|(id, _)| self.catalog.get(id))
                .filter(|entry| options.matches(&entry.pattern))
                .map(|entry| (entry, cosine_similarity(&query_embedding, &entry.embedding)))
                .collect();

            let exhausted = fetch >= total;
            if kept.len() >= k || exhausted || rounds >= self.config.search.max_refetch_rounds {
                kept.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.id.cmp(&b.0.id)));
                kept.truncate(k);

                debug!(k, fetched, kept = kept.len(), rounds, "Similarity search complete");

                return Ok(kept
                    .into_iter()
                    .map(|(entry, similarity)| SimilarityResult {
                        id: entry.id,
                        pattern: entry.pattern.clone(),
                        similarity,
                    })
                    .collect());
            }

            factor = factor.saturating_mul(2);
            rounds += 1;
        }
    }

    /// Returns every pattern whose metadata contains all `(key, value)`
    /// pairs of `filter`, in id order.
    ///
    /// Patterns without metadata never match a non-empty filter. An empty
    /// filter returns every pattern.
    pub fn query_by_metadata(&self, filter: &BTreeMap<String, String>) -> Vec<ActionPattern> {
        self.catalog.by_metadata(filter)
    }

    /// Looks up a stored entry by id.
    pub fn get_pattern(&self, id: PatternId) -> Option<&StoredEntry> {
        self.catalog.get(id)
    }

    /// Returns aggregate statistics.
    pub fn get_statistics(&self) -> Statistics {
        self.stats.statistics()
    }

    /// Returns the `n` most frequent `(action, selector)` groups.
    ///
    /// Sorted by count descending; equal counts keep first-seen order.
    pub fn get_top_patterns(&self, n: usize) -> Vec<TopPattern> {
        self.stats.top_patterns(n)
    }

    /// Success rate among patterns with the given action label, or `None`
    /// if no such pattern was stored.
    pub fn success_rate_for(&self, action: &str) -> Option<f64> {
        self.stats.success_rate_for(action)
    }

    // =========================================================================
    // Training data
    // =========================================================================

    /// Collects every stored pattern, in id order, into a training document.
    pub fn training_data(&self) -> TrainingData {
        TrainingData::new(self.catalog.all().map(|e| e.pattern.clone()).collect())
    }

    /// Exports every stored pattern as a JSON training document.
    ///
    /// Ids and embeddings are not exported.
    pub fn export_training_data(&self) -> Result<String> {
        Ok(self.training_data().to_json()?)
    }

    /// Imports a JSON training document, storing each pattern as a new
    /// entry with a fresh id and embedding.
    ///
    /// # Errors
    ///
    /// Returns an `ImportError` if the document is malformed, has an
    /// unsupported version, or contains an invalid pattern. The store is
    /// unchanged on error.
    #[instrument(skip(self, json), fields(bytes = json.len()))]
    pub fn import_training_data(&mut self, json: &str) -> Result<Vec<PatternId>> {
        let document = TrainingData::from_json(json)?;
        self.import_document(document)
    }

    /// Imports an already-parsed training document.
    ///
    /// # Errors
    ///
    /// Same as [`import_training_data`](AgentDB::import_training_data),
    /// except parsing.
    pub fn import_document(&mut self, document: TrainingData) -> Result<Vec<PatternId>> {
        document.check_version()?;

        for (index, pattern) in document.patterns.iter().enumerate() {
            validate_pattern(pattern)
                .map_err(|source| ImportError::InvalidPattern { index, source })?;
        }

        let ids = document
            .patterns
            .into_iter()
            .map(|pattern| self.store_validated(pattern))
            .collect::<Result<Vec<_>>>()?;

        info!(imported = ids.len(), "Imported training data");
        Ok(ids)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of stored patterns.
    #[inline]
    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    /// Returns true if no pattern is stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    /// Identifier the next stored pattern will receive.
    #[inline]
    pub fn next_id(&self) -> PatternId {
        self.next_id
    }

    /// Embedding dimension of this store.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.config.dimension()
    }

    /// Returns a reference to the store configuration.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Store directory.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
