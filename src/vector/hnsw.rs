//! HNSW vector index implementation using hnsw_rs.
//!
//! Wraps `hnsw_rs::Hnsw<f32, DistCosine>` with:
//! - Pattern ids used directly as HNSW data ids (ids are dense from 0)
//! - One graph node per distinct vector; repeated vectors share the node
//! - Dimension checks on insert and search
//! - JSON metadata persistence (`.hnsw.meta`) plus the hnsw_rs graph dump
//!
//! # Thread Safety
//!
//! The `hnsw_rs::Hnsw` graph uses `parking_lot::RwLock` internally,
//! so `insert()` takes `&self`. Our bookkeeping (`IndexState`) is
//! protected by `std::sync::RwLock`.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use anndists::dist::DistCosine;
use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::HnswConfig;
use crate::error::{AgentDBError, Result, ValidationError};
use crate::types::PatternId;

use super::VectorIndex;

/// HNSW vector index backed by `hnsw_rs`.
///
/// # Persistence Strategy
///
/// Metadata (dimension, point count, parameters) is persisted to a JSON
/// `.hnsw.meta` file and the graph is dumped with `file_dump`. On load the
/// graph is rebuilt from the catalog's stored embeddings, because
/// `hnsw_rs::HnswIo::load_hnsw` ties the loaded graph's lifetime to the
/// loader, which a long-lived store cannot hold. The metadata is used to
/// cross-check the catalog.
///
/// # Repeated Vectors
///
/// Identical embeddings are common (the same action observed many times)
/// and a cluster of zero-distance points can trap the graph walk. Only the
/// first id with a given vector (its representative) is inserted into the
/// graph; later ids with the same vector are recorded as members of that
/// node and returned alongside it by every search.
pub struct HnswIndex {
    /// The underlying HNSW graph. Uses `'static` lifetime because
    /// all data is heap-owned (not memory-mapped).
    hnsw: Hnsw<'static, f32, DistCosine>,

    /// Ids present in the graph.
    state: RwLock<IndexState>,

    /// Graph parameters, written to the metadata file on save.
    config: HnswConfig,

    /// Embedding dimension (must match all inserted vectors).
    dimension: usize,
}

#[derive(Debug, Default)]
struct IndexState {
    ids: HashSet<PatternId>,
    max_id: Option<PatternId>,
    /// Vector key -> representative id (the graph data id).
    representatives: HashMap<[u8; 32], PatternId>,
    /// Representative id -> every id sharing its vector, ascending.
    members: HashMap<PatternId, Vec<PatternId>>,
}

impl IndexState {
    /// Records `id`. Returns true if its vector needs a new graph node.
    fn record(&mut self, id: PatternId, key: [u8; 32]) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        if self.max_id.is_none_or(|max| id > max) {
            self.max_id = Some(id);
        }

        match self.representatives.entry(key) {
            Entry::Occupied(slot) => {
                self.members.entry(*slot.get()).or_default().push(id);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
                self.members.insert(id, vec![id]);
                true
            }
        }
    }
}

/// Content key of a vector: blake3 over its little-endian f32 bytes.
fn vector_key(embedding: &[f32]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for x in embedding {
        hasher.update(&x.to_le_bytes());
    }
    *hasher.finalize().as_bytes()
}

/// Serializable metadata for persistence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Vector dimension.
    pub dimension: usize,
    /// Number of pattern ids in the index at save time.
    pub point_count: usize,
    /// Number of distinct vectors (graph nodes) at save time.
    #[serde(default)]
    pub distinct_count: usize,
    /// Largest pattern id in the graph, if any.
    pub max_id: Option<u64>,
    /// Parameters the graph was built with.
    pub hnsw: HnswConfig,
}

impl HnswIndex {
    /// Creates a new empty HNSW index.
    ///
    /// # Arguments
    ///
    /// * `dimension` - Expected embedding dimension (validated on insert)
    /// * `config` - HNSW tuning parameters
    pub fn new(dimension: usize, config: &HnswConfig) -> Self {
        let hnsw = Hnsw::new(
            config.max_nb_connection,
            config.max_elements,
            config.max_layer,
            config.ef_construction,
            DistCosine,
        );

        Self {
            hnsw,
            state: RwLock::new(IndexState::default()),
            config: config.clone(),
            dimension,
        }
    }

    /// Returns the vector dimension this index accepts.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns true if the given pattern id has been inserted.
    pub fn contains(&self, id: PatternId) -> bool {
        self.state
            .read()
            .ok()
            .is_some_and(|s| s.ids.contains(&id))
    }

    /// Returns the number of points in the underlying graph.
    pub fn point_count(&self) -> usize {
        self.hnsw.get_nb_point()
    }

    /// Returns the number of distinct vectors recorded.
    ///
    /// Equal to [`point_count`](Self::point_count) once every insert has
    /// reached the graph.
    pub fn distinct_len(&self) -> usize {
        self.state.read().map_or(0, |s| s.representatives.len())
    }

    fn check_dimension(&self, got: usize) -> Result<()> {
        if got != self.dimension {
            return Err(ValidationError::dimension_mismatch(self.dimension, got).into());
        }
        Ok(())
    }

    /// Inserts a pattern embedding into the index.
    ///
    /// Re-inserting an id that is already present is a no-op. A vector
    /// already in the graph only adds `id` to that node's members.
    pub fn insert_pattern(&self, id: PatternId, embedding: &[f32]) -> Result<()> {
        self.check_dimension(embedding.len())?;
        let key = vector_key(embedding);

        let mut state = self
            .state
            .write()
            .map_err(|_| AgentDBError::vector("Index state lock poisoned"))?;

        let new_node = state.record(id, key);

        // Drop the lock before calling hnsw insert (which acquires its own lock)
        drop(state);

        if new_node {
            self.hnsw.insert((embedding, id.as_index_id()));
        }

        Ok(())
    }

    /// Searches for the k nearest patterns.
    ///
    /// `ef_search` is raised to `k` when smaller.
    pub fn search_patterns(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
    ) -> Result<Vec<(PatternId, f32)>> {
        let mut hits = self.search_nodes(query, k, ef_search)?;
        hits.truncate(k);
        Ok(hits)
    }

    /// Searches for the `nodes` nearest distinct vectors and returns every
    /// pattern id stored under them.
    ///
    /// The result can hold more than `nodes` entries. Sorted by similarity
    /// descending, ties by ascending id.
    pub fn search_nodes(
        &self,
        query: &[f32],
        nodes: usize,
        ef_search: usize,
    ) -> Result<Vec<(PatternId, f32)>> {
        self.check_dimension(query.len())?;

        if nodes == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let ef = ef_search.max(nodes);
        let neighbours = self.hnsw.search(query, nodes, ef);

        let state = self
            .state
            .read()
            .map_err(|_| AgentDBError::vector("Index state lock poisoned"))?;

        let mut hits: Vec<(PatternId, f32)> = Vec::with_capacity(neighbours.len());
        for n in neighbours {
            let similarity = (1.0 - n.distance).clamp(0.0, 1.0);
            let representative = PatternId::new(n.d_id as u64);
            match state.members.get(&representative) {
                Some(ids) => hits.extend(ids.iter().map(|id| (*id, similarity))),
                None => hits.push((representative, similarity)),
            }
        }

        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        Ok(hits)
    }

    /// Builds the metadata describing the current graph.
    pub fn metadata(&self) -> IndexMetadata {
        let (point_count, distinct_count, max_id) = self
            .state
            .read()
            .map(|s| {
                (
                    s.ids.len(),
                    s.representatives.len(),
                    s.max_id.map(|id| id.as_u64()),
                )
            })
            .unwrap_or((0, 0, None));

        IndexMetadata {
            dimension: self.dimension,
            point_count,
            distinct_count,
            max_id,
            hnsw: self.config.clone(),
        }
    }

    /// Saves index metadata and the graph dump to `dir`.
    ///
    /// Creates `{dir}/{name}.hnsw.meta` and, when the graph is non-empty,
    /// the hnsw_rs dump files (`{name}.hnsw.graph`, `{name}.hnsw.data`).
    /// Dump files from an earlier save are removed first.
    pub fn save_to_dir(&self, dir: &Path, name: &str) -> Result<()> {
        fs::create_dir_all(dir)
            .map_err(|e| AgentDBError::vector(format!("Failed to create index directory: {}", e)))?;

        Self::remove_dump_files(dir, name);

        let metadata = self.metadata();
        let meta_path = dir.join(format!("{}.hnsw.meta", name));
        let json = serde_json::to_string_pretty(&metadata).map_err(|e| {
            AgentDBError::vector(format!("Failed to serialize HNSW metadata: {}", e))
        })?;
        fs::write(&meta_path, json)
            .map_err(|e| AgentDBError::vector(format!("Failed to write HNSW metadata: {}", e)))?;

        if metadata.point_count == 0 {
            return Ok(());
        }

        if let Err(e) = self.hnsw.file_dump(dir, name) {
            tracing::warn!(error = %e, "Failed to dump HNSW graph (non-fatal, rebuilt from catalog on load)");
        }

        Ok(())
    }

    /// Loads index metadata from `{dir}/{name}.hnsw.meta`.
    ///
    /// Returns `Ok(None)` when no metadata has been written yet.
    pub fn load_metadata(dir: &Path, name: &str) -> Result<Option<IndexMetadata>> {
        let meta_path = dir.join(format!("{}.hnsw.meta", name));
        if !meta_path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&meta_path)
            .map_err(|e| AgentDBError::vector(format!("Failed to read HNSW metadata: {}", e)))?;
        let metadata: IndexMetadata = serde_json::from_str(&json)
            .map_err(|e| AgentDBError::vector(format!("Failed to parse HNSW metadata: {}", e)))?;

        Ok(Some(metadata))
    }

    /// Rebuilds an index from a set of embeddings.
    ///
    /// Used when a store is loaded, to reconstruct the HNSW graph from the
    /// catalog (the source of truth).
    pub fn rebuild_from_embeddings(
        dimension: usize,
        config: &HnswConfig,
        embeddings: &[(PatternId, Vec<f32>)],
    ) -> Result<Self> {
        let index = Self::new(dimension, config);

        if embeddings.is_empty() {
            return Ok(index);
        }

        let mut state = index
            .state
            .write()
            .map_err(|_| AgentDBError::vector("Index state lock poisoned"))?;

        let mut batch: Vec<(&Vec<f32>, usize)> = Vec::with_capacity(embeddings.len());
        for (id, embedding) in embeddings {
            index.check_dimension(embedding.len())?;
            if state.record(*id, vector_key(embedding)) {
                batch.push((embedding, id.as_index_id()));
            }
        }

        drop(state);

        // Parallel bulk insert (uses rayon internally)
        index.hnsw.parallel_insert(&batch);

        Ok(index)
    }

    /// Removes the metadata and dump files for `name` from `dir`.
    pub fn remove_files(dir: &Path, name: &str) -> Result<()> {
        let meta_path = dir.join(format!("{}.hnsw.meta", name));
        if meta_path.exists() {
            fs::remove_file(&meta_path).map_err(|e| {
                AgentDBError::vector(format!("Failed to remove HNSW metadata: {}", e))
            })?;
        }
        Self::remove_dump_files(dir, name);
        Ok(())
    }

    fn remove_dump_files(dir: &Path, name: &str) {
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let file_name = entry.file_name();
                let file_str = file_name.to_string_lossy();
                let is_dump = file_str.ends_with(".hnsw.graph") || file_str.ends_with(".hnsw.data");
                if file_str.starts_with(name) && is_dump {
                    let _ = fs::remove_file(entry.path());
                }
            }
        }
    }
}

// ==========================================================================
// VectorIndex trait implementation
// ==========================================================================

impl VectorIndex for HnswIndex {
    fn insert(&self, id: PatternId, embedding: &[f32]) -> Result<()> {
        self.insert_pattern(id, embedding)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(PatternId, f32)>> {
        self.search_patterns(query, k, self.config.ef_search)
    }

    fn len(&self) -> usize {
        self.state.read().map_or(0, |s| s.ids.len())
    }

    fn save(&self, dir: &Path, name: &str) -> Result<()> {
        self.save_to_dir(dir, name)
    }
}

// ==========================================================================
// Tests
// ==========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> HnswConfig {
        HnswConfig {
            max_nb_connection: 16,
            ef_construction: 100,
            ef_search: 50,
            max_layer: 8,
            max_elements: 1000,
        }
    }

    /// Generates a deterministic unit embedding from a seed.
    /// Vectors with close seeds produce similar embeddings.
    fn make_embedding(seed: u64, dim: usize) -> Vec<f32> {
        let v: Vec<f32> = (0..dim)
            .map(|i| (seed as f32 * 0.1 + i as f32 * 0.01).sin() + 1.5)
            .collect();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.into_iter().map(|x| x / norm).collect()
    }

    #[test]
    fn test_new_index_is_empty() {
        let index = HnswIndex::new(384, &test_config());
        assert_eq!(index.len(), 0);
        assert_eq!(index.point_count(), 0);
        assert!(index.is_empty());
    }

    #[test]
    fn test_insert_and_search() {
        let dim = 8;
        let index = HnswIndex::new(dim, &test_config());

        for i in 0..10u64 {
            index
                .insert_pattern(PatternId::new(i), &make_embedding(i, dim))
                .unwrap();
        }

        assert_eq!(index.len(), 10);

        let query = make_embedding(5, dim);
        let results = index.search_patterns(&query, 3, 50).unwrap();

        assert!(!results.is_empty());
        assert!(results.len() <= 3);
        for w in results.windows(2) {
            assert!(w[0].1 >= w[1].1, "Results not sorted by similarity");
        }
        for (_, similarity) in &results {
            assert!((0.0..=1.0).contains(similarity));
        }
    }

    #[test]
    fn test_insert_idempotent() {
        let dim = 4;
        let index = HnswIndex::new(dim, &test_config());

        let embedding = make_embedding(1, dim);
        index.insert_pattern(PatternId::new(0), &embedding).unwrap();
        index.insert_pattern(PatternId::new(0), &embedding).unwrap();

        assert_eq!(index.len(), 1);
        assert!(index.contains(PatternId::new(0)));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let index = HnswIndex::new(384, &test_config());

        let result = index.insert_pattern(PatternId::new(0), &[1.0f32; 128]);
        assert!(result.unwrap_err().is_validation());
        assert!(index.is_empty());

        let result = index.search_patterns(&[1.0f32; 3], 1, 50);
        assert!(result.is_err());
    }

    #[test]
    fn test_search_k_larger_than_index() {
        let dim = 4;
        let index = HnswIndex::new(dim, &test_config());
        index
            .insert_pattern(PatternId::new(0), &make_embedding(1, dim))
            .unwrap();

        let results = index
            .search_patterns(&make_embedding(1, dim), 100, 50)
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_search_empty_index_and_zero_k() {
        let dim = 4;
        let index = HnswIndex::new(dim, &test_config());
        assert!(index
            .search_patterns(&make_embedding(1, dim), 10, 50)
            .unwrap()
            .is_empty());

        index
            .insert_pattern(PatternId::new(0), &make_embedding(1, dim))
            .unwrap();
        assert!(index
            .search_patterns(&make_embedding(1, dim), 0, 50)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_rebuild_from_embeddings() {
        let dim = 8;
        let embeddings: Vec<(PatternId, Vec<f32>)> = (0..20u64)
            .map(|i| (PatternId::new(i), make_embedding(i, dim)))
            .collect();

        let index = HnswIndex::rebuild_from_embeddings(dim, &test_config(), &embeddings).unwrap();

        assert_eq!(index.len(), 20);
        assert_eq!(index.metadata().max_id, Some(19));

        let results = index.search_patterns(&make_embedding(10, dim), 1, 50).unwrap();
        assert_eq!(results[0].0, PatternId::new(10));
    }

    #[test]
    fn test_rebuild_empty() {
        let index = HnswIndex::rebuild_from_embeddings(384, &test_config(), &[]).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_rebuild_rejects_wrong_dimension() {
        let embeddings = vec![(PatternId::new(0), vec![1.0f32; 3])];
        assert!(HnswIndex::rebuild_from_embeddings(4, &test_config(), &embeddings).is_err());
    }

    #[test]
    fn test_save_and_load_metadata_roundtrip() {
        let dim = 4;
        let index = HnswIndex::new(dim, &test_config());
        for i in 0..5u64 {
            index
                .insert_pattern(PatternId::new(i), &make_embedding(i, dim))
                .unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        index.save_to_dir(dir.path(), "patterns").unwrap();

        let metadata = HnswIndex::load_metadata(dir.path(), "patterns")
            .unwrap()
            .expect("Metadata should exist");

        assert_eq!(metadata.dimension, dim);
        assert_eq!(metadata.point_count, 5);
        assert_eq!(metadata.max_id, Some(4));
        assert_eq!(metadata.hnsw, test_config());
    }

    #[test]
    fn test_load_metadata_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(HnswIndex::load_metadata(dir.path(), "patterns")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_remove_files() {
        let dim = 4;
        let index = HnswIndex::new(dim, &test_config());
        index
            .insert_pattern(PatternId::new(0), &make_embedding(1, dim))
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        index.save_to_dir(dir.path(), "patterns").unwrap();

        let meta_path = dir.path().join("patterns.hnsw.meta");
        assert!(meta_path.exists());

        HnswIndex::remove_files(dir.path(), "patterns").unwrap();
        assert!(!meta_path.exists());
    }

    #[test]
    fn test_identical_vector_has_full_similarity() {
        let dim = 8;
        let index = HnswIndex::new(dim, &test_config());

        let embedding = make_embedding(42, dim);
        index.insert_pattern(PatternId::new(3), &embedding).unwrap();

        let results = index.search_patterns(&embedding, 1, 50).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, PatternId::new(3));
        assert!(
            results[0].1 > 0.999,
            "Expected near-one similarity for identical vectors, got {}",
            results[0].1
        );
    }

    #[test]
    fn test_repeated_vectors_share_one_node() {
        let dim = 8;
        let index = HnswIndex::new(dim, &test_config());

        let repeated = make_embedding(7, dim);
        for i in 0..5u64 {
            index.insert_pattern(PatternId::new(i), &repeated).unwrap();
        }
        index
            .insert_pattern(PatternId::new(5), &make_embedding(30, dim))
            .unwrap();

        assert_eq!(index.len(), 6);
        assert_eq!(index.distinct_len(), 2);
        assert_eq!(index.point_count(), 2);

        let metadata = index.metadata();
        assert_eq!(metadata.point_count, 6);
        assert_eq!(metadata.distinct_count, 2);
        assert_eq!(metadata.max_id, Some(5));
    }

    #[test]
    fn test_search_expands_repeated_vectors() {
        let dim = 8;
        let index = HnswIndex::new(dim, &test_config());

        let repeated = make_embedding(7, dim);
        for i in 0..4u64 {
            index.insert_pattern(PatternId::new(i), &repeated).unwrap();
        }

        let all = index.search_nodes(&repeated, 1, 50).unwrap();
        let ids: Vec<PatternId> = all.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, (0..4).map(PatternId::new).collect::<Vec<_>>());
        assert!(all.iter().all(|(_, similarity)| *similarity > 0.999));

        // k still bounds the plain search; lowest ids win the tie
        let top = index.search_patterns(&repeated, 2, 50).unwrap();
        assert_eq!(
            top.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            vec![PatternId::new(0), PatternId::new(1)]
        );
    }

    #[test]
    fn test_distinct_vector_found_after_many_repeats() {
        let dim = 64;
        let index = HnswIndex::new(dim, &test_config());

        let repeated = make_embedding(1, dim);
        for i in 0..500u64 {
            index.insert_pattern(PatternId::new(i), &repeated).unwrap();
        }
        let distinct = make_embedding(900, dim);
        index.insert_pattern(PatternId::new(500), &distinct).unwrap();

        let results = index.search_patterns(&distinct, 1, 50).unwrap();
        assert_eq!(results[0].0, PatternId::new(500));
        assert!(results[0].1 > 0.999);
    }

    #[test]
    fn test_rebuild_collapses_repeated_vectors() {
        let dim = 8;
        let embeddings: Vec<(PatternId, Vec<f32>)> = (0..50u64)
            .map(|i| (PatternId::new(i), make_embedding(i % 5, dim)))
            .collect();

        let index = HnswIndex::rebuild_from_embeddings(dim, &test_config(), &embeddings).unwrap();
        assert_eq!(index.len(), 50);
        assert_eq!(index.distinct_len(), 5);
        assert_eq!(index.point_count(), 5);

        let hits = index.search_nodes(&make_embedding(3, dim), 1, 50).unwrap();
        assert_eq!(hits.len(), 10);
        assert!(hits.iter().all(|(id, _)| id.as_u64() % 5 == 3));
    }
}
