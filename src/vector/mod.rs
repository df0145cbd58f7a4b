//! Vector index abstractions for similarity search.
//!
//! This module provides a trait-based abstraction over vector indexes,
//! allowing different ANN (Approximate Nearest Neighbor) backends.
//! The primary implementation uses [`hnsw_rs`] (pure Rust).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │         VectorIndex trait         │
//! └──────────┬───────────────────────┘
//!            │
//!    ┌───────┴────────┐
//!    │   HnswIndex    │  (hnsw_rs wrapper)
//!    └────────────────┘
//! ```
//!
//! The pattern catalog is the **source of truth**. The HNSW index owns only
//! vectors and pattern ids, and is rebuilt from stored embeddings whenever a
//! store is loaded.

mod hnsw;

pub use hnsw::{HnswIndex, IndexMetadata};

use std::path::Path;

use crate::error::Result;
use crate::types::PatternId;

/// Vector index trait for approximate nearest neighbor search.
///
/// Implementations must be `Send + Sync` so a snapshot can be written from
/// a blocking thread while the store keeps its handle.
pub trait VectorIndex: Send + Sync {
    /// Inserts a single vector under the given pattern id.
    ///
    /// # Errors
    ///
    /// Returns a dimension mismatch if `embedding` has the wrong length.
    fn insert(&self, id: PatternId, embedding: &[f32]) -> Result<()>;

    /// Searches for the `k` nearest neighbors to the query vector.
    ///
    /// Returns at most `k` `(id, similarity)` pairs sorted by similarity
    /// descending, ties broken by ascending id. Similarity is
    /// `1 - cosine distance` clamped to `[0, 1]`.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(PatternId, f32)>>;

    /// Returns the number of indexed vectors.
    fn len(&self) -> usize;

    /// Returns true if the index has no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persists the index to `dir` using `name` as the file prefix.
    fn save(&self, dir: &Path, name: &str) -> Result<()>;
}
