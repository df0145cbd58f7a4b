//! Snapshot schema definitions and versioning.
//!
//! This module defines the on-disk layout of a store directory and the
//! table structure of the redb catalog file. All table definitions are
//! compile-time constants to ensure consistency.
//!
//! # Directory Layout
//!
//! ```text
//! <dir>/
//!   LOCK                   advisory lock, held while a store is open
//!   catalog.redb           pattern catalog snapshot (this schema)
//!   patterns.hnsw.meta     HNSW index metadata (JSON)
//!   patterns.hnsw.graph    hnsw_rs graph dump
//!   patterns.hnsw.data     hnsw_rs vector dump
//! ```
//!
//! # Table Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ METADATA_TABLE                                               │
//! │   Key: &str                                                  │
//! │   Value: &[u8] (bincode)                                     │
//! │   Entries: "snapshot_header" -> SnapshotHeader               │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ PATTERNS_TABLE                                               │
//! │   Key: u64 (PatternId)                                       │
//! │   Value: &[u8] (bincode-serialized ActionPattern)           │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ EMBEDDINGS_TABLE                                             │
//! │   Key: u64 (PatternId)                                       │
//! │   Value: &[u8] (little-endian f32, dimension * 4 bytes)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use redb::TableDefinition;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingDimension;
use crate::types::{PatternId, Timestamp};

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the schema.
/// A snapshot with a different version is treated as unreadable.
pub const FORMAT_VERSION: u32 = 1;

/// Maximum length of an action label in bytes.
pub const MAX_ACTION_LENGTH: usize = 256;

/// Maximum size of `selector`, `value` or `url` in bytes (64 KB).
pub const MAX_FIELD_SIZE: usize = 64 * 1024;

/// Maximum number of metadata entries per pattern.
pub const MAX_METADATA_ENTRIES: usize = 64;

/// Maximum length of a metadata key in bytes.
pub const MAX_METADATA_KEY_LENGTH: usize = 256;

/// Maximum size of a metadata value in bytes (4 KB).
pub const MAX_METADATA_VALUE_SIZE: usize = 4 * 1024;

/// Catalog snapshot file name inside a store directory.
pub const CATALOG_FILE: &str = "catalog.redb";

/// Lock file name inside a store directory.
pub const LOCK_FILE: &str = "LOCK";

/// File prefix for the HNSW index files.
pub const INDEX_NAME: &str = "patterns";

/// Key of the snapshot header in the metadata table.
pub const HEADER_KEY: &str = "snapshot_header";

// ============================================================================
// Table Definitions
// ============================================================================

/// Metadata table for snapshot-level information.
pub const METADATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("metadata");

/// Patterns table.
///
/// Key: PatternId value
/// Value: bincode-serialized ActionPattern
pub const PATTERNS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("patterns");

/// Embeddings table.
///
/// Stored separately from patterns to keep the main table compact.
/// Key: PatternId value
/// Value: raw f32 bytes (dimension * 4 bytes)
pub const EMBEDDINGS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("embeddings");

// ============================================================================
// Snapshot Header
// ============================================================================

/// Snapshot header stored in the metadata table.
///
/// This is serialized with bincode and stored under [`HEADER_KEY`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    /// Format version for compatibility checking.
    pub format_version: u32,

    /// Embedding dimension the snapshot was written with.
    ///
    /// Once set, this cannot be changed without starting a new store.
    pub embedding_dimension: EmbeddingDimension,

    /// N-gram size the stored embeddings were computed with.
    pub ngram_size: u32,

    /// Next identifier to assign.
    pub next_id: PatternId,

    /// Number of patterns in the snapshot.
    pub pattern_count: u64,

    /// Sum of embedding times, in microseconds.
    pub embedding_time_total_micros: u64,

    /// Number of embedding-time samples.
    pub embedding_samples: u64,

    /// When the snapshot was written.
    pub saved_at: Timestamp,
}

impl SnapshotHeader {
    /// Creates a header for the current format version.
    pub fn new(embedding_dimension: EmbeddingDimension, ngram_size: usize) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            embedding_dimension,
            ngram_size: ngram_size as u32,
            next_id: PatternId::default(),
            pattern_count: 0,
            embedding_time_total_micros: 0,
            embedding_samples: 0,
            saved_at: Timestamp::now(),
        }
    }

    /// Checks if this header is compatible with the current format.
    pub fn is_compatible(&self) -> bool {
        self.format_version == FORMAT_VERSION
    }

    /// Total embedding time as a duration.
    pub fn embedding_time_total(&self) -> Duration {
        Duration::from_micros(self.embedding_time_total_micros)
    }
}

// ============================================================================
// Embedding Encoding Helpers
// ============================================================================

/// Encodes an embedding as little-endian f32 bytes.
#[inline]
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Decodes little-endian f32 bytes. Returns `None` if the length is not a
/// multiple of 4.
#[inline]
pub fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}
