//! Configuration types for AgentDB.
//!
//! The [`Config`] struct controls store behavior including:
//! - Embedding dimension (384, 768, or custom)
//! - Character n-gram size used by the feature embedder
//! - HNSW graph parameters
//! - Over-fetch policy for filtered similarity search
//!
//! # Example
//! ```rust
//! use agentdb::{Config, EmbeddingDimension};
//!
//! // Use defaults (384 dimensions, trigrams)
//! let config = Config::default();
//!
//! // Customize
//! let config = Config {
//!     embedding_dimension: EmbeddingDimension::D768,
//!     ngram_size: 4,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Largest dimension accepted for `EmbeddingDimension::Custom`.
pub const MAX_DIMENSION: usize = 4096;

/// Largest n-gram size accepted by the feature embedder.
pub const MAX_NGRAM_SIZE: usize = 8;

/// Store configuration options.
///
/// All fields have sensible defaults. Use struct update syntax to override
/// specific settings:
///
/// ```rust
/// use agentdb::Config;
///
/// let config = Config {
///     ngram_size: 2,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    /// Embedding vector dimension. Locked in when the first snapshot is saved.
    pub embedding_dimension: EmbeddingDimension,

    /// Character n-gram size for feature hashing.
    ///
    /// Changing this changes every embedding; a store reopened with a
    /// different value re-embeds its catalog while loading.
    /// Default: 3
    pub ngram_size: usize,

    /// HNSW graph tuning parameters.
    pub hnsw: HnswConfig,

    /// Similarity search tuning.
    pub search: SearchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // 384 keeps vectors small while leaving few bucket collisions
            // for the short strings automation actions produce
            embedding_dimension: EmbeddingDimension::D384,
            ngram_size: 3,
            hnsw: HnswConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new Config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a Config with the given embedding dimension.
    ///
    /// # Example
    /// ```rust
    /// use agentdb::{Config, EmbeddingDimension};
    ///
    /// let config = Config::with_dimension(EmbeddingDimension::Custom(128));
    /// assert_eq!(config.dimension(), 128);
    /// ```
    pub fn with_dimension(dimension: EmbeddingDimension) -> Self {
        Self {
            embedding_dimension: dimension,
            ..Default::default()
        }
    }

    /// Validates the configuration.
    ///
    /// Called automatically by `AgentDB::open()`.
    ///
    /// # Errors
    /// Returns `ValidationError` if:
    /// - Custom dimension is 0 or > 4096
    /// - `ngram_size` is 0 or > 8
    /// - HNSW or search parameters are out of range
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let EmbeddingDimension::Custom(dim) = self.embedding_dimension {
            if dim == 0 {
                return Err(ValidationError::invalid_field(
                    "embedding_dimension",
                    "custom dimension must be greater than 0",
                ));
            }
            if dim > MAX_DIMENSION {
                return Err(ValidationError::invalid_field(
                    "embedding_dimension",
                    format!("custom dimension must not exceed {}", MAX_DIMENSION),
                ));
            }
        }

        if self.ngram_size == 0 || self.ngram_size > MAX_NGRAM_SIZE {
            return Err(ValidationError::invalid_field(
                "ngram_size",
                format!("must be between 1 and {}", MAX_NGRAM_SIZE),
            ));
        }

        self.hnsw.validate()?;
        self.search.validate()?;

        Ok(())
    }

    /// Returns the embedding dimension as a numeric value.
    pub fn dimension(&self) -> usize {
        self.embedding_dimension.size()
    }
}

/// Embedding vector dimensions.
///
/// Feature hashing works with any bucket count; the named sizes are the
/// common choices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingDimension {
    /// 384 buckets (default).
    #[default]
    D384,

    /// 768 buckets, fewer collisions for long selectors and values.
    D768,

    /// Custom bucket count.
    ///
    /// Must be between 1 and 4096.
    Custom(usize),
}

impl EmbeddingDimension {
    /// Returns the numeric size of this dimension.
    ///
    /// # Example
    /// ```rust
    /// use agentdb::EmbeddingDimension;
    ///
    /// assert_eq!(EmbeddingDimension::D384.size(), 384);
    /// assert_eq!(EmbeddingDimension::D768.size(), 768);
    /// assert_eq!(EmbeddingDimension::Custom(64).size(), 64);
    /// ```
    #[inline]
    pub const fn size(&self) -> usize {
        match self {
            Self::D384 => 384,
            Self::D768 => 768,
            Self::Custom(n) => *n,
        }
    }
}

/// HNSW graph parameters passed to `hnsw_rs`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Maximum neighbours per node (the `M` parameter).
    pub max_nb_connection: usize,

    /// Candidate list size while building the graph.
    pub ef_construction: usize,

    /// Minimum candidate list size while searching.
    ///
    /// The effective value is `max(ef_search, k)`.
    pub ef_search: usize,

    /// Number of graph layers. hnsw_rs caps this at 16.
    pub max_layer: usize,

    /// Expected number of points; a sizing hint, not a hard limit.
    pub max_elements: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            max_nb_connection: 16,
            ef_construction: 200,
            ef_search: 64,
            max_layer: 16,
            max_elements: 10_000,
        }
    }
}

impl HnswConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_nb_connection < 2 {
            return Err(ValidationError::invalid_field(
                "hnsw.max_nb_connection",
                "must be at least 2",
            ));
        }
        if self.ef_construction == 0 {
            return Err(ValidationError::invalid_field(
                "hnsw.ef_construction",
                "must be greater than 0",
            ));
        }
        if self.ef_search == 0 {
            return Err(ValidationError::invalid_field(
                "hnsw.ef_search",
                "must be greater than 0",
            ));
        }
        if !(1..=16).contains(&self.max_layer) {
            return Err(ValidationError::invalid_field(
                "hnsw.max_layer",
                "must be between 1 and 16",
            ));
        }
        if self.max_elements == 0 {
            return Err(ValidationError::invalid_field(
                "hnsw.max_elements",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Post-filter search tuning.
///
/// Filters in `find_similar` run after the index returns candidates, so the
/// store asks for `k * overfetch_factor` candidates and doubles the factor
/// (up to `max_refetch_rounds` times) when filtering leaves fewer than `k`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchConfig {
    /// Initial candidate multiplier. Default: 3
    pub overfetch_factor: usize,

    /// Extra rounds with a doubled factor before returning short. Default: 3
    pub max_refetch_rounds: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            overfetch_factor: 3,
            max_refetch_rounds: 3,
        }
    }
}

impl SearchConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.overfetch_factor == 0 {
            return Err(ValidationError::invalid_field(
                "search.overfetch_factor",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}
