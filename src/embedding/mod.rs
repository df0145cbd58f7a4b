//! Embedding service abstractions for AgentDB.
//!
//! This module provides the trait and implementation for turning an
//! [`ActionPattern`] into a fixed-dimension vector used for similarity
//! search.
//!
//! # Providers
//!
//! - [`FeatureHashEmbedder`] - Deterministic feature hashing over character
//!   n-grams (no model, no external state)
//!
//! Only `action`, `selector`, `value` and `url` participate. Two patterns
//! that differ only in `success`, `metadata` or `timestamp` embed
//! identically; outcome is used for filtering, not ranking.
//!
//! # Example
//!
//! ```rust
//! use agentdb::embedding::{EmbeddingService, FeatureHashEmbedder};
//! use agentdb::ActionPattern;
//!
//! let embedder = FeatureHashEmbedder::new(384, 3);
//! let a = embedder.embed(&ActionPattern::new("click").with_success(true)).unwrap();
//! let b = embedder.embed(&ActionPattern::new("click").with_success(false)).unwrap();
//! assert_eq!(a, b);
//! assert_eq!(a.len(), 384);
//! ```

mod hashing;

pub use hashing::FeatureHashEmbedder;

pub(crate) use hashing::cosine_similarity;

use crate::config::Config;
use crate::error::{AgentDBError, Result, ValidationError};
use crate::pattern::ActionPattern;
use crate::types::Embedding;

/// Embedding service trait for generating vector representations of patterns.
///
/// Implementations must be pure: the same participating field content must
/// always produce a bit-identical vector, across calls and process restarts.
/// Re-indexing during recovery relies on this.
pub trait EmbeddingService: Send + Sync {
    /// Generates an embedding for a single pattern.
    ///
    /// # Returns
    ///
    /// A vector of f32 values with length equal to `dimension()`,
    /// L2-normalized (or all zeros when every participating field is empty).
    ///
    /// # Errors
    ///
    /// Returns `AgentDBError::Embedding` if embedding generation fails.
    fn embed(&self, pattern: &ActionPattern) -> Result<Embedding>;

    /// Generates embeddings for multiple patterns, in input order.
    fn embed_batch(&self, patterns: &[ActionPattern]) -> Result<Vec<Embedding>> {
        patterns.iter().map(|p| self.embed(p)).collect()
    }

    /// Returns the dimension of embeddings produced by this service.
    fn dimension(&self) -> usize;

    /// Validates that an embedding has the correct dimension.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::DimensionMismatch` if dimensions don't match.
    fn validate_embedding(&self, embedding: &[f32]) -> Result<()> {
        let expected = self.dimension();
        let actual = embedding.len();

        if actual != expected {
            return Err(AgentDBError::Validation(
                ValidationError::dimension_mismatch(expected, actual),
            ));
        }

        Ok(())
    }
}

/// Creates an embedding service based on the configuration.
///
/// # Errors
///
/// Returns an error if the configured dimension or n-gram size is invalid.
pub fn create_embedding_service(config: &Config) -> Result<Box<dyn EmbeddingService>> {
    if config.dimension() == 0 {
        return Err(AgentDBError::embedding("dimension must be greater than 0"));
    }
    if config.ngram_size == 0 {
        return Err(AgentDBError::embedding("n-gram size must be greater than 0"));
    }
    Ok(Box::new(FeatureHashEmbedder::new(
        config.dimension(),
        config.ngram_size,
    )))
}
