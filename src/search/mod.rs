//! Similarity search types.
//!
//! [`SearchOptions`] holds the post-filters for `find_similar`;
//! [`SimilarityResult`] is one ranked hit.

mod filter;

pub use filter::SearchOptions;

use crate::pattern::ActionPattern;
use crate::types::PatternId;

/// A pattern returned by similarity search.
#[derive(Clone, Debug, PartialEq)]
pub struct SimilarityResult {
    /// Id of the matched entry.
    pub id: PatternId,

    /// The full matched pattern.
    pub pattern: ActionPattern,

    /// Cosine similarity to the query in `[0, 1]`; 1 means identical
    /// embeddings. Only meaningful for ranking.
    pub similarity: f32,
}
