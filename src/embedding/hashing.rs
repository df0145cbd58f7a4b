//! Feature-hashing embedder.
//!
//! Each participating field contributes:
//! - one whole-value feature (weight `2.0 × field weight`), an exact-match signal
//! - one feature per padded character n-gram (`^value$`, weight `1.0 × field weight`)
//!
//! Every feature is prefixed with its field tag and a unit separator before
//! hashing, so `"email"` in a selector and `"email"` in a URL land in
//! unrelated buckets and text never bleeds across field boundaries. Buckets
//! come from blake3, which is stable across processes, platforms and
//! releases (unlike `DefaultHasher`).
//!
//! Weights are non-negative, so the cosine similarity of two embeddings is
//! always in `[0, 1]`.

use crate::error::Result;
use crate::pattern::ActionPattern;
use crate::types::Embedding;

use super::EmbeddingService;

/// Separates the field tag from the feature text inside the hash input.
const FIELD_SEPARATOR: u8 = 0x1f;

/// Start-of-value marker for n-gram padding.
const PAD_START: char = '^';

/// End-of-value marker for n-gram padding.
const PAD_END: char = '$';

/// Multiplier applied to the whole-value feature of each field.
const WHOLE_VALUE_WEIGHT: f32 = 2.0;

/// A participating field: hash namespace plus relative weight.
struct Field {
    tag: &'static str,
    weight: f32,
}

const ACTION: Field = Field {
    tag: "action",
    weight: 1.0,
};
const SELECTOR: Field = Field {
    tag: "selector",
    weight: 1.0,
};
// Typed values vary run to run (emails, names), so they count for less
// than where the action happened.
const VALUE: Field = Field {
    tag: "value",
    weight: 0.5,
};
const URL: Field = Field {
    tag: "url",
    weight: 1.0,
};

/// Deterministic feature-hashing embedder.
///
/// # Example
///
/// ```rust
/// use agentdb::embedding::{EmbeddingService, FeatureHashEmbedder};
/// use agentdb::ActionPattern;
///
/// let embedder = FeatureHashEmbedder::new(128, 3);
/// let v = embedder.embed(&ActionPattern::new("navigate").with_url("https://a.test")).unwrap();
/// let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
/// assert!((norm - 1.0).abs() < 1e-5);
/// ```
#[derive(Clone, Debug)]
pub struct FeatureHashEmbedder {
    dimension: usize,
    ngram_size: usize,
}

impl FeatureHashEmbedder {
    /// Creates an embedder producing `dimension`-long vectors from
    /// `ngram_size`-character n-grams.
    ///
    /// # Panics
    ///
    /// Panics if `dimension` or `ngram_size` is zero. `Config::validate`
    /// rules both out for stores.
    pub fn new(dimension: usize, ngram_size: usize) -> Self {
        assert!(dimension > 0, "embedding dimension must be non-zero");
        assert!(ngram_size > 0, "n-gram size must be non-zero");
        Self {
            dimension,
            ngram_size,
        }
    }

    /// Returns the configured n-gram size.
    pub fn ngram_size(&self) -> usize {
        self.ngram_size
    }

    /// Computes the embedding. Infallible; the trait method wraps this.
    pub fn embed_pattern(&self, pattern: &ActionPattern) -> Embedding {
        let mut vector = vec![0.0f32; self.dimension];

        self.add_field(&mut vector, &ACTION, Some(pattern.action.as_str()));
        self.add_field(&mut vector, &SELECTOR, pattern.selector.as_deref());
        self.add_field(&mut vector, &VALUE, pattern.value.as_deref());
        self.add_field(&mut vector, &URL, pattern.url.as_deref());

        l2_normalize(&mut vector);
        vector
    }

    fn add_field(&self, vector: &mut [f32], field: &Field, text: Option<&str>) {
        let text = match text {
            Some(t) if !t.is_empty() => t,
            _ => return,
        };

        let whole = self.bucket(field.tag, text);
        vector[whole] += field.weight * WHOLE_VALUE_WEIGHT;

        let padded: Vec<char> = std::iter::once(PAD_START)
            .chain(text.chars())
            .chain(std::iter::once(PAD_END))
            .collect();

        let mut gram = String::with_capacity(self.ngram_size * 4);
        if padded.len() <= self.ngram_size {
            gram.extend(padded.iter());
            let idx = self.bucket(field.tag, &gram);
            vector[idx] += field.weight;
            return;
        }

        for window in padded.windows(self.ngram_size) {
            gram.clear();
            gram.extend(window.iter());
            let idx = self.bucket(field.tag, &gram);
            vector[idx] += field.weight;
        }
    }

    fn bucket(&self, tag: &str, feature: &str) -> usize {
        let mut hasher = blake3::Hasher::new();
        hasher.update(tag.as_bytes());
        hasher.update(&[FIELD_SEPARATOR]);
        hasher.update(feature.as_bytes());
        let hash = hasher.finalize();

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        (u64::from_le_bytes(bytes) % self.dimension as u64) as usize
    }
}

impl EmbeddingService for FeatureHashEmbedder {
    fn embed(&self, pattern: &ActionPattern) -> Result<Embedding> {
        Ok(self.embed_pattern(pattern))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Scales `vector` to unit length in place. Zero vectors are left as is.
fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity of two unit vectors, clamped to `[0, 1]`.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| x * y)
        .sum::<f32>()
        .clamp(0.0, 1.0)
}
