//! # AgentDB
//!
//! Embedded pattern memory for browser-automation agents.
//!
//! AgentDB records what an automation agent did (form fills, clicks,
//! navigations, CAPTCHA solves) and whether it worked, and lets the agent
//! look up similar past actions before acting again.
//!
//! ## Quick Start
//!
//! ```rust
//! use agentdb::prelude::*;
//!
//! # fn main() -> agentdb::Result<()> {
//! # let dir = tempfile::tempdir().unwrap();
//! // Open or create a store
//! let mut db = AgentDB::open(dir.path(), Config::default())?;
//!
//! // Record an action and its outcome
//! db.store_action(
//!     ActionPattern::new("solve_captcha")
//!         .with_url("https://x.com/signup")
//!         .with_metadata("captchaType", "recaptcha")
//!         .with_success(true),
//! )?;
//!
//! // Look for a previously successful precedent
//! let query = ActionPattern::new("solve_captcha").with_url("https://x.com/login");
//! let results = db.find_similar(&query, 5, &SearchOptions::successful())?;
//! assert_eq!(results.len(), 1);
//!
//! // Persist and release
//! db.save()?;
//! db.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Concepts
//!
//! ### Action pattern
//!
//! An **action pattern** is one observed automation step: an `action`
//! label plus optional `selector`, `value`, `url`, outcome, free-form
//! metadata and timestamp. Stored patterns are never edited; repeated
//! observations are new entries.
//!
//! ### Embedding
//!
//! Each pattern is turned into a fixed-size vector by feature hashing over
//! character n-grams of its `action`, `selector`, `value` and `url`. No
//! model is involved and the result is deterministic across processes.
//! Outcome and metadata never affect similarity; they are filters.
//!
//! ### Persistence
//!
//! A store lives in one directory: a redb catalog snapshot plus the HNSW
//! index files. Saving is explicit. On open, the HNSW graph is rebuilt
//! from the saved embeddings and checked before the store is handed out.
//!
//! ## Logging
//!
//! AgentDB emits [`tracing`](https://docs.rs/tracing) events and spans; it
//! never installs a subscriber.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============================================================================
// Module declarations
// ============================================================================

mod config;
mod db;
mod error;
mod types;

pub mod embedding;
pub mod storage;

// Domain modules
mod catalog;
mod pattern;
mod search;
mod stats;
mod training;

/// Vector index module for HNSW-based approximate nearest neighbor search.
pub mod vector;

// ============================================================================
// Public API re-exports
// ============================================================================

// Main store interface
pub use db::AgentDB;

// Configuration
pub use config::{Config, EmbeddingDimension, HnswConfig, SearchConfig};

// Error handling
pub use error::{AgentDBError, ImportError, Result, StorageError, ValidationError};

// Core types
pub use types::{Embedding, PatternId, Timestamp};

// Domain types
pub use catalog::PatternCatalog;
pub use pattern::{ActionPattern, StoredEntry};
pub use stats::{Statistics, StatisticsAggregator, TopPattern};
pub use training::{TrainingData, TRAINING_DATA_VERSION};

// Search
pub use search::{SearchOptions, SimilarityResult};

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common AgentDB usage.
///
/// ```rust
/// use agentdb::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{Config, EmbeddingDimension};
    pub use crate::db::AgentDB;
    pub use crate::error::{AgentDBError, Result};
    pub use crate::pattern::ActionPattern;
    pub use crate::search::{SearchOptions, SimilarityResult};
    pub use crate::stats::{Statistics, TopPattern};
    pub use crate::types::{PatternId, Timestamp};
}
