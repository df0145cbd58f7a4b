//! Error types for AgentDB.
//!
//! AgentDB uses a hierarchical error system:
//! - `AgentDBError` is the top-level error returned by all public APIs
//! - Specific error types (`StorageError`, `ValidationError`, `ImportError`)
//!   provide detail
//!
//! # Error Handling Pattern
//! ```rust,ignore
//! use agentdb::{AgentDB, Config, Result};
//!
//! fn example() -> Result<()> {
//!     let mut db = AgentDB::open("./patterns", Config::default())?;
//!     // ... operations that may fail ...
//!     db.save()?;
//!     db.close()?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Result type alias for AgentDB operations.
pub type Result<T> = std::result::Result<T, AgentDBError>;

/// Top-level error enum for all AgentDB operations.
///
/// This is the only error type returned by public APIs.
/// Use pattern matching to handle specific error cases.
#[derive(Debug, Error)]
pub enum AgentDBError {
    /// Storage layer error (I/O, corruption, transactions).
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding generation error.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index error (HNSW operations).
    #[error("Vector index error: {0}")]
    Vector(String),

    /// Training-data document rejected.
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// A blocking I/O task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(String),
}

impl AgentDBError {
    /// Creates an embedding error with the given message.
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Creates a vector index error with the given message.
    pub fn vector(msg: impl Into<String>) -> Self {
        Self::Vector(msg.into())
    }

    /// Returns true if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a storage error.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is a vector index error.
    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Vector(_))
    }

    /// Returns true if this is a training-data import error.
    pub fn is_import(&self) -> bool {
        matches!(self, Self::Import(_))
    }
}

/// Storage-related errors.
///
/// These errors indicate problems with the persisted snapshot.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Snapshot file or data is corrupted.
    #[error("Snapshot corrupted: {0}")]
    Corrupted(String),

    /// Store directory is locked by another instance.
    #[error("Store directory is locked by another instance")]
    DatabaseLocked,

    /// Transaction failed (commit, rollback, etc.).
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error from the redb storage engine.
    #[error("Storage engine error: {0}")]
    Redb(String),

    /// Snapshot format version doesn't match the version this build writes.
    #[error("Snapshot format version mismatch: expected {expected}, found {found}")]
    FormatVersionMismatch {
        /// Expected format version.
        expected: u32,
        /// Format version found on disk.
        found: u32,
    },
}

impl StorageError {
    /// Creates a corruption error with the given message.
    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Creates a serialization error with the given message.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}

// Conversions from redb error types
impl From<redb::Error> for StorageError {
    fn from(err: redb::Error) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::DatabaseError> for StorageError {
    fn from(err: redb::DatabaseError) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(err: redb::TransactionError) -> Self {
        StorageError::Transaction(err.to_string())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(err: redb::CommitError) -> Self {
        StorageError::Transaction(format!("Commit failed: {}", err))
    }
}

impl From<redb::TableError> for StorageError {
    fn from(err: redb::TableError) -> Self {
        StorageError::Redb(format!("Table error: {}", err))
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(err: redb::StorageError) -> Self {
        StorageError::Redb(format!("Storage error: {}", err))
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

// Also allow direct conversion to AgentDBError for convenience
impl From<redb::Error> for AgentDBError {
    fn from(err: redb::Error) -> Self {
        AgentDBError::Storage(StorageError::from(err))
    }
}

impl From<redb::DatabaseError> for AgentDBError {
    fn from(err: redb::DatabaseError) -> Self {
        AgentDBError::Storage(StorageError::from(err))
    }
}

impl From<redb::TransactionError> for AgentDBError {
    fn from(err: redb::TransactionError) -> Self {
        AgentDBError::Storage(StorageError::from(err))
    }
}

impl From<redb::CommitError> for AgentDBError {
    fn from(err: redb::CommitError) -> Self {
        AgentDBError::Storage(StorageError::from(err))
    }
}

impl From<redb::TableError> for AgentDBError {
    fn from(err: redb::TableError) -> Self {
        AgentDBError::Storage(StorageError::from(err))
    }
}

impl From<redb::StorageError> for AgentDBError {
    fn from(err: redb::StorageError) -> Self {
        AgentDBError::Storage(StorageError::from(err))
    }
}

impl From<bincode::Error> for AgentDBError {
    fn from(err: bincode::Error) -> Self {
        AgentDBError::Storage(StorageError::from(err))
    }
}

/// Validation errors for input data.
///
/// These errors indicate problems with data provided by the caller.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Embedding dimension doesn't match the store's configured dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Dimension the store was configured with.
        expected: usize,
        /// Actual dimension encountered.
        got: usize,
    },

    /// A field has an invalid value.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField {
        /// Name of the invalid field.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// A string field exceeds its maximum size.
    #[error("Field '{field}' too large: {size} bytes (max: {max} bytes)")]
    ContentTooLarge {
        /// Name of the field.
        field: String,
        /// Actual size in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },

    /// A required field is missing or empty.
    #[error("Required field missing: {field}")]
    RequiredField {
        /// Name of the missing field.
        field: String,
    },

    /// Too many items in a collection field.
    #[error("Too many items in '{field}': {count} (max: {max})")]
    TooManyItems {
        /// Name of the field.
        field: String,
        /// Actual count.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },
}

impl ValidationError {
    /// Creates a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        Self::DimensionMismatch { expected, got }
    }

    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a content too large error.
    pub fn content_too_large(field: impl Into<String>, size: usize, max: usize) -> Self {
        Self::ContentTooLarge {
            field: field.into(),
            size,
            max,
        }
    }

    /// Creates a required field error.
    pub fn required_field(field: impl Into<String>) -> Self {
        Self::RequiredField {
            field: field.into(),
        }
    }

    /// Creates a too many items error.
    pub fn too_many_items(field: impl Into<String>, count: usize, max: usize) -> Self {
        Self::TooManyItems {
            field: field.into(),
            count,
            max,
        }
    }
}

/// Errors raised while importing a training-data document.
///
/// An import error always leaves the store unchanged.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The document is not JSON or does not have the expected top-level shape.
    #[error("Malformed training document: {0}")]
    Malformed(String),

    /// The document's format version is not understood.
    #[error("Unsupported training document version: {0}")]
    UnsupportedVersion(String),

    /// A pattern inside the document failed validation.
    #[error("Invalid pattern at index {index}: {source}")]
    InvalidPattern {
        /// Position of the offending pattern in the `patterns` array.
        index: usize,
        /// Why it was rejected.
        source: ValidationError,
    },
}
