//! Storage layer abstractions for AgentDB.
//!
//! This module provides a trait-based abstraction over the snapshot backend,
//! allowing different engines to be used (e.g., redb, mock for testing).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      AgentDB                                 │
//! │                         │                                    │
//! │          ┌──────────────┴──────────────┐                     │
//! │          ▼                             ▼                     │
//! │ ┌─────────────────────┐     ┌─────────────────────┐         │
//! │ │   StorageEngine     │     │   VectorIndex       │         │
//! │ │   (catalog.redb)    │     │   (patterns.hnsw.*) │         │
//! │ └─────────────────────┘     └─────────────────────┘         │
//! │          ▲                                                   │
//! │    ┌─────┴─────┐                                             │
//! │    │RedbStorage│                                             │
//! │    └───────────┘                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Snapshots are whole: `save` replaces everything the engine holds in a
//! single transaction. The store directory is guarded by a [`DirectoryLock`].

mod lock;
pub mod redb;
pub mod schema;

pub use self::lock::DirectoryLock;
pub use self::redb::RedbStorage;
pub use schema::{SnapshotHeader, FORMAT_VERSION};

use std::path::Path;

use crate::error::Result;
use crate::pattern::StoredEntry;

/// A complete persisted state: header plus every entry in id order.
///
/// Loaded entries may carry an empty embedding when the stored vector was
/// missing or unreadable; the store recomputes those.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// Snapshot-level information.
    pub header: SnapshotHeader,

    /// All entries, ascending by id.
    pub entries: Vec<StoredEntry>,
}

/// Storage engine trait for AgentDB snapshots.
///
/// This trait defines the contract that any snapshot backend must implement.
/// The primary implementation is [`RedbStorage`].
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a snapshot can be written from
/// a blocking thread (see `AgentDB::save_async`).
pub trait StorageEngine: Send + Sync {
    /// Reads the last saved snapshot.
    ///
    /// Returns `Ok(None)` if nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if the snapshot is unreadable, corrupt, or
    /// was written by an incompatible format version.
    fn load(&self) -> Result<Option<Snapshot>>;

    /// Replaces the stored snapshot atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction or serialization fails. On error
    /// the previous snapshot is left intact.
    fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// Returns the path of the backing file.
    fn path(&self) -> &Path;
}
