//! redb storage engine implementation.
//!
//! This module provides the snapshot backend for AgentDB using
//! [redb](https://docs.rs/redb), a pure Rust embedded key-value store.
//!
//! # Features
//!
//! - ACID transactions: a snapshot is replaced in one write transaction
//! - Automatic crash recovery
//! - Zero external dependencies (pure Rust)
//!
//! # File Layout
//!
//! For a store at `./agent-memory`, redb writes `./agent-memory/catalog.redb`.
//! A file that cannot be opened or decoded is moved aside to
//! `catalog.redb.corrupt-<millis>` by [`RedbStorage::quarantine`].

use std::fs;
use std::path::{Path, PathBuf};

use ::redb::{Database, ReadableTable, TableError};
use tracing::{debug, info, instrument, warn};

use super::schema::{
    decode_embedding, encode_embedding, SnapshotHeader, CATALOG_FILE, EMBEDDINGS_TABLE,
    FORMAT_VERSION, HEADER_KEY, METADATA_TABLE, PATTERNS_TABLE,
};
use super::{Snapshot, StorageEngine};
use crate::error::{Result, StorageError};
use crate::pattern::{ActionPattern, StoredEntry};
use crate::types::{PatternId, Timestamp};

/// redb storage engine wrapper.
///
/// This struct holds the redb database handle for a store's
/// `catalog.redb`. It implements [`StorageEngine`] for use with AgentDB.
///
/// # Thread Safety
///
/// `RedbStorage` is `Send + Sync`. redb handles internal synchronization
/// using MVCC for readers and exclusive locking for writers.
#[derive(Debug)]
pub struct RedbStorage {
    /// The redb database handle.
    db: Database,

    /// Path to the database file.
    path: PathBuf,
}

impl RedbStorage {
    /// Opens or creates `catalog.redb` inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file is corrupted beyond redb's own recovery
    /// - The file is locked by another process
    #[instrument(fields(dir = %dir.display()))]
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(CATALOG_FILE);
        let exists = path.exists();

        debug!(exists = exists, "Opening catalog file");

        // Note: redb doesn't expose a typed error variant for lock conflicts
        // on every platform, so we detect them via error message matching.
        let db = Database::create(&path).map_err(|e| {
            if e.to_string().contains("locked") || e.to_string().contains("already open") {
                StorageError::DatabaseLocked
            } else {
                StorageError::Redb(e.to_string())
            }
        })?;

        debug!("Catalog file opened successfully");
        Ok(Self { db, path })
    }

    /// Moves `catalog.redb` aside as `catalog.redb.corrupt-<millis>`.
    ///
    /// Returns the new path, or `None` if there was no file. The caller must
    /// have dropped any `RedbStorage` for `dir` first.
    pub fn quarantine(dir: &Path) -> Result<Option<PathBuf>> {
        let path = dir.join(CATALOG_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let target = dir.join(format!(
            "{}.corrupt-{}",
            CATALOG_FILE,
            Timestamp::now().as_millis()
        ));
        fs::rename(&path, &target)?;

        warn!(from = %path.display(), to = %target.display(), "Quarantined catalog file");
        Ok(Some(target))
    }

    /// Returns a reference to the underlying redb database.
    #[cfg(test)]
    pub(crate) fn database(&self) -> &Database {
        &self.db
    }
}

impl StorageEngine for RedbStorage {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<Option<Snapshot>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;

        let header = {
            let meta_table = match read_txn.open_table(METADATA_TABLE) {
                Ok(table) => table,
                // A fresh file has no tables until the first save
                Err(TableError::TableDoesNotExist(_)) => return Ok(None),
                Err(e) => {
                    return Err(StorageError::corrupted(format!(
                        "Cannot open metadata table: {}",
                        e
                    ))
                    .into())
                }
            };

            let Some(header_bytes) = meta_table.get(HEADER_KEY).map_err(StorageError::from)?
            else {
                return Ok(None);
            };

            bincode::deserialize::<SnapshotHeader>(header_bytes.value()).map_err(|e| {
                StorageError::corrupted(format!("Invalid snapshot header: {}", e))
            })?
        };

        if !header.is_compatible() {
            warn!(
                expected = FORMAT_VERSION,
                found = header.format_version,
                "Snapshot format version mismatch"
            );
            return Err(StorageError::FormatVersionMismatch {
                expected: FORMAT_VERSION,
                found: header.format_version,
            }
            .into());
        }

        let patterns = read_txn
            .open_table(PATTERNS_TABLE)
            .map_err(|e| StorageError::corrupted(format!("Cannot open patterns table: {}", e)))?;
        let embeddings = read_txn.open_table(EMBEDDINGS_TABLE).map_err(|e| {
            StorageError::corrupted(format!("Cannot open embeddings table: {}", e))
        })?;

        let mut entries = Vec::with_capacity(header.pattern_count as usize);
        for item in patterns.iter().map_err(StorageError::from)? {
            let (key, value) = item.map_err(StorageError::from)?;
            let id = PatternId::new(key.value());

            let pattern: ActionPattern = bincode::deserialize(value.value()).map_err(|e| {
                StorageError::corrupted(format!("Invalid pattern record {}: {}", id, e))
            })?;

            // Unreadable vectors are recomputed by the caller
            let embedding = embeddings
                .get(id.as_u64())
                .map_err(StorageError::from)?
                .and_then(|bytes| decode_embedding(bytes.value()))
                .unwrap_or_default();

            entries.push(StoredEntry {
                id,
                pattern,
                embedding,
            });
        }

        if entries.len() as u64 != header.pattern_count {
            return Err(StorageError::corrupted(format!(
                "Header lists {} patterns, found {}",
                header.pattern_count,
                entries.len()
            ))
            .into());
        }

        if let Some(last) = entries.last() {
            if last.id >= header.next_id {
                return Err(StorageError::corrupted(format!(
                    "Pattern id {} is not below next id {}",
                    last.id, header.next_id
                ))
                .into());
            }
        }

        info!(
            patterns = entries.len(),
            next_id = header.next_id.as_u64(),
            "Snapshot loaded"
        );

        Ok(Some(Snapshot { header, entries }))
    }

    #[instrument(skip(self, snapshot), fields(path = %self.path.display(), patterns = snapshot.entries.len()))]
    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(StorageError::from)?;

        {
            // Replace rather than merge: the snapshot is the whole state
            write_txn.delete_table(PATTERNS_TABLE)?;
            write_txn.delete_table(EMBEDDINGS_TABLE)?;

            let mut patterns = write_txn.open_table(PATTERNS_TABLE)?;
            let mut embeddings = write_txn.open_table(EMBEDDINGS_TABLE)?;

            for entry in &snapshot.entries {
                let pattern_bytes = bincode::serialize(&entry.pattern)
                    .map_err(|e| StorageError::serialization(e.to_string()))?;
                patterns.insert(entry.id.as_u64(), pattern_bytes.as_slice())?;

                let embedding_bytes = encode_embedding(&entry.embedding);
                embeddings.insert(entry.id.as_u64(), embedding_bytes.as_slice())?;
            }

            let mut meta_table = write_txn.open_table(METADATA_TABLE)?;
            let header_bytes = bincode::serialize(&snapshot.header)
                .map_err(|e| StorageError::serialization(e.to_string()))?;
            meta_table.insert(HEADER_KEY, header_bytes.as_slice())?;
        }

        write_txn.commit().map_err(StorageError::from)?;

        debug!(
            next_id = snapshot.header.next_id.as_u64(),
            "Snapshot committed"
        );
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
