//! Advisory lock on a store directory.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::{Result, StorageError};

use super::schema::LOCK_FILE;

/// Exclusive advisory lock on `<dir>/LOCK`, released on drop.
///
/// Only one store may have a directory open at a time. The lock is
/// per open file, so a second store in the same process is refused too.
#[derive(Debug)]
pub struct DirectoryLock {
    file: File,
    path: PathBuf,
}

impl DirectoryLock {
    /// Takes the lock without blocking.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::DatabaseLocked` if another store holds the
    /// lock, or an I/O error if the lock file cannot be opened.
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(StorageError::DatabaseLocked.into());
            }
            return Err(e.into());
        }

        debug!(path = %path.display(), "Directory lock acquired");
        Ok(Self { file, path })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
