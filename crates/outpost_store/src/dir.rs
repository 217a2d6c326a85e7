//! Store directory layout and locking.
//!
//! ```text
//! <store>/
//! ├─ LOCK          # advisory lock, one process at a time
//! ├─ journal.log   # append-only journal of committed transactions
//! └─ SNAPSHOT      # last checkpoint image, replaced atomically
//! ```

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const JOURNAL_FILE: &str = "journal.log";
const SNAPSHOT_FILE: &str = "SNAPSHOT";

/// An opened store directory.
///
/// Holds an exclusive advisory lock on `LOCK` for as long as it lives, so a
/// second process (or a second open in this one) fails with
/// [`StoreError::Locked`].
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    _lock: File,
}

impl StoreDir {
    /// Opens `path`, creating it when `create_if_missing` is set, and takes
    /// the lock.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidDirectory`] if the path is missing (and may not
    ///   be created) or is not a directory
    /// - [`StoreError::Locked`] if the lock is held elsewhere
    pub fn open(path: &Path, create_if_missing: bool) -> StoreResult<Self> {
        if !path.exists() {
            if !create_if_missing {
                return Err(StoreError::invalid_directory(format!(
                    "{} does not exist",
                    path.display()
                )));
            }
            fs::create_dir_all(path)?;
        }
        if !path.is_dir() {
            return Err(StoreError::invalid_directory(format!(
                "{} is not a directory",
                path.display()
            )));
        }

        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock: lock,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the journal path.
    #[must_use]
    pub fn journal_path(&self) -> PathBuf {
        self.path.join(JOURNAL_FILE)
    }

    /// Returns the snapshot path.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.path.join(SNAPSHOT_FILE)
    }

    /// True if neither a journal nor a snapshot has been written yet.
    #[must_use]
    pub fn is_new(&self) -> bool {
        let empty = |p: PathBuf| fs::metadata(p).map(|m| m.len() == 0).unwrap_or(true);
        empty(self.journal_path()) && empty(self.snapshot_path())
    }
}
