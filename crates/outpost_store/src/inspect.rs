//! Read-only inspection of a store directory.
//!
//! Opening a [`crate::LocalStore`] repairs a torn journal tail. These helpers
//! look at the files as they are, without changing anything, which is what
//! `outpost verify` and `outpost dump-journal` need.

use crate::dir::StoreDir;
use crate::error::StoreResult;
use crate::journal::{self, JournalScan};
use crate::snapshot;
use crate::types::SequenceNumber;
use outpost_storage::{FileBackend, StorageBackend};
use std::path::Path;

/// Result of inspecting a store directory.
#[derive(Debug, Clone)]
pub struct JournalReport {
    /// Sequence held by the snapshot, if any.
    pub snapshot_sequence: Option<SequenceNumber>,
    /// Snapshot file size in bytes.
    pub snapshot_bytes: u64,
    /// Scan of the journal.
    pub scan: JournalScan,
}

impl JournalReport {
    /// Sequence a store opened from this directory would report.
    #[must_use]
    pub fn effective_sequence(&self) -> SequenceNumber {
        let journal = self.scan.committed.last().map(|t| t.sequence);
        journal
            .into_iter()
            .chain(self.snapshot_sequence)
            .max()
            .unwrap_or_default()
    }

    /// True if opening would need to discard bytes.
    #[must_use]
    pub fn needs_repair(&self) -> bool {
        self.scan.discarded_bytes() > 0
    }
}

/// Inspects the store at `path` without modifying it.
///
/// # Errors
///
/// Fails if the directory is missing or locked, or if the journal or snapshot
/// is corrupted.
pub fn inspect_dir(path: &Path) -> StoreResult<JournalReport> {
    let dir = StoreDir::open(path, false)?;
    let journal = FileBackend::open(&dir.journal_path())?;
    let snapshot = FileBackend::open(&dir.snapshot_path())?;

    let snapshot_bytes = snapshot.read_all()?;
    let snapshot_sequence = snapshot::decode(&snapshot_bytes)?.map(|s| s.state.sequence);
    let scan = journal::scan(&journal.read_all()?)?;

    Ok(JournalReport {
        snapshot_sequence,
        snapshot_bytes: snapshot_bytes.len() as u64,
        scan,
    })
}
