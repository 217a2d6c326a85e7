//! Store statistics.

use crate::types::{DatasetName, SequenceNumber};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Point-in-time figures about a store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    /// Record count per dataset.
    pub datasets: BTreeMap<DatasetName, usize>,
    /// Actions waiting for confirmation.
    pub queued_actions: usize,
    /// Creation time of the oldest queued action.
    pub oldest_action_at: Option<DateTime<Utc>>,
    /// Current journal length in bytes.
    pub journal_bytes: u64,
    /// Sequence of the last commit.
    pub committed_sequence: SequenceNumber,
    /// Checkpoints taken since open.
    pub checkpoints: u64,
}

/// What recovery found when the store was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// Sequence restored from the snapshot, if there was one.
    pub snapshot_sequence: Option<SequenceNumber>,
    /// Committed transactions replayed from the journal.
    pub replayed: usize,
    /// Committed transactions skipped because the snapshot already held them.
    pub skipped: usize,
    /// Transactions discarded because their commit marker never made it.
    pub discarded: usize,
    /// Journal bytes cut off during recovery.
    pub truncated_bytes: u64,
}
