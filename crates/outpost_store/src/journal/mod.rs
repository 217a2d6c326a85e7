//! Append-only journal of committed transactions.
//!
//! ## Frame Format
//!
//! ```text
//! | magic "OPJL" (4) | version (2) | kind (1) | length (4) | header crc32 (4) | payload (N) | crc32 (4) |
//! ```
//!
//! All integers are little endian. The header checksum covers the eleven
//! bytes before it; the trailing checksum covers header and payload. Payloads
//! start with the transaction ID; bodies that carry records or actions are
//! CBOR.
//!
//! ## Commit Protocol
//!
//! A transaction is encoded as `Begin, mutation*, Commit` into one buffer and
//! handed to the backend in a single append, then flushed (and fsynced when
//! configured). If any step fails the journal is cut back to its previous
//! length, so a failed commit leaves no trace.
//!
//! ## Recovery Policy
//!
//! - An incomplete frame at the tail is a crash mid-append: it and any
//!   transaction without a commit marker are discarded. A frame is only
//!   incomplete if its header is short, or intact with a payload that runs
//!   past the end of the journal.
//! - Bad magic, unknown kinds, future versions and checksum mismatches are
//!   fatal. The store refuses to open rather than silently lose data.
//! - Replay applies committed transactions in commit order and skips those
//!   already folded into the snapshot, so it is idempotent.

mod entry;
mod frame;

pub use entry::{EntryKind, JournalEntry};
pub use frame::{crc32, Frame, FrameReader, JOURNAL_MAGIC, JOURNAL_VERSION};

pub(crate) use entry::encode_transaction;

use crate::error::{StoreError, StoreResult};
use crate::state::Mutation;
use crate::types::{SequenceNumber, TransactionId};
use outpost_storage::StorageBackend;
use std::collections::HashMap;
use tracing::warn;

/// Summary of one frame, for inspection tools.
#[derive(Debug, Clone)]
pub struct FrameSummary {
    /// Byte offset.
    pub offset: u64,
    /// Total frame length.
    pub len: usize,
    /// Entry kind.
    pub kind: EntryKind,
    /// Owning transaction.
    pub txid: TransactionId,
}

/// A transaction whose commit marker made it to the journal.
#[derive(Debug, Clone)]
pub struct CommittedTransaction {
    /// Transaction ID.
    pub txid: TransactionId,
    /// Commit sequence.
    pub sequence: SequenceNumber,
    /// Changes, in write order.
    pub mutations: Vec<Mutation>,
}

/// Result of scanning a journal image.
#[derive(Debug, Clone, Default)]
pub struct JournalScan {
    /// Every complete frame.
    pub frames: Vec<FrameSummary>,
    /// Committed transactions in commit order.
    pub committed: Vec<CommittedTransaction>,
    /// Transactions that began but never committed.
    pub uncommitted: Vec<TransactionId>,
    /// Offset just past the last commit marker.
    pub committed_len: u64,
    /// Total journal length.
    pub total_len: u64,
    /// True if the tail ends in an incomplete frame.
    pub torn_tail: bool,
}

impl JournalScan {
    /// Highest transaction ID seen in any frame.
    #[must_use]
    pub fn max_txid(&self) -> Option<TransactionId> {
        self.frames.iter().map(|f| f.txid).max()
    }

    /// Bytes that recovery discards: torn frames and uncommitted transactions.
    #[must_use]
    pub fn discarded_bytes(&self) -> u64 {
        self.total_len - self.committed_len
    }
}

/// Scans a journal image and groups its frames into transactions.
///
/// # Errors
///
/// Fails on any fatal frame condition, and on structurally impossible
/// sequences: entries for a transaction that never began, a transaction that
/// begins twice, or commit sequences that do not increase.
pub fn scan(bytes: &[u8]) -> StoreResult<JournalScan> {
    let mut reader = FrameReader::new(bytes);
    let mut open: HashMap<TransactionId, Vec<Mutation>> = HashMap::new();
    let mut open_order: Vec<TransactionId> = Vec::new();
    let mut scan = JournalScan {
        total_len: bytes.len() as u64,
        ..JournalScan::default()
    };
    let mut last_sequence: Option<SequenceNumber> = None;

    for frame in reader.by_ref() {
        let Frame { offset, len, entry } = frame?;
        let txid = entry.txid();
        scan.frames.push(FrameSummary {
            offset,
            len,
            kind: entry.kind(),
            txid,
        });

        match entry {
            JournalEntry::Begin { txid } => {
                if open.insert(txid, Vec::new()).is_some() {
                    return Err(StoreError::corrupted(format!(
                        "{txid} begins twice (offset {offset})"
                    )));
                }
                open_order.push(txid);
            }
            JournalEntry::Mutation { txid, mutation } => {
                open.get_mut(&txid)
                    .ok_or_else(|| {
                        StoreError::corrupted(format!(
                            "{} entry for {txid} outside a transaction (offset {offset})",
                            mutation.label()
                        ))
                    })?
                    .push(mutation);
            }
            JournalEntry::Commit { txid, sequence } => {
                let mutations = open.remove(&txid).ok_or_else(|| {
                    StoreError::corrupted(format!(
                        "commit for {txid} without begin (offset {offset})"
                    ))
                })?;
                if last_sequence.is_some_and(|last| sequence <= last) {
                    return Err(StoreError::corrupted(format!(
                        "commit sequence {sequence} does not advance (offset {offset})"
                    )));
                }
                last_sequence = Some(sequence);
                open_order.retain(|t| *t != txid);
                scan.committed.push(CommittedTransaction {
                    txid,
                    sequence,
                    mutations,
                });
                scan.committed_len = offset + len as u64;
            }
        }
    }

    scan.torn_tail = reader.is_torn();
    scan.uncommitted = open_order;
    Ok(scan)
}

/// Write side of the journal.
pub(crate) struct Journal {
    backend: Box<dyn StorageBackend>,
    sync_on_commit: bool,
}

impl Journal {
    pub(crate) fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend,
            sync_on_commit,
        }
    }

    pub(crate) fn size(&self) -> StoreResult<u64> {
        Ok(self.backend.size()?)
    }

    pub(crate) fn read_all(&self) -> StoreResult<Vec<u8>> {
        Ok(self.backend.read_all()?)
    }

    /// Writes one pre-encoded transaction. On failure the journal is restored
    /// to its previous length before the error is returned.
    pub(crate) fn commit(&mut self, encoded: &[u8]) -> StoreResult<()> {
        let before = self.backend.size()?;
        let result = self.write_durably(encoded);
        if let Err(err) = result {
            if let Err(rollback) = self.backend.truncate(before) {
                warn!(error = %rollback, offset = before, "could not cut back failed journal append");
            }
            return Err(err);
        }
        Ok(())
    }

    fn write_durably(&mut self, encoded: &[u8]) -> StoreResult<()> {
        self.backend.append(encoded)?;
        self.backend.flush()?;
        if self.sync_on_commit {
            self.backend.sync()?;
        }
        Ok(())
    }

    pub(crate) fn truncate(&mut self, len: u64) -> StoreResult<()> {
        self.backend.truncate(len)?;
        self.backend.sync()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionKind, QueuedAction};
    use outpost_storage::InMemoryBackend;
    use serde_json::json;

    fn append(seq: u64, txid: u64) -> Vec<u8> {
        let action = QueuedAction::new(ActionKind::new("sale").unwrap(), json!(seq));
        encode_transaction(
            TransactionId::new(txid),
            SequenceNumber::new(seq),
            &[Mutation::AppendAction(action)],
        )
        .unwrap()
    }

    #[test]
    fn scan_groups_committed_transactions() {
        let mut bytes = append(1, 1);
        bytes.extend(append(2, 2));

        let scan = scan(&bytes).unwrap();
        assert_eq!(scan.committed.len(), 2);
        assert_eq!(scan.frames.len(), 6);
        assert_eq!(scan.committed_len, bytes.len() as u64);
        assert_eq!(scan.discarded_bytes(), 0);
        assert_eq!(scan.max_txid(), Some(TransactionId::new(2)));
        assert!(!scan.torn_tail);
    }

    #[test]
    fn transaction_without_commit_is_uncommitted() {
        let committed = append(1, 1);
        let second = append(2, 2);
        let mut bytes = committed.clone();
        // Drop the commit frame of the second transaction entirely.
        let commit_frame_len = frame::HEADER_SIZE + 16 + frame::CRC_SIZE;
        bytes.extend_from_slice(&second[..second.len() - commit_frame_len]);

        let scan = scan(&bytes).unwrap();
        assert_eq!(scan.committed.len(), 1);
        assert_eq!(scan.uncommitted, vec![TransactionId::new(2)]);
        assert_eq!(scan.committed_len, committed.len() as u64);
        assert!(!scan.torn_tail);
    }

    #[test]
    fn torn_tail_is_reported() {
        let mut bytes = append(1, 1);
        let second = append(2, 2);
        bytes.extend_from_slice(&second[..second.len() - 3]);

        let scan = scan(&bytes).unwrap();
        assert!(scan.torn_tail);
        assert_eq!(scan.committed.len(), 1);
        assert!(scan.discarded_bytes() > 0);
    }

    #[test]
    fn non_increasing_sequence_is_corruption() {
        let mut bytes = append(5, 1);
        bytes.extend(append(5, 2));
        assert!(scan(&bytes).unwrap_err().is_corruption());
    }

    #[test]
    fn commit_without_begin_is_corruption() {
        let mut bytes = Vec::new();
        JournalEntry::Commit {
            txid: TransactionId::new(4),
            sequence: SequenceNumber::new(1),
        }
        .encode_into(&mut bytes)
        .unwrap();
        assert!(scan(&bytes).is_err());
    }

    proptest::proptest! {
        #[test]
        fn scan_never_panics_on_garbage(bytes in proptest::collection::vec(proptest::num::u8::ANY, 0..512)) {
            let _ = scan(&bytes);
        }

        #[test]
        fn every_prefix_keeps_whole_transactions(count in 1usize..6, cut_seed in proptest::num::usize::ANY) {
            let mut bytes = Vec::new();
            let mut ends = Vec::new();
            for n in 1..=count as u64 {
                bytes.extend(append(n, n));
                ends.push(bytes.len());
            }
            let cut = cut_seed % (bytes.len() + 1);

            let scan = scan(&bytes[..cut]).unwrap();
            let whole = ends.iter().filter(|end| **end <= cut).count();
            proptest::prop_assert_eq!(scan.committed.len(), whole);
            proptest::prop_assert!(scan.committed_len <= cut as u64);
        }
    }

    #[test]
    fn journal_commit_appends_whole_transaction() {
        let backend = InMemoryBackend::new();
        let mut journal = Journal::new(Box::new(backend.clone()), true);
        let encoded = append(1, 1);

        journal.commit(&encoded).unwrap();
        assert_eq!(backend.bytes(), encoded);
        assert_eq!(journal.size().unwrap(), encoded.len() as u64);

        journal.truncate(0).unwrap();
        assert!(journal.read_all().unwrap().is_empty());
    }
}
