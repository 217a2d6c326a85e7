//! Journal entry types and payload encoding.

use crate::codec::{from_cbor, take_u64, to_cbor};
use crate::error::{StoreError, StoreResult};
use crate::journal::frame::write_frame;
use crate::state::Mutation;
use crate::types::{ActionId, DatasetName, QueuedAction, Record, SequenceNumber, TransactionId};
use serde::{Deserialize, Serialize};

/// Kind byte of a journal frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryKind {
    /// Opens a transaction.
    Begin = 1,
    /// Replaces a dataset.
    ReplaceDataset = 2,
    /// Appends a queued action.
    AppendAction = 3,
    /// Removes queued actions.
    RemoveActions = 4,
    /// Commits a transaction.
    Commit = 5,
}

impl EntryKind {
    /// Parses a kind byte.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Begin),
            2 => Some(Self::ReplaceDataset),
            3 => Some(Self::AppendAction),
            4 => Some(Self::RemoveActions),
            5 => Some(Self::Commit),
            _ => None,
        }
    }

    /// Returns the kind byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A decoded journal entry.
#[derive(Debug, Clone, PartialEq)]
pub enum JournalEntry {
    /// Start of a transaction.
    Begin {
        /// Transaction ID.
        txid: TransactionId,
    },
    /// A change belonging to an open transaction.
    Mutation {
        /// Transaction ID.
        txid: TransactionId,
        /// The change.
        mutation: Mutation,
    },
    /// Commit marker; the transaction is durable once this frame is.
    Commit {
        /// Transaction ID.
        txid: TransactionId,
        /// Sequence number assigned at commit.
        sequence: SequenceNumber,
    },
}

#[derive(Serialize)]
struct ReplaceBodyRef<'a> {
    name: &'a DatasetName,
    records: &'a [Record],
}

#[derive(Deserialize)]
struct ReplaceBody {
    name: DatasetName,
    records: Vec<Record>,
}

impl JournalEntry {
    /// Returns the frame kind for this entry.
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Begin { .. } => EntryKind::Begin,
            Self::Mutation { mutation, .. } => mutation_kind(mutation),
            Self::Commit { .. } => EntryKind::Commit,
        }
    }

    /// Returns the owning transaction.
    #[must_use]
    pub fn txid(&self) -> TransactionId {
        match self {
            Self::Begin { txid } | Self::Mutation { txid, .. } | Self::Commit { txid, .. } => *txid,
        }
    }

    /// Appends this entry, framed, to `buf`.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be encoded or is too large for a frame.
    pub fn encode_into(&self, buf: &mut Vec<u8>) -> StoreResult<()> {
        match self {
            Self::Begin { txid } => write_frame(buf, EntryKind::Begin, &txid.as_u64().to_le_bytes()),
            Self::Mutation { txid, mutation } => encode_mutation(buf, *txid, mutation),
            Self::Commit { txid, sequence } => {
                let mut payload = Vec::with_capacity(16);
                payload.extend_from_slice(&txid.as_u64().to_le_bytes());
                payload.extend_from_slice(&sequence.as_u64().to_le_bytes());
                write_frame(buf, EntryKind::Commit, &payload)
            }
        }
    }

    /// Decodes an entry payload of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] if the payload is malformed.
    pub fn decode(kind: EntryKind, payload: &[u8]) -> StoreResult<Self> {
        let (raw_txid, body) = take_u64(payload)?;
        let txid = TransactionId::new(raw_txid);

        match kind {
            EntryKind::Begin => {
                expect_consumed(body, "begin")?;
                Ok(Self::Begin { txid })
            }
            EntryKind::Commit => {
                let (seq, rest) = take_u64(body)?;
                expect_consumed(rest, "commit")?;
                Ok(Self::Commit {
                    txid,
                    sequence: SequenceNumber::new(seq),
                })
            }
            EntryKind::ReplaceDataset => {
                let ReplaceBody { name, records } = from_cbor(body)?;
                Ok(Self::Mutation {
                    txid,
                    mutation: Mutation::ReplaceDataset { name, records },
                })
            }
            EntryKind::AppendAction => {
                let action: QueuedAction = from_cbor(body)?;
                Ok(Self::Mutation {
                    txid,
                    mutation: Mutation::AppendAction(action),
                })
            }
            EntryKind::RemoveActions => {
                let ids: Vec<ActionId> = from_cbor(body)?;
                Ok(Self::Mutation {
                    txid,
                    mutation: Mutation::RemoveActions(ids),
                })
            }
        }
    }
}

fn mutation_kind(mutation: &Mutation) -> EntryKind {
    match mutation {
        Mutation::ReplaceDataset { .. } => EntryKind::ReplaceDataset,
        Mutation::AppendAction(_) => EntryKind::AppendAction,
        Mutation::RemoveActions(_) => EntryKind::RemoveActions,
    }
}

fn expect_consumed(rest: &[u8], what: &str) -> StoreResult<()> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(StoreError::corrupted(format!(
            "{} trailing bytes in {what} entry",
            rest.len()
        )))
    }
}

fn encode_mutation(buf: &mut Vec<u8>, txid: TransactionId, mutation: &Mutation) -> StoreResult<()> {
    let mut payload = txid.as_u64().to_le_bytes().to_vec();
    let body = match mutation {
        Mutation::ReplaceDataset { name, records } => to_cbor(&ReplaceBodyRef { name, records })?,
        Mutation::AppendAction(action) => to_cbor(action)?,
        Mutation::RemoveActions(ids) => to_cbor(ids)?,
    };
    payload.extend_from_slice(&body);
    write_frame(buf, mutation_kind(mutation), &payload)
}

/// Encodes a whole transaction (begin, mutations, commit) into one buffer so
/// it reaches the backend in a single append.
pub(crate) fn encode_transaction(
    txid: TransactionId,
    sequence: SequenceNumber,
    mutations: &[Mutation],
) -> StoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    JournalEntry::Begin { txid }.encode_into(&mut buf)?;
    for mutation in mutations {
        encode_mutation(&mut buf, txid, mutation)?;
    }
    JournalEntry::Commit { txid, sequence }.encode_into(&mut buf)?;
    Ok(buf)
}
