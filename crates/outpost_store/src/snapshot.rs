//! Checkpoint image of the whole store.
//!
//! ```text
//! | magic "OPSN" (4) | version (2) | length (8) | CBOR image (N) | crc32 (4) |
//! ```
//!
//! The image is written through [`outpost_storage::StorageBackend::replace`],
//! so readers only ever see a complete snapshot or none at all. Any damage is
//! therefore fatal.

use crate::codec::{from_cbor, to_cbor};
use crate::error::{StoreError, StoreResult};
use crate::journal::crc32;
use crate::state::StoreState;
use crate::types::{DatasetName, QueuedAction, Record, SequenceNumber, TransactionId};
use serde::{Deserialize, Serialize};

const SNAPSHOT_MAGIC: [u8; 4] = *b"OPSN";
const SNAPSHOT_VERSION: u16 = 1;
const HEADER_SIZE: usize = 14;

#[derive(Serialize)]
struct ImageRef<'a> {
    sequence: SequenceNumber,
    last_txid: u64,
    datasets: Vec<(&'a DatasetName, Vec<&'a Record>)>,
    queue: &'a [QueuedAction],
}

#[derive(Deserialize)]
struct Image {
    sequence: SequenceNumber,
    last_txid: u64,
    datasets: Vec<(DatasetName, Vec<Record>)>,
    queue: Vec<QueuedAction>,
}

/// A decoded snapshot.
#[derive(Debug)]
pub(crate) struct Snapshot {
    pub(crate) state: StoreState,
    pub(crate) last_txid: TransactionId,
}

pub(crate) fn encode(state: &StoreState, last_txid: TransactionId) -> StoreResult<Vec<u8>> {
    let image = ImageRef {
        sequence: state.sequence,
        last_txid: last_txid.as_u64(),
        datasets: state
            .datasets
            .iter()
            .map(|(name, records)| (name, records.values().collect()))
            .collect(),
        queue: &state.queue,
    };
    let body = to_cbor(&image)?;

    let mut out = Vec::with_capacity(HEADER_SIZE + body.len() + 4);
    out.extend_from_slice(&SNAPSHOT_MAGIC);
    out.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    out.extend_from_slice(&(body.len() as u64).to_le_bytes());
    out.extend_from_slice(&body);
    let crc = crc32(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    Ok(out)
}

/// Decodes a snapshot; an empty image means no checkpoint has been taken.
pub(crate) fn decode(bytes: &[u8]) -> StoreResult<Option<Snapshot>> {
    if bytes.is_empty() {
        return Ok(None);
    }
    if bytes.len() < HEADER_SIZE + 4 || bytes[0..4] != SNAPSHOT_MAGIC {
        return Err(StoreError::corrupted("snapshot header is damaged"));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != SNAPSHOT_VERSION {
        return Err(StoreError::corrupted(format!(
            "unsupported snapshot version {version}"
        )));
    }
    let mut len_raw = [0u8; 8];
    len_raw.copy_from_slice(&bytes[6..HEADER_SIZE]);
    let body_len = usize::try_from(u64::from_le_bytes(len_raw))
        .map_err(|_| StoreError::corrupted("snapshot length overflows"))?;
    let body_end = HEADER_SIZE
        .checked_add(body_len)
        .filter(|end| end + 4 == bytes.len())
        .ok_or_else(|| StoreError::corrupted("snapshot length does not match file size"))?;

    let stored = u32::from_le_bytes([
        bytes[body_end],
        bytes[body_end + 1],
        bytes[body_end + 2],
        bytes[body_end + 3],
    ]);
    let computed = crc32(&bytes[..body_end]);
    if stored != computed {
        return Err(StoreError::ChecksumMismatch {
            offset: 0,
            stored,
            computed,
        });
    }

    let image: Image = from_cbor(&bytes[HEADER_SIZE..body_end])?;
    let state = StoreState {
        datasets: image
            .datasets
            .into_iter()
            .map(|(name, records)| {
                let contents = records.into_iter().map(|r| (r.id.clone(), r)).collect();
                (name, contents)
            })
            .collect(),
        queue: image.queue,
        sequence: image.sequence,
    };
    Ok(Some(Snapshot {
        state,
        last_txid: TransactionId::new(image.last_txid),
    }))
}
