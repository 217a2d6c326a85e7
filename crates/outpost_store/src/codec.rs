//! CBOR helpers for journal and snapshot bodies.

use crate::error::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub(crate) fn to_cbor<T: Serialize + ?Sized>(value: &T) -> StoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).map_err(|e| StoreError::encoding(e.to_string()))?;
    Ok(buf)
}

pub(crate) fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| StoreError::corrupted(e.to_string()))
}

/// Splits a little-endian `u64` off the front of `bytes`.
pub(crate) fn take_u64(bytes: &[u8]) -> StoreResult<(u64, &[u8])> {
    if bytes.len() < 8 {
        return Err(StoreError::corrupted("unexpected end of entry"));
    }
    let (head, rest) = bytes.split_at(8);
    let mut raw = [0u8; 8];
    raw.copy_from_slice(head);
    Ok((u64::from_le_bytes(raw), rest))
}
