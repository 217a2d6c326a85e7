//! Journal frame envelope and reader.

use crate::error::{StoreError, StoreResult};
use crate::journal::entry::{EntryKind, JournalEntry};

/// Magic bytes opening every journal frame.
pub const JOURNAL_MAGIC: [u8; 4] = *b"OPJL";

/// Current journal format version.
pub const JOURNAL_VERSION: u16 = 1;

/// magic (4) + version (2) + kind (1) + length (4) + header crc32 (4)
pub(crate) const HEADER_SIZE: usize = 15;

/// Header bytes covered by the header checksum.
const HEADER_FIELDS: usize = 11;

pub(crate) const CRC_SIZE: usize = 4;

/// CRC-32 (IEEE) of `data`.
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut bit = 0;
            while bit < 8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
                bit += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    !data.iter().fold(0xFFFF_FFFF_u32, |crc, &byte| {
        (crc >> 8) ^ TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize]
    })
}

/// Appends one framed entry to `buf`.
pub(crate) fn write_frame(buf: &mut Vec<u8>, kind: EntryKind, payload: &[u8]) -> StoreResult<()> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        StoreError::invalid_argument(format!(
            "journal entry of {} bytes exceeds the frame limit",
            payload.len()
        ))
    })?;

    let start = buf.len();
    buf.reserve(HEADER_SIZE + payload.len() + CRC_SIZE);
    buf.extend_from_slice(&JOURNAL_MAGIC);
    buf.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
    buf.push(kind.as_byte());
    buf.extend_from_slice(&len.to_le_bytes());
    let header_crc = crc32(&buf[start..]);
    buf.extend_from_slice(&header_crc.to_le_bytes());
    buf.extend_from_slice(payload);
    let crc = crc32(&buf[start..]);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(())
}

/// A decoded frame and where it sits in the journal.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Byte offset of the frame.
    pub offset: u64,
    /// Total frame length including envelope.
    pub len: usize,
    /// Decoded entry.
    pub entry: JournalEntry,
}

/// Iterates the frames of an in-memory journal image.
///
/// An incomplete frame at the tail (crash mid-append) ends iteration cleanly
/// and sets [`FrameReader::is_torn`]: either fewer bytes than a header, or a
/// header whose own checksum holds but whose payload runs past the end. Bad
/// magic, an unknown kind, a future version or a checksum mismatch in the
/// header or the frame are errors: those bytes were written completely and
/// then damaged.
pub struct FrameReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    torn: bool,
    finished: bool,
}

impl<'a> FrameReader<'a> {
    /// Starts reading at the beginning of `bytes`.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            torn: false,
            finished: false,
        }
    }

    /// Offset just past the last complete frame read so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// True once an incomplete tail frame has been seen.
    #[must_use]
    pub fn is_torn(&self) -> bool {
        self.torn
    }

    fn fail(&mut self, err: StoreError) -> Option<StoreResult<Frame>> {
        self.finished = true;
        Some(Err(err))
    }

    fn stop_torn(&mut self) -> Option<StoreResult<Frame>> {
        self.finished = true;
        self.torn = true;
        None
    }
}

impl<'a> Iterator for FrameReader<'a> {
    type Item = StoreResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.pos == self.bytes.len() {
            return None;
        }

        let offset = self.pos as u64;
        let bytes: &'a [u8] = self.bytes;
        let rest = &bytes[self.pos..];
        if rest.len() < HEADER_SIZE {
            return self.stop_torn();
        }

        if rest[0..4] != JOURNAL_MAGIC {
            return self.fail(StoreError::corrupted(format!(
                "bad journal magic at offset {offset}"
            )));
        }
        // A complete header must be intact before its length is trusted;
        // only a short payload after a valid header counts as torn.
        let stored = u32::from_le_bytes([rest[11], rest[12], rest[13], rest[14]]);
        let computed = crc32(&rest[..HEADER_FIELDS]);
        if stored != computed {
            return self.fail(StoreError::ChecksumMismatch {
                offset,
                stored,
                computed,
            });
        }
        let version = u16::from_le_bytes([rest[4], rest[5]]);
        if version == 0 || version > JOURNAL_VERSION {
            return self.fail(StoreError::corrupted(format!(
                "unsupported journal version {version} at offset {offset}"
            )));
        }
        let Some(kind) = EntryKind::from_byte(rest[6]) else {
            return self.fail(StoreError::corrupted(format!(
                "unknown journal entry kind {} at offset {offset}",
                rest[6]
            )));
        };
        let payload_len = u32::from_le_bytes([rest[7], rest[8], rest[9], rest[10]]) as usize;

        let total = HEADER_SIZE + payload_len + CRC_SIZE;
        if rest.len() < total {
            return self.stop_torn();
        }

        let body_end = HEADER_SIZE + payload_len;
        let stored = u32::from_le_bytes([
            rest[body_end],
            rest[body_end + 1],
            rest[body_end + 2],
            rest[body_end + 3],
        ]);
        let computed = crc32(&rest[..body_end]);
        if stored != computed {
            return self.fail(StoreError::ChecksumMismatch {
                offset,
                stored,
                computed,
            });
        }

        let entry = match JournalEntry::decode(kind, &rest[HEADER_SIZE..body_end]) {
            Ok(entry) => entry,
            Err(e) => {
                return self.fail(StoreError::corrupted(format!(
                    "undecodable {kind:?} entry at offset {offset}: {e}"
                )))
            }
        };

        self.pos += total;
        Some(Ok(Frame {
            offset,
            len: total,
            entry,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionId;

    fn begin_frame(txid: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        JournalEntry::Begin {
            txid: TransactionId::new(txid),
        }
        .encode_into(&mut buf)
        .unwrap();
        buf
    }

    #[test]
    fn crc32_known_vectors() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn reads_consecutive_frames() {
        let mut bytes = begin_frame(1);
        bytes.extend(begin_frame(2));

        let mut reader = FrameReader::new(&bytes);
        let first = reader.next().unwrap().unwrap();
        let second = reader.next().unwrap().unwrap();
        assert!(reader.next().is_none());

        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, first.len as u64);
        assert_eq!(reader.position(), bytes.len());
        assert!(!reader.is_torn());
    }

    #[test]
    fn torn_header_and_payload_end_cleanly() {
        let frame = begin_frame(1);
        for cut in [3, HEADER_SIZE + 2, frame.len() - 1] {
            let mut bytes = begin_frame(9);
            let complete = bytes.len();
            bytes.extend_from_slice(&frame[..cut]);

            let mut reader = FrameReader::new(&bytes);
            assert!(reader.next().unwrap().is_ok());
            assert!(reader.next().is_none());
            assert!(reader.is_torn());
            assert_eq!(reader.position(), complete);
        }
    }

    #[test]
    fn flipped_payload_bit_is_a_checksum_error() {
        let mut bytes = begin_frame(1);
        bytes[HEADER_SIZE] ^= 0x01;
        let result = FrameReader::new(&bytes).next().unwrap();
        assert!(matches!(result, Err(StoreError::ChecksumMismatch { offset: 0, .. })));
    }

    #[test]
    fn bad_magic_and_unknown_kind_are_fatal() {
        let mut bytes = begin_frame(1);
        bytes[0] = b'X';
        assert!(FrameReader::new(&bytes).next().unwrap().is_err());

        let mut bytes = begin_frame(1);
        bytes[6] = 0xEE;
        let err = FrameReader::new(&bytes).next().unwrap().unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn damaged_length_is_not_mistaken_for_a_torn_tail() {
        let mut bytes = begin_frame(1);
        bytes.extend(begin_frame(2));
        // High byte of the first frame's length: the frame now claims to run
        // far past the end of the journal.
        bytes[10] ^= 0x40;

        let mut reader = FrameReader::new(&bytes);
        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(err, StoreError::ChecksumMismatch { offset: 0, .. }));
        assert!(!reader.is_torn());
        assert!(reader.next().is_none());
    }

    #[test]
    fn future_version_is_rejected() {
        let mut bytes = begin_frame(1);
        bytes[4..6].copy_from_slice(&(JOURNAL_VERSION + 1).to_le_bytes());
        assert!(FrameReader::new(&bytes).next().unwrap().is_err());
    }
}
