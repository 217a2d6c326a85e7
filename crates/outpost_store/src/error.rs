//! Error types for the local store.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the local store.
///
/// Any of these surfacing from a sync cycle is a `LocalStorageError`: the
/// cycle aborts and nothing it attempted to write is visible.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] outpost_storage::StorageError),

    /// I/O error outside a backend (directory, lock file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Journal or snapshot bytes are damaged.
    #[error("store corrupted: {message}")]
    Corrupted {
        /// Description of the damage.
        message: String,
    },

    /// A frame's checksum does not match its contents.
    #[error("checksum mismatch at offset {offset}: stored {stored:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Offset of the damaged frame.
        offset: u64,
        /// Checksum read from disk.
        stored: u32,
        /// Checksum computed over the frame.
        computed: u32,
    },

    /// A value could not be encoded.
    #[error("encoding failed: {message}")]
    Encoding {
        /// Encoder message.
        message: String,
    },

    /// Another process holds the store directory.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// The directory is missing or is not a store.
    #[error("invalid store directory: {message}")]
    InvalidDirectory {
        /// Description of the problem.
        message: String,
    },

    /// A caller supplied an argument the store cannot accept.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },
}

impl StoreError {
    /// Creates a [`StoreError::Corrupted`] error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates a [`StoreError::Encoding`] error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Creates a [`StoreError::InvalidDirectory`] error.
    pub fn invalid_directory(message: impl Into<String>) -> Self {
        Self::InvalidDirectory {
            message: message.into(),
        }
    }

    /// Creates a [`StoreError::InvalidArgument`] error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Returns true if the error means on-disk data is damaged.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupted { .. } | Self::ChecksumMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corruption_classification() {
        assert!(StoreError::corrupted("bad magic").is_corruption());
        assert!(StoreError::ChecksumMismatch {
            offset: 0,
            stored: 1,
            computed: 2
        }
        .is_corruption());
        assert!(!StoreError::Locked.is_corruption());
        assert!(!StoreError::invalid_argument("empty kind").is_corruption());
    }

    #[test]
    fn messages_carry_detail() {
        let err = StoreError::ChecksumMismatch {
            offset: 64,
            stored: 0xdead_beef,
            computed: 0x0000_0001,
        };
        let text = err.to_string();
        assert!(text.contains("offset 64"));
        assert!(text.contains("deadbeef"));
    }
}
