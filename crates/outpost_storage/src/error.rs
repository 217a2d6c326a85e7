//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by a [`crate::StorageBackend`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read extended beyond the end of the stored bytes.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: usize,
        /// Current size.
        size: u64,
    },

    /// A truncate asked to grow the storage.
    #[error("cannot truncate to {requested} bytes: storage holds only {size}")]
    TruncateBeyondEnd {
        /// Requested new size.
        requested: u64,
        /// Current size.
        size: u64,
    },

    /// The backend refused the operation (used by fault-injecting backends).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Creates an [`StorageError::Unavailable`] error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}
