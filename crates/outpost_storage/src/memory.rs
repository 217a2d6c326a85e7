//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// An in-memory backend.
///
/// Clones share the same buffer. A test can hand one clone to a store, drop
/// the store, and inspect or reopen the bytes through the other clone, which
/// is how crash and recovery scenarios are exercised without a filesystem.
///
/// ```rust
/// use outpost_storage::{InMemoryBackend, StorageBackend};
///
/// let observer = InMemoryBackend::new();
/// let mut writer = observer.clone();
/// writer.append(b"shared").unwrap();
/// assert_eq!(observer.bytes(), b"shared");
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    data: Arc<RwLock<Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend preloaded with `data`.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Returns a copy of the current contents.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Overwrites the byte at `offset`, if present. Used to simulate bit rot.
    pub fn corrupt_byte(&self, offset: usize) {
        if let Some(byte) = self.data.write().get_mut(offset) {
            *byte ^= 0xFF;
        }
    }

    /// Drops everything after `len` without the bounds check of `truncate`.
    /// Used to simulate a torn write.
    pub fn chop(&self, len: usize) {
        self.data.write().truncate(len);
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let end = offset.saturating_add(len as u64);
        if end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        let start = offset as usize;
        Ok(data[start..start + len].to_vec())
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }
        data.truncate(new_size as usize);
        Ok(())
    }

    fn replace(&mut self, bytes: &[u8]) -> StorageResult<()> {
        *self.data.write() = bytes.to_vec();
        Ok(())
    }
}
