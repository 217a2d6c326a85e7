//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level byte store.
///
/// # Invariants
///
/// - `append` returns the offset the data was written at
/// - `read_at` returns exactly the bytes previously written there
/// - after `sync` returns, every appended byte survives process termination
/// - `replace` is all-or-nothing: a concurrent crash observes either the
///   previous contents or the new contents, never a mix
///
/// Backends must be `Send + Sync`; the store wraps them in its own lock.
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if the range extends past
    /// the current size, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data at the end and returns the offset it was written at.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. A failed append may leave a
    /// partial tail; callers roll back with [`StorageBackend::truncate`].
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Forces data and metadata to durable media.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes, i.e. the offset of the next append.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Cuts the storage down to `new_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::TruncateBeyondEnd`] if `new_size` is
    /// larger than the current size.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Atomically replaces the entire contents with `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the replacement could not be made durable; the
    /// previous contents are then still in place.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Reads the whole contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        let len = usize::try_from(size).map_err(|_| {
            crate::StorageError::unavailable(format!("{size} bytes do not fit in memory"))
        })?;
        self.read_at(0, len)
    }
}

impl<B: StorageBackend + ?Sized> StorageBackend for Box<B> {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        (**self).read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        (**self).append(data)
    }

    fn flush(&mut self) -> StorageResult<()> {
        (**self).flush()
    }

    fn sync(&mut self) -> StorageResult<()> {
        (**self).sync()
    }

    fn size(&self) -> StorageResult<u64> {
        (**self).size()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        (**self).truncate(new_size)
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        (**self).replace(data)
    }

    fn read_all(&self) -> StorageResult<Vec<u8>> {
        (**self).read_all()
    }
}
