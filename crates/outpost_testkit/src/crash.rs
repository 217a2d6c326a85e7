//! Fault injection for crash-safety tests.
//!
//! [`CrashableBackend`] wraps any [`StorageBackend`] and fails writes on
//! command. The controlling [`CrashSwitch`] is shared, so a test keeps it
//! after handing the backend to a store.

use outpost_storage::{StorageBackend, StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Shared controls of a [`CrashableBackend`].
#[derive(Debug)]
pub struct CrashSwitch {
    crash_after_bytes: AtomicU64,
    bytes_written: AtomicU64,
    crashed: AtomicBool,
    fail_on_flush: AtomicBool,
    fail_on_replace: AtomicBool,
}

impl CrashSwitch {
    fn new() -> Self {
        Self {
            crash_after_bytes: AtomicU64::new(u64::MAX),
            bytes_written: AtomicU64::new(0),
            crashed: AtomicBool::new(false),
            fail_on_flush: AtomicBool::new(false),
            fail_on_replace: AtomicBool::new(false),
        }
    }

    /// Crashes once `bytes` more bytes have been appended; the write that
    /// crosses the limit lands only partially.
    pub fn crash_after(&self, bytes: u64) {
        let written = self.bytes_written.load(Ordering::SeqCst);
        self.crash_after_bytes
            .store(written.saturating_add(bytes), Ordering::SeqCst);
    }

    /// Sets whether flush and sync should fail.
    pub fn set_fail_on_flush(&self, fail: bool) {
        self.fail_on_flush.store(fail, Ordering::SeqCst);
    }

    /// Sets whether whole-content replacement should fail.
    pub fn set_fail_on_replace(&self, fail: bool) {
        self.fail_on_replace.store(fail, Ordering::SeqCst);
    }

    /// Disarms every fault and clears the crashed flag.
    pub fn reset(&self) {
        self.crash_after_bytes.store(u64::MAX, Ordering::SeqCst);
        self.crashed.store(false, Ordering::SeqCst);
        self.fail_on_flush.store(false, Ordering::SeqCst);
        self.fail_on_replace.store(false, Ordering::SeqCst);
    }

    /// Returns whether a fault has fired.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    fn fire(&self, what: &str) -> StorageError {
        self.crashed.store(true, Ordering::SeqCst);
        StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("simulated crash during {what}"),
        ))
    }
}

/// A storage backend wrapper that can simulate crashes.
pub struct CrashableBackend<B> {
    inner: B,
    switch: Arc<CrashSwitch>,
}

impl<B: StorageBackend> CrashableBackend<B> {
    /// Wraps `inner`, initially with no fault armed.
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            switch: Arc::new(CrashSwitch::new()),
        }
    }

    /// The shared fault controls.
    pub fn switch(&self) -> Arc<CrashSwitch> {
        Arc::clone(&self.switch)
    }
}

impl<B: StorageBackend> StorageBackend for CrashableBackend<B> {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let len = data.len() as u64;
        let current = self.switch.bytes_written.fetch_add(len, Ordering::SeqCst);
        let threshold = self.switch.crash_after_bytes.load(Ordering::SeqCst);

        if current >= threshold {
            return Err(self.switch.fire("write"));
        }
        if current + len > threshold {
            let partial = usize::try_from(threshold - current).unwrap_or(data.len());
            if partial > 0 {
                let _ = self.inner.append(&data[..partial]);
            }
            return Err(self.switch.fire("partial write"));
        }
        self.inner.append(data)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.switch.fail_on_flush.load(Ordering::SeqCst) {
            return Err(self.switch.fire("flush"));
        }
        self.inner.flush()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.switch.fail_on_flush.load(Ordering::SeqCst) {
            return Err(self.switch.fire("sync"));
        }
        self.inner.sync()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        if self.switch.fail_on_replace.load(Ordering::SeqCst) {
            return Err(self.switch.fire("replace"));
        }
        self.inner.replace(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outpost_storage::InMemoryBackend;

    #[test]
    fn partial_write_lands_up_to_limit() {
        let memory = InMemoryBackend::new();
        let mut backend = CrashableBackend::new(memory.clone());
        let switch = backend.switch();

        backend.append(b"abc").unwrap();
        switch.crash_after(2);
        assert!(backend.append(b"defg").is_err());
        assert!(switch.has_crashed());
        assert_eq!(memory.bytes(), b"abcde");

        assert!(backend.append(b"h").is_err());
        switch.reset();
        backend.append(b"h").unwrap();
        assert_eq!(memory.bytes(), b"abcdeh");
    }

    #[test]
    fn flush_fault_fires() {
        let mut backend = CrashableBackend::new(InMemoryBackend::new());
        backend.switch().set_fail_on_flush(true);
        assert!(backend.flush().is_err());
        assert!(backend.sync().is_err());
        assert!(backend.switch().has_crashed());
    }
}
