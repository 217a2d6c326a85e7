//! Store configuration.

/// Configuration for opening a [`crate::LocalStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Create the store directory if it does not exist.
    pub create_if_missing: bool,

    /// Fail if the directory already holds a store.
    pub error_if_exists: bool,

    /// Fsync the journal on every commit. Turning this off trades crash
    /// durability of the latest commits for throughput.
    pub sync_on_commit: bool,

    /// Journal size that triggers an automatic checkpoint after a commit
    /// (0 disables automatic checkpoints).
    pub max_journal_size: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            sync_on_commit: true,
            max_journal_size: 16 * 1024 * 1024,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create a missing directory.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether an existing store is an error.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets whether commits are fsynced.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the automatic checkpoint threshold.
    #[must_use]
    pub const fn max_journal_size(mut self, bytes: u64) -> Self {
        self.max_journal_size = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_durable() {
        let config = StoreConfig::default();
        assert!(config.create_if_missing);
        assert!(!config.error_if_exists);
        assert!(config.sync_on_commit);
        assert!(config.max_journal_size > 0);
    }

    #[test]
    fn builder() {
        let config = StoreConfig::new()
            .create_if_missing(false)
            .sync_on_commit(false)
            .max_journal_size(0);
        assert!(!config.create_if_missing);
        assert!(!config.sync_on_commit);
        assert_eq!(config.max_journal_size, 0);
    }
}
