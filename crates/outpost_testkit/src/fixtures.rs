//! Store fixtures and small data helpers.
//!
//! A [`TestStore`] owns whatever keeps its data alive (a temporary directory
//! or shared in-memory buffers), so a test can drop the store and
//! [`reopen`](TestStore::reopen) it to exercise recovery.

use outpost_storage::InMemoryBackend;
use outpost_store::{DatasetName, LocalStore, Record, StoreConfig};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: LocalStore,
    origin: Origin,
}

enum Origin {
    Memory {
        journal: InMemoryBackend,
        snapshot: InMemoryBackend,
        config: StoreConfig,
    },
    Dir(TempDir),
}

impl TestStore {
    /// Creates a store over in-memory buffers that survive [`TestStore::reopen`].
    pub fn memory() -> Self {
        Self::memory_with_config(StoreConfig::default())
    }

    /// Creates an in-memory store with `config`.
    pub fn memory_with_config(config: StoreConfig) -> Self {
        let journal = InMemoryBackend::new();
        let snapshot = InMemoryBackend::new();
        Self::open_memory(journal, snapshot, config)
    }

    /// Creates a store in a fresh temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = LocalStore::open(temp_dir.path()).expect("Failed to open file store");
        Self {
            store,
            origin: Origin::Dir(temp_dir),
        }
    }

    /// Drops the store and opens it again from the same data, running recovery.
    pub fn reopen(self) -> Self {
        let Self { store, origin } = self;
        drop(store);
        match origin {
            Origin::Memory {
                journal,
                snapshot,
                config,
            } => Self::open_memory(journal, snapshot, config),
            Origin::Dir(temp_dir) => {
                let store = LocalStore::open(temp_dir.path()).expect("Failed to reopen store");
                Self {
                    store,
                    origin: Origin::Dir(temp_dir),
                }
            }
        }
    }

    /// Directory of a file-based store, `None` in memory.
    pub fn dir(&self) -> Option<&Path> {
        match &self.origin {
            Origin::Dir(temp_dir) => Some(temp_dir.path()),
            Origin::Memory { .. } => None,
        }
    }

    /// The raw journal buffer of an in-memory store.
    pub fn journal_buffer(&self) -> Option<&InMemoryBackend> {
        match &self.origin {
            Origin::Memory { journal, .. } => Some(journal),
            Origin::Dir(_) => None,
        }
    }

    fn open_memory(journal: InMemoryBackend, snapshot: InMemoryBackend, config: StoreConfig) -> Self {
        let store = LocalStore::open_with_backends(
            Box::new(journal.clone()),
            Box::new(snapshot.clone()),
            config.clone(),
        )
        .expect("Failed to open in-memory store");
        Self {
            store,
            origin: Origin::Memory {
                journal,
                snapshot,
                config,
            },
        }
    }
}

impl std::ops::Deref for TestStore {
    type Target = LocalStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary file-based store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&LocalStore) -> R,
{
    let store = TestStore::file();
    f(&store)
}

/// Builds a dataset name, panicking on an invalid one.
pub fn dataset(name: &str) -> DatasetName {
    DatasetName::new(name).expect("Invalid dataset name")
}

/// Builds records with the given IDs and a small body naming each.
pub fn records(ids: &[&str]) -> Vec<Record> {
    ids.iter()
        .map(|id| Record::new(*id, json!({ "name": format!("record {id}") })))
        .collect()
}

/// IDs of `records`, in order.
pub fn record_ids(records: &[Record]) -> Vec<String> {
    records.iter().map(|r| r.id.to_string()).collect()
}
