//! # Outpost Store
//!
//! Durable local storage for an offline-first client.
//!
//! The store holds two kinds of data:
//!
//! - **Reference datasets**: named collections (`products`, `customers`, ...)
//!   mirrored from the remote. They are only ever replaced wholesale, so a
//!   reader sees either the old copy or the new one.
//! - **The action queue**: user actions recorded while offline, kept in
//!   insertion order until the remote confirms each one by ID.
//!
//! ## Durability
//!
//! Every change is a transaction written to an append-only, checksummed
//! journal before it becomes visible. On open, committed transactions are
//! replayed on top of the last snapshot; a torn tail from a crash is dropped.
//! See [`journal`] for the frame format and recovery rules.
//!
//! ## Example
//!
//! ```rust
//! use outpost_store::{DatasetName, LocalStore, Record};
//! use serde_json::json;
//!
//! let store = LocalStore::open_in_memory().unwrap();
//! let customers = DatasetName::new("customers").unwrap();
//!
//! store.transaction(|txn| {
//!     txn.replace_dataset(customers.clone(), vec![Record::new("c1", json!({"name": "Ada"}))])?;
//!     txn.append_action(outpost_store::QueuedAction::new(
//!         outpost_store::ActionKind::new("visit.logged")?,
//!         json!({"customer": "c1"}),
//!     ))
//! }).unwrap();
//!
//! assert_eq!(store.read_all(&customers).len(), 1);
//! assert_eq!(store.queue_len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod config;
mod dir;
mod error;
mod snapshot;
mod state;
mod stats;
mod store;
mod transaction;
mod types;

pub mod inspect;
pub mod journal;

pub use config::StoreConfig;
pub use dir::StoreDir;
pub use error::{StoreError, StoreResult};
pub use state::Mutation;
pub use stats::{RecoveryReport, StoreStats};
pub use store::LocalStore;
pub use transaction::Transaction;
pub use types::{
    ActionId, ActionKind, DatasetName, QueuedAction, Record, RecordId, SequenceNumber,
    TransactionId, MAX_DATASET_NAME_LEN,
};
