//! # Outpost Testkit
//!
//! Test utilities for Outpost.
//!
//! This crate provides:
//! - Store fixtures backed by memory or a temporary directory
//! - Property-based generators for datasets, queues and submit outcomes
//! - A storage backend that fails on demand, for crash testing
//!
//! ## Usage
//!
//! ```rust
//! use outpost_testkit::prelude::*;
//! use serde_json::json;
//!
//! let store = TestStore::file();
//! store.enqueue("sale", json!({"total": 5})).unwrap();
//! let store = store.reopen();
//! assert_eq!(store.queue_len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
