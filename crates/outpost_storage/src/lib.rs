//! # Outpost Storage
//!
//! Byte-level storage for the Outpost local store.
//!
//! A backend is an **opaque, append-oriented byte store**. It knows nothing
//! about journal frames, datasets or queued actions; the store crate owns
//! every format decision.
//!
//! Two kinds of writes are supported:
//!
//! - `append` + `flush`/`sync` for the journal, where only the tail grows
//! - `replace` for whole-image files such as the snapshot, which must be
//!   swapped in atomically so a crash leaves either the old or the new image
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - shared in-process buffer, for tests and ephemeral stores
//! - [`FileBackend`] - a single OS file
//!
//! ## Example
//!
//! ```rust
//! use outpost_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut journal = InMemoryBackend::new();
//! journal.append(b"frame-1").unwrap();
//! journal.append(b"frame-2").unwrap();
//! assert_eq!(journal.read_all().unwrap(), b"frame-1frame-2");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
