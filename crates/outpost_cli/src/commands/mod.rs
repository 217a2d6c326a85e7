//! CLI command implementations.

pub mod compact;
pub mod dataset;
pub mod dump_journal;
pub mod inspect;
pub mod queue;
pub mod sync;
pub mod verify;

use outpost_store::{LocalStore, StoreConfig, StoreResult};
use std::path::Path;

/// Opens an existing store; never creates one.
pub fn open_existing(path: &Path) -> StoreResult<LocalStore> {
    LocalStore::open_with_config(path, StoreConfig::new().create_if_missing(false))
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_readable() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn open_existing_does_not_create() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nothing-here");
        assert!(open_existing(&missing).is_err());
        assert!(!missing.exists());
    }
}
