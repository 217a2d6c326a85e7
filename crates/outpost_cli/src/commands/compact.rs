//! Compact command implementation.

use super::{format_size, open_existing};
use outpost_store::inspect;
use std::path::Path;

/// Writes a snapshot and truncates the journal.
pub fn run(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("Store not found: {}", path.display()).into());
    }

    if dry_run {
        let report = inspect::inspect_dir(path)?;
        println!("Dry run: no changes will be made");
        println!(
            "  Would fold {} committed transaction(s) into a snapshot",
            report.scan.committed.len()
        );
        println!("  Journal size: {}", format_size(report.scan.total_len));
        return Ok(());
    }

    let store = open_existing(path)?;
    let before = store.stats()?.journal_bytes;
    store.checkpoint()?;
    let after = store.stats()?.journal_bytes;

    println!("Compacted store at: {}", path.display());
    println!("  Journal before: {}", format_size(before));
    println!("  Journal after:  {}", format_size(after));
    println!("  Sequence:       {}", store.committed_sequence());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use outpost_store::LocalStore;

    #[test]
    fn compact_keeps_contents() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LocalStore::open(dir.path()).unwrap();
            store.enqueue("sale", serde_json::json!({"n": 1})).unwrap();
        }

        run(dir.path(), false).unwrap();

        let report = inspect::inspect_dir(dir.path()).unwrap();
        assert!(report.scan.committed.is_empty());
        assert!(report.snapshot_sequence.is_some());
        assert_eq!(LocalStore::open(dir.path()).unwrap().queue_len(), 1);
    }
}
