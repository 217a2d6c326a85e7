//! Verify command implementation.

use outpost_store::inspect;
use std::path::Path;

/// Runs the verify command.
///
/// Checks the snapshot and every journal frame without repairing anything.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("Store not found: {}", path.display()).into());
    }

    println!("Verifying store at: {}", path.display());
    println!();

    let report = match inspect::inspect_dir(path) {
        Ok(report) => report,
        Err(e) => {
            println!("✗ Verification failed: {}", e);
            return Err(e.into());
        }
    };

    match report.snapshot_sequence {
        Some(seq) => println!("  Snapshot:       sequence {} ({} bytes)", seq, report.snapshot_bytes),
        None => println!("  Snapshot:       none"),
    }
    println!("  Frames:         {}", report.scan.frames.len());
    println!("  Committed:      {}", report.scan.committed.len());
    println!("  Uncommitted:    {}", report.scan.uncommitted.len());
    println!("  Sequence:       {}", report.effective_sequence());
    println!();

    if report.needs_repair() {
        println!(
            "⚠ {} trailing byte(s) would be discarded on next open{}",
            report.scan.discarded_bytes(),
            if report.scan.torn_tail { " (torn tail)" } else { "" }
        );
    }
    println!("✓ Verification passed");
    Ok(())
}
