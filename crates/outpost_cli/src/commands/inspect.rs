//! Inspect command implementation.

use super::{format_size, open_existing};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct InspectOutput<'a> {
    path: &'a Path,
    stats: &'a outpost_store::StoreStats,
    recovery: &'a outpost_store::RecoveryReport,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("Store not found: {}", path.display()).into());
    }

    let store = open_existing(path)?;
    let stats = store.stats()?;
    let recovery = store.recovery_report();

    if format == "json" {
        let output = InspectOutput {
            path,
            stats: &stats,
            recovery: &recovery,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Store: {}", path.display());
    println!();
    println!("Journal");
    println!("  Size:               {}", format_size(stats.journal_bytes));
    println!("  Committed sequence: {}", stats.committed_sequence);
    println!();
    println!("Recovery");
    match recovery.snapshot_sequence {
        Some(seq) => println!("  Snapshot sequence:  {}", seq),
        None => println!("  Snapshot sequence:  none"),
    }
    println!("  Replayed:           {}", recovery.replayed);
    println!("  Skipped:            {}", recovery.skipped);
    println!("  Discarded:          {}", recovery.discarded);
    println!("  Truncated:          {}", format_size(recovery.truncated_bytes));
    println!();
    println!("Datasets ({})", stats.datasets.len());
    for (name, count) in &stats.datasets {
        println!("  {:<20} {} records", name, count);
    }
    println!();
    println!("Queue");
    println!("  Pending actions:    {}", stats.queued_actions);
    if let Some(oldest) = stats.oldest_action_at {
        println!("  Oldest:             {}", oldest.to_rfc3339());
    }

    Ok(())
}
