//! Dump-journal command implementation.

use outpost_store::inspect;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct FrameOutput {
    offset: u64,
    len: usize,
    kind: String,
    txid: u64,
}

#[derive(Serialize)]
struct TransactionOutput {
    txid: u64,
    sequence: u64,
    mutations: Vec<&'static str>,
}

#[derive(Serialize)]
struct DumpOutput {
    frames: Vec<FrameOutput>,
    committed: Vec<TransactionOutput>,
    uncommitted: Vec<u64>,
    torn_tail: bool,
    discarded_bytes: u64,
}

/// Dumps journal frames and committed transactions.
pub fn run(path: &Path, limit: Option<usize>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = inspect::inspect_dir(path)?;
    let scan = &report.scan;
    let limit = limit.unwrap_or(usize::MAX);

    if format == "json" {
        let output = DumpOutput {
            frames: scan
                .frames
                .iter()
                .take(limit)
                .map(|f| FrameOutput {
                    offset: f.offset,
                    len: f.len,
                    kind: format!("{:?}", f.kind),
                    txid: f.txid.0,
                })
                .collect(),
            committed: scan
                .committed
                .iter()
                .map(|t| TransactionOutput {
                    txid: t.txid.0,
                    sequence: t.sequence.0,
                    mutations: t.mutations.iter().map(|m| m.label()).collect(),
                })
                .collect(),
            uncommitted: scan.uncommitted.iter().map(|t| t.0).collect(),
            torn_tail: scan.torn_tail,
            discarded_bytes: scan.discarded_bytes(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Journal: {} frame(s), {} bytes", scan.frames.len(), scan.total_len);
    println!();
    println!("{:>10}  {:>6}  {:<10} {}", "OFFSET", "LEN", "KIND", "TXID");
    for frame in scan.frames.iter().take(limit) {
        println!(
            "{:>10}  {:>6}  {:<10} {}",
            frame.offset,
            frame.len,
            format!("{:?}", frame.kind),
            frame.txid
        );
    }
    if scan.frames.len() > limit {
        println!("... {} more frame(s)", scan.frames.len() - limit);
    }

    println!();
    println!("Committed transactions");
    for txn in &scan.committed {
        let labels: Vec<_> = txn.mutations.iter().map(|m| m.label()).collect();
        println!("  txn {} seq {}: {}", txn.txid, txn.sequence, labels.join(", "));
    }
    if !scan.uncommitted.is_empty() {
        println!();
        println!("Uncommitted transactions: {}", scan.uncommitted.len());
    }
    if scan.torn_tail {
        println!("Torn tail: {} byte(s)", scan.discarded_bytes());
    }
    Ok(())
}
