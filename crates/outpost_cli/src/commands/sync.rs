//! Sync command implementation.

use super::open_existing;
use outpost_engine::{
    HttpGateway, ManualConnectivity, ReqwestClient, SyncConfig, SyncEngine, SyncOutcome,
    SyncSummary, Trigger,
};
use outpost_store::DatasetName;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct SyncOutput<'a> {
    outcome: &'static str,
    status: String,
    summary: Option<&'a SyncSummary>,
    error: Option<String>,
}

/// Runs one manual sync cycle against `url`.
pub fn run(
    path: &Path,
    url: &str,
    datasets: &[String],
    timeout_secs: u64,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let datasets = datasets
        .iter()
        .map(DatasetName::new)
        .collect::<Result<Vec<_>, _>>()?;
    let config = SyncConfig::new(datasets).with_request_timeout(Duration::from_secs(timeout_secs));

    debug!(url, datasets = config.datasets.len(), "running one-shot sync");

    let store = Arc::new(open_existing(path)?);
    let gateway = Arc::new(HttpGateway::new(url, ReqwestClient::default()));
    // Reachability is left to the transport; a down backend surfaces as a pull error.
    let engine = SyncEngine::new(config, store, gateway, ManualConnectivity::shared(true));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let outcome = runtime.block_on(engine.trigger_sync(Trigger::Manual));

    report(&outcome, format)?;
    match outcome {
        SyncOutcome::Failed(err) => Err(err.into()),
        _ => Ok(()),
    }
}

fn report(outcome: &SyncOutcome, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if format == "json" {
        let output = SyncOutput {
            outcome: outcome.label(),
            status: outcome.to_string(),
            summary: outcome.summary(),
            error: outcome.error().map(ToString::to_string),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", outcome);
    if let Some(summary) = outcome.summary() {
        for (name, count) in &summary.pulled {
            println!("  pulled {:<20} {} records", name, count);
        }
        println!(
            "  pushed {} action(s): {} confirmed, {} rejected",
            summary.pushed_total, summary.pushed_succeeded, summary.pushed_failed
        );
        for failure in &summary.failures {
            println!("  ✗ {} ({}): {}", failure.id, failure.kind, failure.detail);
        }
    }
    Ok(())
}
