//! Dataset command implementation.

use super::open_existing;
use outpost_store::DatasetName;
use std::path::Path;

/// Prints the records of one dataset.
pub fn run(path: &Path, name: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let name = DatasetName::new(name)?;
    let store = open_existing(path)?;

    if !store.has_dataset(&name) {
        return Err(format!("Dataset '{}' has never been synced", name).into());
    }
    let records = store.read_all(&name);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    println!("Dataset '{}': {} record(s)", name, records.len());
    for record in &records {
        println!("  {:<24} {}", record.id, record.body);
    }
    Ok(())
}
