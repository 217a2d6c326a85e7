//! Queue listing and enqueue commands.

use super::open_existing;
use std::path::Path;

/// Lists queued actions in insertion order.
pub fn list(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let queue = store.read_queue();

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&queue)?);
        return Ok(());
    }

    if queue.is_empty() {
        println!("Queue is empty");
        return Ok(());
    }

    println!("{} pending action(s)", queue.len());
    println!();
    for action in &queue {
        println!(
            "{}  {:<20} {}  {}",
            action.id,
            action.kind,
            action.created_at.to_rfc3339(),
            action.payload
        );
    }
    Ok(())
}

/// Records one action and prints its ID.
pub fn enqueue(path: &Path, kind: &str, payload: &str) -> Result<(), Box<dyn std::error::Error>> {
    let payload: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| format!("Invalid payload JSON: {}", e))?;

    let store = open_existing(path)?;
    let id = store.enqueue(kind, payload)?;
    println!("{}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use outpost_store::LocalStore;

    #[test]
    fn enqueue_appends_to_existing_store() {
        let dir = tempfile::tempdir().unwrap();
        drop(LocalStore::open(dir.path()).unwrap());

        enqueue(dir.path(), "sale", r#"{"total": 5}"#).unwrap();

        let store = LocalStore::open(dir.path()).unwrap();
        let queue = store.read_queue();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].kind.as_str(), "sale");
        assert_eq!(queue[0].payload, serde_json::json!({"total": 5}));
    }

    #[test]
    fn enqueue_rejects_bad_payload() {
        let dir = tempfile::tempdir().unwrap();
        drop(LocalStore::open(dir.path()).unwrap());

        assert!(enqueue(dir.path(), "sale", "{not json").is_err());
        assert_eq!(LocalStore::open(dir.path()).unwrap().queue_len(), 0);
    }
}
