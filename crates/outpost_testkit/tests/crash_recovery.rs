//! Crash-safety tests: injected write failures and torn journals.

use outpost_storage::InMemoryBackend;
use outpost_store::{LocalStore, StoreConfig};
use outpost_testkit::prelude::*;
use serde_json::json;
use std::sync::Arc;

struct Harness {
    store: LocalStore,
    journal: InMemoryBackend,
    snapshot: InMemoryBackend,
    journal_switch: Arc<CrashSwitch>,
    snapshot_switch: Arc<CrashSwitch>,
}

impl Harness {
    fn new() -> Self {
        let journal = InMemoryBackend::new();
        let snapshot = InMemoryBackend::new();
        let journal_backend = CrashableBackend::new(journal.clone());
        let snapshot_backend = CrashableBackend::new(snapshot.clone());
        let journal_switch = journal_backend.switch();
        let snapshot_switch = snapshot_backend.switch();
        let store = LocalStore::open_with_backends(
            Box::new(journal_backend),
            Box::new(snapshot_backend),
            StoreConfig::default(),
        )
        .unwrap();
        Self {
            store,
            journal,
            snapshot,
            journal_switch,
            snapshot_switch,
        }
    }

    /// Opens a fresh store over whatever bytes made it to the buffers.
    fn recover(&self) -> LocalStore {
        LocalStore::open_with_backends(
            Box::new(self.journal.clone()),
            Box::new(self.snapshot.clone()),
            StoreConfig::default(),
        )
        .unwrap()
    }
}

#[test]
fn failed_append_leaves_previous_contents() {
    let h = Harness::new();
    let products = dataset("products");
    h.store.replace_all(&products, records(&["a", "b"])).unwrap();
    let committed = h.journal.bytes();

    h.journal_switch.crash_after(7);
    assert!(h.store.replace_all(&products, records(&["c"])).is_err());
    assert!(h.journal_switch.has_crashed());

    assert_eq!(record_ids(&h.store.read_all(&products)), vec!["a", "b"]);
    assert_eq!(h.journal.bytes(), committed);
    drop(h.store);

    let recovered = LocalStore::open_with_backends(
        Box::new(h.journal.clone()),
        Box::new(h.snapshot.clone()),
        StoreConfig::default(),
    )
    .unwrap();
    assert_eq!(record_ids(&recovered.read_all(&products)), vec!["a", "b"]);
}

#[test]
fn failed_flush_drops_the_queued_action() {
    let h = Harness::new();
    let kept = h.store.enqueue("sale", json!({"n": 1})).unwrap();

    h.journal_switch.set_fail_on_flush(true);
    assert!(h.store.enqueue("sale", json!({"n": 2})).is_err());
    h.journal_switch.reset();

    let ids: Vec<_> = h.store.read_queue().into_iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![kept]);

    // The store keeps working once the fault clears.
    h.store.enqueue("sale", json!({"n": 3})).unwrap();
    assert_eq!(h.recover().queue_len(), 2);
}

#[test]
fn failed_remove_keeps_every_action() {
    let h = Harness::new();
    let a = h.store.enqueue("sale", json!({})).unwrap();
    let b = h.store.enqueue("sale", json!({})).unwrap();

    h.journal_switch.crash_after(0);
    assert!(h.store.remove_by_ids(&[a]).is_err());
    assert_eq!(h.store.queue_len(), 2);

    h.journal_switch.reset();
    assert_eq!(h.store.remove_by_ids(&[a]).unwrap(), 1);
    let ids: Vec<_> = h.recover().read_queue().into_iter().map(|q| q.id).collect();
    assert_eq!(ids, vec![b]);
}

#[test]
fn failed_checkpoint_keeps_the_journal() {
    let h = Harness::new();
    let customers = dataset("customers");
    h.store.replace_all(&customers, records(&["c1"])).unwrap();
    let journal_before = h.journal.bytes();

    h.snapshot_switch.set_fail_on_replace(true);
    assert!(h.store.checkpoint().is_err());
    assert_eq!(h.journal.bytes(), journal_before);
    assert!(h.snapshot.bytes().is_empty());

    let recovered = h.recover();
    assert_eq!(record_ids(&recovered.read_all(&customers)), vec!["c1"]);
}

#[test]
fn every_torn_prefix_recovers_the_last_commit() {
    let store = TestStore::memory();
    let products = dataset("products");
    store.replace_all(&products, records(&["a"])).unwrap();
    let journal = store.journal_buffer().unwrap().clone();
    let committed_len = journal.bytes().len();

    store
        .transaction(|txn| {
            txn.replace_dataset(products.clone(), records(&["x", "y"]))?;
            txn.append_action(outpost_store::QueuedAction::new(
                outpost_store::ActionKind::new("sale")?,
                json!({"n": 1}),
            ))
        })
        .unwrap();
    let full = journal.bytes();
    drop(store);

    for cut in committed_len..full.len() {
        let torn = InMemoryBackend::with_data(full[..cut].to_vec());
        let recovered = LocalStore::open_with_backends(
            Box::new(torn.clone()),
            Box::new(InMemoryBackend::new()),
            StoreConfig::default(),
        )
        .unwrap_or_else(|e| panic!("cut at {cut} failed to open: {e}"));

        assert_eq!(record_ids(&recovered.read_all(&products)), vec!["a"], "cut at {cut}");
        assert_eq!(recovered.queue_len(), 0, "cut at {cut}");
        assert_eq!(torn.bytes().len(), committed_len, "cut at {cut}");
    }
}

#[test]
fn recovery_after_checkpoint_and_torn_tail() {
    let store = TestStore::memory();
    let products = dataset("products");
    store.replace_all(&products, records(&["a", "b"])).unwrap();
    store.checkpoint().unwrap();
    store.enqueue("sale", json!({"n": 1})).unwrap();
    let journal = store.journal_buffer().unwrap().clone();
    let len = journal.bytes().len();
    journal.chop(len - 3);

    let store = store.reopen();
    assert_eq!(record_ids(&store.read_all(&products)), vec!["a", "b"]);
    assert_eq!(store.queue_len(), 0);
    let report = store.recovery_report();
    assert!(report.snapshot_sequence.is_some());
    assert!(report.truncated_bytes > 0);
    assert_eq!(report.replayed, 0);
}
