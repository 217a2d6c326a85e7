//! End-to-end sync scenarios against a scripted remote.

mod common;

use common::Rig;
use outpost_engine::{SyncError, SyncOutcome, Trigger};
use outpost_store::Record;
use outpost_testkit::{dataset, record_ids};
use serde_json::json;

#[tokio::test]
async fn all_confirmed_actions_leave_the_queue() {
    let rig = Rig::new(&[]);
    for n in 1..=3 {
        rig.engine.enqueue("sale", json!({ "sale": n })).unwrap();
    }

    let outcome = rig.engine.trigger_sync(Trigger::Manual).await;

    let summary = outcome.summary().expect("cycle should succeed");
    assert_eq!(summary.pushed_total, 3);
    assert_eq!(summary.pushed_succeeded, 3);
    assert_eq!(summary.pushed_failed, 0);
    assert_eq!(rig.store.queue_len(), 0);
    assert_eq!(rig.gateway.submit_calls(), 1);
    assert_eq!(rig.gateway.applied().len(), 3);
}

#[tokio::test]
async fn pulled_dataset_replaces_local_copy_exactly() {
    let rig = Rig::new(&["products"]);
    let products = dataset("products");
    let widget = Record::new(1u64, json!({"id": 1, "name": "Widget"}));
    rig.gateway.set_dataset(products.clone(), vec![widget.clone()]);

    let outcome = rig.engine.trigger_sync(Trigger::Manual).await;

    let summary = outcome.summary().expect("cycle should succeed");
    assert_eq!(summary.pushed_total, 0);
    assert_eq!(summary.pulled.get(&products), Some(&1));
    assert_eq!(rig.store.read_all(&products), vec![widget]);
    assert_eq!(rig.gateway.submit_calls(), 0);
}

#[tokio::test]
async fn offline_attempt_changes_nothing() {
    let rig = Rig::new(&["products"]);
    let products = dataset("products");
    rig.store
        .replace_all(&products, outpost_testkit::records(&["old"]))
        .unwrap();
    rig.engine.enqueue("sale", json!({"total": 4})).unwrap();
    rig.gateway
        .set_dataset(products.clone(), outpost_testkit::records(&["new"]));
    rig.network.set_reachable(false);
    let before = rig.contents();
    let sequence = rig.store.committed_sequence();

    let outcome = rig.engine.trigger_sync(Trigger::Manual).await;

    assert!(matches!(
        outcome,
        SyncOutcome::Failed(SyncError::NetworkUnavailable)
    ));
    assert_eq!(outcome.to_string(), "sync not attempted: network unavailable");
    assert_eq!(rig.contents(), before);
    assert_eq!(rig.store.committed_sequence(), sequence);
    assert_eq!(rig.gateway.pull_calls(), 0);
    assert_eq!(rig.gateway.submit_calls(), 0);
}

#[tokio::test]
async fn rejected_actions_stay_queued_verbatim() {
    let rig = Rig::new(&[]);
    let ids: Vec<_> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|tag| rig.engine.enqueue("sale", json!({ "tag": tag })).unwrap())
        .collect();
    let before = rig.store.read_queue();
    rig.gateway.reject(ids[3], "price changed");
    rig.gateway.reject(ids[4], "customer closed");

    let outcome = rig.engine.trigger_sync(Trigger::Manual).await;

    let summary = outcome.summary().expect("partial failure is still success");
    assert_eq!(summary.pushed_total, 5);
    assert_eq!(summary.pushed_succeeded, 3);
    assert_eq!(summary.pushed_failed, 2);
    let failed: Vec<_> = summary.failures.iter().map(|f| f.id).collect();
    assert_eq!(failed, vec![ids[3], ids[4]]);
    assert_eq!(summary.failures[0].detail, "price changed");
    assert_eq!(outcome.label(), "partial");

    assert_eq!(rig.store.read_queue(), before[3..].to_vec());
}

#[tokio::test]
async fn every_action_rejected_still_commits_the_pull() {
    let rig = Rig::new(&["products"]);
    let products = dataset("products");
    rig.store
        .replace_all(&products, outpost_testkit::records(&["p-old"]))
        .unwrap();
    rig.gateway
        .set_dataset(products.clone(), outpost_testkit::records(&["p1", "p2"]));
    let ids: Vec<_> = (1..=3)
        .map(|n| rig.engine.enqueue("sale", json!({ "sale": n })).unwrap())
        .collect();
    for id in &ids {
        rig.gateway.reject(*id, "stock exhausted");
    }
    let before = rig.store.read_queue();

    let outcome = rig.engine.trigger_sync(Trigger::Manual).await;

    assert!(outcome.is_succeeded());
    assert_eq!(outcome.label(), "partial");
    let summary = outcome.summary().unwrap();
    assert_eq!(summary.pulled.get(&products), Some(&2));
    assert_eq!(summary.pushed_total, 3);
    assert_eq!(summary.pushed_succeeded, 0);
    assert_eq!(summary.pushed_failed, 3);
    assert_eq!(
        outcome.to_string(),
        "sync completed with partial failures: 3 of 3 actions rejected and kept for retry"
    );

    assert_eq!(record_ids(&rig.store.read_all(&products)), vec!["p1", "p2"]);
    assert_eq!(rig.store.read_queue(), before);
    assert!(rig.gateway.applied().is_empty());
    assert!(rig.engine.current_state().last_sync_at.is_some());
    assert_eq!(rig.engine.stats().cycles_succeeded, 1);
    assert_eq!(rig.engine.stats().actions_failed, 3);
}

#[tokio::test]
async fn second_trigger_during_pull_is_skipped() {
    let rig = Rig::new(&["products"]);
    rig.engine.enqueue("sale", json!({})).unwrap();
    rig.gateway.pause();

    let first = tokio::spawn({
        let engine = rig.engine.clone();
        async move { engine.trigger_sync(Trigger::Manual).await }
    });
    rig.wait_running().await;
    common::wait_until(|| rig.gateway.pull_calls() == 1).await;

    let second = rig.engine.trigger_sync(Trigger::Manual).await;
    assert!(second.is_skipped());
    assert_eq!(second.to_string(), "sync skipped: another sync is already running");

    rig.gateway.resume();
    let first = first.await.unwrap();
    assert!(first.is_succeeded());
    assert_eq!(rig.gateway.pull_calls(), 1);
    assert_eq!(rig.gateway.submit_calls(), 1);
    assert_eq!(rig.engine.stats().cycles_skipped, 1);
}

#[tokio::test]
async fn failed_pull_leaves_every_dataset_untouched() {
    let rig = Rig::new(&["products", "customers"]);
    let products = dataset("products");
    let customers = dataset("customers");
    rig.store
        .replace_all(&products, outpost_testkit::records(&["p-old"]))
        .unwrap();
    rig.engine.enqueue("visit", json!({})).unwrap();
    rig.gateway
        .set_dataset(products.clone(), outpost_testkit::records(&["p-new"]));
    rig.gateway.fail_pull(
        customers,
        outpost_engine::GatewayError::Rejected("403 forbidden".into()),
    );

    let outcome = rig.engine.trigger_sync(Trigger::Manual).await;

    let err = outcome.error().expect("cycle should fail");
    assert_eq!(err.phase(), Some(outpost_engine::SyncPhase::Pull));
    assert_eq!(record_ids(&rig.store.read_all(&products)), vec!["p-old"]);
    assert_eq!(rig.store.queue_len(), 1);
    assert_eq!(rig.gateway.submit_calls(), 0);
}

#[tokio::test]
async fn failed_submit_keeps_the_pull() {
    let rig = Rig::new(&["products"]);
    let products = dataset("products");
    rig.gateway
        .set_dataset(products.clone(), outpost_testkit::records(&["p1", "p2"]));
    rig.engine.enqueue("sale", json!({})).unwrap();
    rig.gateway.fail_submit(Some(outpost_engine::GatewayError::transport_retryable(
        "connection reset",
    )));

    let outcome = rig.engine.trigger_sync(Trigger::Manual).await;

    let err = outcome.error().expect("cycle should fail");
    assert_eq!(err.phase(), Some(outpost_engine::SyncPhase::Push));
    assert!(err.is_retryable());
    assert_eq!(record_ids(&rig.store.read_all(&products)), vec!["p1", "p2"]);
    assert_eq!(rig.store.queue_len(), 1);
    assert!(rig.engine.current_state().last_sync_at.is_none());
}
