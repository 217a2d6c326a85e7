//! Reconnect and periodic triggers.

mod common;

use common::{wait_until, Rig};
use outpost_engine::{AutoSync, RetryConfig, SyncConfig, Trigger};
use outpost_store::LocalStore;
use outpost_testkit::{dataset, records};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn reconnect_flushes_the_queue() {
    let rig = Rig::new(&["products"]);
    rig.network.set_reachable(false);
    let handle = AutoSync::start(rig.engine.clone());

    rig.engine.enqueue("sale", json!({"offline": true})).unwrap();
    assert!(rig.engine.trigger_sync(Trigger::Manual).await.error().is_some());

    rig.network.set_reachable(true);
    wait_until(|| rig.store.queue_len() == 0).await;
    assert_eq!(rig.gateway.submit_calls(), 1);
    assert!(rig.engine.current_state().last_sync_at.is_some());

    handle.shutdown().await;
}

#[tokio::test]
async fn going_offline_triggers_nothing() {
    let rig = Rig::new(&["products"]);
    let handle = AutoSync::start(rig.engine.clone());

    rig.network.set_reachable(false);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(rig.gateway.pull_calls(), 0);
    assert!(rig.engine.current_state().last_outcome.is_none());
    handle.shutdown().await;
}

#[tokio::test]
async fn periodic_sync_repeats() {
    let config = SyncConfig::new([dataset("products")])
        .with_sync_interval(Duration::from_millis(20))
        .with_retry(RetryConfig::no_retry());
    let rig = Rig::with_config(LocalStore::open_in_memory().unwrap(), config);
    rig.gateway.set_dataset(dataset("products"), records(&["p1"]));

    let handle = AutoSync::start(rig.engine.clone());
    wait_until(|| rig.engine.stats().cycles_succeeded >= 3).await;
    handle.shutdown().await;

    assert_eq!(rig.store.read_all(&dataset("products")), records(&["p1"]));
}

#[tokio::test]
async fn shutdown_unsubscribes() {
    let rig = Rig::new(&["products"]);
    rig.network.set_reachable(false);
    let handle = AutoSync::start(rig.engine.clone());
    assert_eq!(rig.network.subscriber_count(), 1);
    assert!(handle.is_running());

    handle.shutdown().await;
    assert_eq!(rig.network.subscriber_count(), 0);

    rig.network.set_reachable(true);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(rig.gateway.pull_calls(), 0);
}

#[tokio::test]
async fn dropping_the_handle_stops_auto_sync() {
    let rig = Rig::new(&["products"]);
    rig.network.set_reachable(false);
    drop(AutoSync::start(rig.engine.clone()));
    assert_eq!(rig.network.subscriber_count(), 0);

    rig.network.set_reachable(true);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(rig.gateway.pull_calls(), 0);
}

#[tokio::test]
async fn reconnect_during_manual_cycle_is_skipped() {
    let rig = Rig::new(&["products"]);
    let handle = AutoSync::start(rig.engine.clone());
    rig.gateway.pause();

    let manual = tokio::spawn({
        let engine = rig.engine.clone();
        async move { engine.trigger_sync(Trigger::Manual).await }
    });
    rig.wait_running().await;

    rig.network.set_reachable(false);
    rig.network.set_reachable(true);
    wait_until(|| rig.engine.stats().cycles_skipped == 1).await;

    rig.gateway.resume();
    assert!(manual.await.unwrap().is_succeeded());
    assert_eq!(rig.gateway.pull_calls(), 1);
    handle.shutdown().await;
}
