//! Shared setup for engine integration tests.

#![allow(dead_code)]

use outpost_engine::{ManualConnectivity, MockGateway, SyncConfig, SyncEngine, SyncState};
use outpost_store::{DatasetName, LocalStore, QueuedAction, Record};
use std::sync::Arc;
use std::time::Duration;

/// An engine wired to a mock remote and a manual network switch.
pub struct Rig {
    pub store: Arc<LocalStore>,
    pub gateway: Arc<MockGateway>,
    pub network: Arc<ManualConnectivity>,
    pub engine: Arc<SyncEngine>,
}

impl Rig {
    pub fn new(datasets: &[&str]) -> Self {
        Self::with_store(LocalStore::open_in_memory().unwrap(), datasets)
    }

    pub fn with_store(store: LocalStore, datasets: &[&str]) -> Self {
        let config = SyncConfig::new(datasets.iter().map(|d| outpost_testkit::dataset(d)))
            .with_request_timeout(Duration::from_secs(5));
        Self::with_config(store, config)
    }

    pub fn with_config(store: LocalStore, config: SyncConfig) -> Self {
        let store = Arc::new(store);
        let gateway = MockGateway::shared();
        let network = ManualConnectivity::shared(true);
        let engine = Arc::new(SyncEngine::new(
            config,
            Arc::clone(&store),
            gateway.clone(),
            network.clone(),
        ));
        Self {
            store,
            gateway,
            network,
            engine,
        }
    }

    /// Everything observable in the store.
    pub fn contents(&self) -> StoreContents {
        let datasets = self
            .store
            .dataset_names()
            .into_iter()
            .map(|name| {
                let records = self.store.read_all(&name);
                (name, records)
            })
            .collect();
        StoreContents {
            datasets,
            queue: self.store.read_queue(),
        }
    }

    /// Waits until a cycle is running.
    pub async fn wait_running(&self) {
        wait_until(|| self.engine.current_state().state == SyncState::Running).await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreContents {
    pub datasets: Vec<(DatasetName, Vec<Record>)>,
    pub queue: Vec<QueuedAction>,
}

/// Polls `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
