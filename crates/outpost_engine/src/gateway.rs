//! Remote gateway abstraction.
//!
//! The engine consumes two remote capabilities: pulling a complete reference
//! dataset, and submitting the whole action queue in one batch.
//!
//! # Idempotency contract
//!
//! A submit whose response is lost looks like a transport failure, so the
//! next cycle resubmits the same actions verbatim. Implementations (and the
//! remote behind them) MUST treat an [`ActionId`] they have already applied
//! as a success without applying it again. The engine does not, and cannot,
//! verify this.

use crate::error::{GatewayError, GatewayResult};
use async_trait::async_trait;
use outpost_store::{ActionId, DatasetName, QueuedAction, Record};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Per-action result of a batch submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    /// Action the result is for.
    pub id: ActionId,
    /// Whether the remote applied (or had already applied) the action.
    pub success: bool,
    /// Why the action was refused.
    #[serde(default, rename = "error", skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl SubmitOutcome {
    /// A successful result.
    pub fn accepted(id: ActionId) -> Self {
        Self {
            id,
            success: true,
            error_detail: None,
        }
    }

    /// A refused result with a reason.
    pub fn rejected(id: ActionId, detail: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            error_detail: Some(detail.into()),
        }
    }
}

/// The remote source of truth, as seen by the sync engine.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Returns the complete current contents of `dataset`.
    ///
    /// Must be side-effect free on the remote.
    async fn pull_dataset(&self, dataset: &DatasetName) -> GatewayResult<Vec<Record>>;

    /// Submits `actions` in one call and returns one result per action.
    ///
    /// Resubmitting an already-applied action must succeed without applying
    /// it twice; see the module docs.
    async fn submit_actions(&self, actions: &[QueuedAction]) -> GatewayResult<Vec<SubmitOutcome>>;
}

/// A scripted in-process remote for tests and demos.
///
/// Serves whatever datasets were set, accepts every action unless told
/// otherwise, and deduplicates by action ID like a conforming remote.
#[derive(Debug)]
pub struct MockGateway {
    datasets: Mutex<HashMap<DatasetName, Vec<Record>>>,
    pull_failures: Mutex<HashMap<DatasetName, GatewayError>>,
    submit_failure: Mutex<Option<GatewayError>>,
    rejections: Mutex<HashMap<ActionId, String>>,
    unreported: Mutex<HashSet<ActionId>>,
    lose_next_response: Mutex<bool>,
    applied: Mutex<Vec<QueuedAction>>,
    batches: Mutex<Vec<Vec<ActionId>>>,
    pull_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    latency: Mutex<Option<Duration>>,
    gate: watch::Sender<bool>,
}

impl MockGateway {
    /// Creates a gateway with no datasets that accepts every action.
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            datasets: Mutex::new(HashMap::new()),
            pull_failures: Mutex::new(HashMap::new()),
            submit_failure: Mutex::new(None),
            rejections: Mutex::new(HashMap::new()),
            unreported: Mutex::new(HashSet::new()),
            lose_next_response: Mutex::new(false),
            applied: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            pull_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            latency: Mutex::new(None),
            gate,
        }
    }

    /// Wraps the gateway in an `Arc`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Sets the contents returned for `dataset`.
    pub fn set_dataset(&self, dataset: DatasetName, records: Vec<Record>) {
        self.datasets.lock().insert(dataset, records);
    }

    /// Makes pulls of `dataset` fail with `error`.
    pub fn fail_pull(&self, dataset: DatasetName, error: GatewayError) {
        self.pull_failures.lock().insert(dataset, error);
    }

    /// Makes every submit fail with `error`, or clears the failure.
    pub fn fail_submit(&self, error: Option<GatewayError>) {
        *self.submit_failure.lock() = error;
    }

    /// Makes the remote refuse `id` with `detail`.
    pub fn reject(&self, id: ActionId, detail: impl Into<String>) {
        self.rejections.lock().insert(id, detail.into());
    }

    /// Stops refusing `id`.
    pub fn accept(&self, id: &ActionId) {
        self.rejections.lock().remove(id);
    }

    /// Leaves `id` out of submit responses.
    pub fn omit_result(&self, id: ActionId) {
        self.unreported.lock().insert(id);
    }

    /// Applies the next batch but fails the call as if the response was lost.
    pub fn lose_next_response(&self) {
        *self.lose_next_response.lock() = true;
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Holds every call until [`MockGateway::resume`].
    pub fn pause(&self) {
        self.gate.send_replace(false);
    }

    /// Releases held calls.
    pub fn resume(&self) {
        self.gate.send_replace(true);
    }

    /// Number of pull calls received.
    pub fn pull_calls(&self) -> usize {
        self.pull_calls.load(Ordering::SeqCst)
    }

    /// Number of submit calls received.
    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    /// IDs of each submitted batch, in call order.
    pub fn batches(&self) -> Vec<Vec<ActionId>> {
        self.batches.lock().clone()
    }

    /// Actions the remote has applied, each exactly once.
    pub fn applied(&self) -> Vec<QueuedAction> {
        self.applied.lock().clone()
    }

    async fn delay(&self) {
        let mut gate = self.gate.subscribe();
        // The sender lives in `self`, so this only ends when the gate opens.
        let _ = gate.wait_for(|open| *open).await;
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn pull_dataset(&self, dataset: &DatasetName) -> GatewayResult<Vec<Record>> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;

        if let Some(err) = self.pull_failures.lock().get(dataset) {
            return Err(err.clone());
        }
        Ok(self
            .datasets
            .lock()
            .get(dataset)
            .cloned()
            .unwrap_or_default())
    }

    async fn submit_actions(&self, actions: &[QueuedAction]) -> GatewayResult<Vec<SubmitOutcome>> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.batches
            .lock()
            .push(actions.iter().map(|a| a.id).collect());
        self.delay().await;

        if let Some(err) = self.submit_failure.lock().clone() {
            return Err(err);
        }

        let rejections = self.rejections.lock().clone();
        let unreported = self.unreported.lock().clone();
        let mut outcomes = Vec::with_capacity(actions.len());
        {
            let mut applied = self.applied.lock();
            for action in actions {
                let outcome = match rejections.get(&action.id) {
                    Some(detail) => SubmitOutcome::rejected(action.id, detail.clone()),
                    None => {
                        if !applied.iter().any(|a| a.id == action.id) {
                            applied.push(action.clone());
                        }
                        SubmitOutcome::accepted(action.id)
                    }
                };
                if !unreported.contains(&action.id) {
                    outcomes.push(outcome);
                }
            }
        }

        let lost = std::mem::replace(&mut *self.lose_next_response.lock(), false);
        if lost {
            return Err(GatewayError::transport_retryable("connection reset before response"));
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outpost_store::ActionKind;
    use serde_json::json;

    fn sale(n: u32) -> QueuedAction {
        QueuedAction::new(ActionKind::new("sale").unwrap(), json!({ "n": n }))
    }

    #[test]
    fn submit_outcome_wire_shape() {
        let id = ActionId::generate();
        let ok = serde_json::to_value(SubmitOutcome::accepted(id)).unwrap();
        assert_eq!(ok, json!({"id": id.to_string(), "success": true}));

        let parsed: SubmitOutcome = serde_json::from_value(
            json!({"id": id.to_string(), "success": false, "error": "out of stock"}),
        )
        .unwrap();
        assert_eq!(parsed, SubmitOutcome::rejected(id, "out of stock"));
    }

    #[tokio::test]
    async fn mock_serves_datasets_and_failures() {
        let gateway = MockGateway::new();
        let products = DatasetName::new("products").unwrap();
        let customers = DatasetName::new("customers").unwrap();
        gateway.set_dataset(products.clone(), vec![Record::new("p1", json!({}))]);
        gateway.fail_pull(customers.clone(), GatewayError::Rejected("403".into()));

        assert_eq!(gateway.pull_dataset(&products).await.unwrap().len(), 1);
        assert!(gateway.pull_dataset(&customers).await.is_err());
        assert_eq!(gateway.pull_calls(), 2);
    }

    #[tokio::test]
    async fn mock_deduplicates_resubmissions() {
        let gateway = MockGateway::new();
        let batch = vec![sale(1), sale(2)];

        gateway.lose_next_response();
        assert!(gateway.submit_actions(&batch).await.is_err());
        let outcomes = gateway.submit_actions(&batch).await.unwrap();

        assert!(outcomes.iter().all(|o| o.success));
        assert_eq!(gateway.applied().len(), 2);
        assert_eq!(gateway.submit_calls(), 2);
    }

    #[tokio::test]
    async fn mock_rejects_and_omits() {
        let gateway = MockGateway::new();
        let batch = vec![sale(1), sale(2), sale(3)];
        gateway.reject(batch[1].id, "invalid total");
        gateway.omit_result(batch[2].id);

        let outcomes = gateway.submit_actions(&batch).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].success);
        assert_eq!(outcomes[1].error_detail.as_deref(), Some("invalid total"));
    }
}
