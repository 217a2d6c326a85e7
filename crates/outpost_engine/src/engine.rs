//! The sync orchestrator.
//!
//! A cycle runs in fixed phases:
//!
//! 1. **Guard**: a second call while a cycle runs returns
//!    [`SyncOutcome::Skipped`]; an unreachable remote fails fast with
//!    [`SyncError::NetworkUnavailable`]. Neither touches the store or remote.
//! 2. **Pull**: every configured dataset is fetched concurrently. Any failure
//!    ends the cycle before the store changes.
//! 3. **Pull commit**: all datasets are replaced in one store transaction.
//! 4. **Push**: the whole queue is submitted in a single call (skipped when
//!    empty). A failed call ends the cycle; the pull commit stands.
//! 5. **Reconcile**: confirmed actions are removed; everything else stays
//!    queued, unchanged, for the next cycle.

use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{GatewayError, SyncError, SyncPhase, SyncResult};
use crate::gateway::{RemoteGateway, SubmitOutcome};
use crate::state::{ActionFailure, SyncOutcome, SyncState, SyncStats, SyncStatus, SyncSummary};
use crate::trigger::Trigger;
use chrono::Utc;
use futures::{stream, StreamExt, TryStreamExt};
use outpost_store::{ActionId, DatasetName, LocalStore, QueuedAction, Record, StoreResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

/// Orchestrates sync cycles between a [`LocalStore`] and a [`RemoteGateway`].
///
/// Create one per store and share it behind an `Arc` with every trigger.
pub struct SyncEngine {
    config: SyncConfig,
    store: Arc<LocalStore>,
    gateway: Arc<dyn RemoteGateway>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    in_flight: AtomicBool,
    status: watch::Sender<SyncStatus>,
    stats: RwLock<SyncStats>,
}

impl SyncEngine {
    /// Creates a new sync engine.
    pub fn new(
        config: SyncConfig,
        store: Arc<LocalStore>,
        gateway: Arc<dyn RemoteGateway>,
        connectivity: Arc<dyn ConnectivityMonitor>,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus::default());
        Self {
            config,
            store,
            gateway,
            connectivity,
            in_flight: AtomicBool::new(false),
            status,
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The local store.
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// The connectivity monitor.
    pub fn connectivity(&self) -> &Arc<dyn ConnectivityMonitor> {
        &self.connectivity
    }

    /// Records a new action for the next cycle.
    ///
    /// Works offline and while a cycle runs; an action queued mid-cycle is not
    /// part of that cycle's batch.
    ///
    /// # Errors
    ///
    /// Fails if `kind` is blank or the store cannot commit.
    pub fn enqueue(
        &self,
        kind: impl Into<String>,
        payload: serde_json::Value,
    ) -> StoreResult<ActionId> {
        self.store.enqueue(kind, payload)
    }

    /// Current status.
    pub fn current_state(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// A receiver that observes every status change.
    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Cumulative statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Runs one sync cycle, unless one is already running.
    pub async fn trigger_sync(&self, trigger: Trigger) -> SyncOutcome {
        let Some(guard) = InFlightGuard::acquire(&self.in_flight, &self.status) else {
            debug!(%trigger, "sync already running, skipping");
            let outcome = SyncOutcome::Skipped;
            self.stats.write().record(&outcome);
            return outcome;
        };

        if !self.connectivity.is_reachable() {
            debug!(%trigger, "remote unreachable, not syncing");
            let outcome = SyncOutcome::Failed(SyncError::NetworkUnavailable);
            self.finish(&outcome);
            drop(guard);
            return outcome;
        }

        self.status.send_modify(|status| status.state = SyncState::Running);
        let span = tracing::info_span!("sync_cycle", %trigger);
        let outcome = match self.run_cycle().instrument(span).await {
            Ok(summary) => SyncOutcome::Succeeded(summary),
            Err(err) => SyncOutcome::Failed(err),
        };
        self.finish(&outcome);
        drop(guard);
        outcome
    }

    fn finish(&self, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Succeeded(summary) if summary.has_failures() => warn!(
                failed = summary.pushed_failed,
                total = summary.pushed_total,
                "sync completed with rejected actions"
            ),
            SyncOutcome::Succeeded(summary) => info!(
                datasets = summary.pulled.len(),
                records = summary.records_pulled(),
                confirmed = summary.pushed_succeeded,
                "sync succeeded"
            ),
            SyncOutcome::Failed(SyncError::NetworkUnavailable) => {
                info!("sync not attempted: network unavailable")
            }
            SyncOutcome::Failed(err) => warn!(error = %err, "sync failed"),
            SyncOutcome::Skipped => {}
        }

        self.stats.write().record(outcome);
        let finished_at = match outcome {
            SyncOutcome::Succeeded(summary) => Some(summary.finished_at),
            _ => None,
        };
        self.status.send_modify(|status| {
            status.state = SyncState::Idle;
            if finished_at.is_some() {
                status.last_sync_at = finished_at;
            }
            status.last_outcome = Some(outcome.clone());
        });
    }

    async fn run_cycle(&self) -> SyncResult<SyncSummary> {
        let started_at = Utc::now();

        let datasets = self.pull_phase().await?;
        let pulled: BTreeMap<DatasetName, usize> = datasets
            .iter()
            .map(|(name, records)| (name.clone(), records.len()))
            .collect();
        if !datasets.is_empty() {
            self.with_store(move |store| store.replace_datasets(datasets))
                .await?;
            debug!(datasets = pulled.len(), "reference datasets replaced");
        }

        let push = self.push_phase().await?;

        Ok(SyncSummary {
            pulled,
            pushed_total: push.total,
            pushed_succeeded: push.succeeded,
            pushed_failed: push.failures.len(),
            failures: push.failures,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn pull_phase(&self) -> SyncResult<Vec<(DatasetName, Vec<Record>)>> {
        let gateway = &self.gateway;
        let timeout = self.config.request_timeout;

        stream::iter(self.config.datasets.iter().cloned())
            .map(|name| async move {
                let records = with_timeout(timeout, gateway.pull_dataset(&name))
                    .await
                    .and_then(|records| check_unique(&name, records))
                    .map_err(|err| {
                        warn!(dataset = %name, error = %err, "pull failed");
                        SyncError::remote(SyncPhase::Pull, err)
                    })?;
                debug!(dataset = %name, records = records.len(), "pulled dataset");
                Ok::<_, SyncError>((name, records))
            })
            .buffered(self.config.pull_concurrency.max(1))
            .try_collect()
            .await
    }

    async fn push_phase(&self) -> SyncResult<PushReport> {
        let queue = self.with_store(|store| Ok(store.read_queue())).await?;
        if queue.is_empty() {
            debug!("queue empty, nothing to push");
            return Ok(PushReport::default());
        }

        debug!(actions = queue.len(), "submitting queue");
        let outcomes = with_timeout(
            self.config.request_timeout,
            self.gateway.submit_actions(&queue),
        )
        .await
        .map_err(|err| SyncError::remote(SyncPhase::Push, err))?;

        let reconciliation = reconcile(&queue, outcomes);
        let succeeded = reconciliation.succeeded.len();
        if succeeded > 0 {
            let ids = reconciliation.succeeded;
            let removed = self
                .with_store(move |store| store.remove_by_ids(&ids))
                .await?;
            debug!(removed, "confirmed actions removed");
        }

        Ok(PushReport {
            total: queue.len(),
            succeeded,
            failures: reconciliation.failures,
        })
    }

    async fn with_store<T, F>(&self, f: F) -> SyncResult<T>
    where
        F: FnOnce(&LocalStore) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| SyncError::Aborted(e.to_string()))?
            .map_err(SyncError::from)
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("datasets", &self.config.datasets)
            .field("state", &self.status.borrow().state)
            .finish_non_exhaustive()
    }
}

/// Holds the single-flight flag for one cycle.
///
/// Dropping it, including when a cycle future is dropped or panics, frees the
/// flag and puts the published state back to idle.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
    status: &'a watch::Sender<SyncStatus>,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool, status: &'a watch::Sender<SyncStatus>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag, status })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.status.send_if_modified(|status| {
            let running = status.state == SyncState::Running;
            status.state = SyncState::Idle;
            running
        });
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct PushReport {
    total: usize,
    succeeded: usize,
    failures: Vec<ActionFailure>,
}

/// Partition of a submitted batch.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Reconciliation {
    pub(crate) succeeded: Vec<ActionId>,
    pub(crate) failures: Vec<ActionFailure>,
}

/// Splits `submitted` by the remote's per-action results.
///
/// Actions without a result count as failed. Results for actions that were
/// not submitted are ignored.
pub(crate) fn reconcile(submitted: &[QueuedAction], outcomes: Vec<SubmitOutcome>) -> Reconciliation {
    let submitted_ids: HashSet<ActionId> = submitted.iter().map(|a| a.id).collect();
    let mut results: HashMap<ActionId, SubmitOutcome> = HashMap::with_capacity(outcomes.len());
    for outcome in outcomes {
        if !submitted_ids.contains(&outcome.id) {
            warn!(action = %outcome.id, "remote reported an action that was not submitted");
            continue;
        }
        // A duplicate result only counts as success if every copy says so.
        match results.get(&outcome.id) {
            Some(existing) if !existing.success => {}
            _ => {
                results.insert(outcome.id, outcome);
            }
        }
    }

    let mut reconciliation = Reconciliation::default();
    for action in submitted {
        match results.remove(&action.id) {
            Some(outcome) if outcome.success => reconciliation.succeeded.push(action.id),
            Some(outcome) => reconciliation.failures.push(ActionFailure {
                id: action.id,
                kind: action.kind.clone(),
                detail: outcome
                    .error_detail
                    .unwrap_or_else(|| "rejected by remote".to_string()),
            }),
            None => reconciliation.failures.push(ActionFailure {
                id: action.id,
                kind: action.kind.clone(),
                detail: "no result reported by remote".to_string(),
            }),
        }
    }
    reconciliation
}

async fn with_timeout<T>(
    timeout: std::time::Duration,
    call: impl Future<Output = Result<T, GatewayError>>,
) -> Result<T, GatewayError> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| GatewayError::Timeout(timeout))?
}

fn check_unique(name: &DatasetName, records: Vec<Record>) -> Result<Vec<Record>, GatewayError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in &records {
        if !seen.insert(&record.id) {
            return Err(GatewayError::Invalid(format!(
                "dataset {name} contains record {} more than once",
                record.id
            )));
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ManualConnectivity;
    use crate::gateway::MockGateway;
    use outpost_store::ActionKind;
    use serde_json::json;

    fn action(n: u32) -> QueuedAction {
        QueuedAction::new(ActionKind::new("sale").unwrap(), json!({ "n": n }))
    }

    #[test]
    fn reconcile_partitions_by_result() {
        let queue = vec![action(1), action(2), action(3)];
        let stray = ActionId::generate();
        let outcomes = vec![
            SubmitOutcome::accepted(queue[0].id),
            SubmitOutcome::rejected(queue[1].id, "stock mismatch"),
            SubmitOutcome::accepted(stray),
        ];

        let result = reconcile(&queue, outcomes);
        assert_eq!(result.succeeded, vec![queue[0].id]);
        assert_eq!(result.failures.len(), 2);
        assert_eq!(result.failures[0].id, queue[1].id);
        assert_eq!(result.failures[0].detail, "stock mismatch");
        assert_eq!(result.failures[1].id, queue[2].id);
        assert_eq!(result.failures[1].detail, "no result reported by remote");
    }

    #[test]
    fn conflicting_duplicate_results_count_as_failure() {
        let queue = vec![action(1)];
        let outcomes = vec![
            SubmitOutcome::rejected(queue[0].id, "first"),
            SubmitOutcome::accepted(queue[0].id),
        ];
        let result = reconcile(&queue, outcomes);
        assert!(result.succeeded.is_empty());
        assert_eq!(result.failures[0].detail, "first");
    }

    #[test]
    fn duplicate_record_ids_are_invalid() {
        let name = DatasetName::new("products").unwrap();
        let records = vec![Record::new("a", json!(1)), Record::new("a", json!(2))];
        assert!(matches!(
            check_unique(&name, records),
            Err(GatewayError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn dropped_cycle_releases_the_guard() {
        let store = Arc::new(LocalStore::open_in_memory().unwrap());
        let gateway = MockGateway::shared();
        let engine = SyncEngine::new(
            SyncConfig::new([DatasetName::new("products").unwrap()]),
            store,
            gateway.clone(),
            ManualConnectivity::shared(true),
        );

        gateway.pause();
        {
            let cycle = engine.trigger_sync(Trigger::Manual);
            tokio::pin!(cycle);
            let polled = tokio::time::timeout(std::time::Duration::from_millis(50), &mut cycle).await;
            assert!(polled.is_err());
            assert_eq!(engine.current_state().state, SyncState::Running);
        }
        assert_eq!(engine.current_state().state, SyncState::Idle);

        gateway.resume();
        assert!(engine.trigger_sync(Trigger::Manual).await.is_succeeded());
    }
}
