//! Trigger surface: manual, reconnect and periodic sync.
//!
//! Every trigger calls [`SyncEngine::trigger_sync`], so all of them share the
//! engine's single-flight guard. Manual syncs call it directly; [`AutoSync`]
//! drives the reconnect and periodic triggers.

use crate::connectivity::{ConnectivityMonitor, SubscriptionId};
use crate::engine::SyncEngine;
use crate::state::SyncOutcome;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// What started a sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Requested by the user or host application.
    Manual,
    /// The remote became reachable.
    Reconnect,
    /// The periodic timer fired.
    Periodic,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Manual => f.write_str("manual"),
            Trigger::Reconnect => f.write_str("reconnect"),
            Trigger::Periodic => f.write_str("periodic"),
        }
    }
}

/// Automatic sync on reconnect and, if configured, on a timer.
pub struct AutoSync;

impl AutoSync {
    /// Subscribes to the engine's connectivity monitor and starts the driver
    /// task. Must be called inside a tokio runtime.
    pub fn start(engine: Arc<SyncEngine>) -> AutoSyncHandle {
        let connectivity = Arc::clone(engine.connectivity());
        let (transitions_tx, transitions) = mpsc::unbounded_channel();
        let subscription = connectivity.subscribe(Arc::new(move |reachable| {
            // The driver may be gone already; nothing to notify then.
            let _ = transitions_tx.send(reachable);
        }));

        let (shutdown_tx, shutdown) = oneshot::channel();
        let task = tokio::spawn(drive(engine, transitions, shutdown));
        info!("automatic sync started");

        AutoSyncHandle {
            connectivity,
            subscription: Some(subscription),
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// Stops [`AutoSync`] on [`shutdown`](AutoSyncHandle::shutdown) or drop.
pub struct AutoSyncHandle {
    connectivity: Arc<dyn ConnectivityMonitor>,
    subscription: Option<SubscriptionId>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl AutoSyncHandle {
    /// Unsubscribes and waits for the driver to stop. A cycle already running
    /// is finished first.
    pub async fn shutdown(mut self) {
        self.release();
        let _ = (&mut self.task).await;
    }

    /// True while the driver task runs.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    fn release(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.connectivity.unsubscribe(id);
        }
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

impl Drop for AutoSyncHandle {
    fn drop(&mut self) {
        self.release();
        self.task.abort();
    }
}

async fn drive(
    engine: Arc<SyncEngine>,
    mut transitions: mpsc::UnboundedReceiver<bool>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let interval = engine.config().sync_interval;
    let retry = engine.config().retry.clone();
    let mut failures = 0u32;
    let mut next_tick = interval.map(|every| Instant::now() + every);

    loop {
        let trigger = tokio::select! {
            _ = &mut shutdown => break,
            transition = transitions.recv() => match transition {
                Some(true) => Trigger::Reconnect,
                Some(false) => {
                    debug!("remote unreachable, waiting for reconnect");
                    continue;
                }
                None => break,
            },
            () = wait_until(next_tick) => Trigger::Periodic,
        };

        let outcome = engine.trigger_sync(trigger).await;
        failures = match &outcome {
            SyncOutcome::Succeeded(_) => 0,
            SyncOutcome::Failed(err) if err.is_retryable() => failures.saturating_add(1),
            SyncOutcome::Failed(_) | SyncOutcome::Skipped => failures,
        };

        if let Some(every) = interval {
            let delay: Duration = retry.next_periodic_delay(every, failures);
            debug!(%trigger, outcome = outcome.label(), next_in = ?delay, "scheduled next periodic sync");
            next_tick = Some(Instant::now() + delay);
        }
    }
    info!("automatic sync stopped");
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_names() {
        assert_eq!(Trigger::Manual.to_string(), "manual");
        assert_eq!(Trigger::Reconnect.to_string(), "reconnect");
        assert_eq!(Trigger::Periodic.to_string(), "periodic");
    }
}
