//! Connectivity monitoring.
//!
//! A [`ConnectivityMonitor`] answers "is the remote reachable right now?" and
//! tells subscribers about transitions. Handlers run exactly once per
//! transition; reporting the current state again is not a transition.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Callback invoked with the new reachability on every transition.
pub type ConnectivityHandler = Arc<dyn Fn(bool) + Send + Sync>;

/// Identifies a subscription for [`ConnectivityMonitor::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Source of reachability information.
pub trait ConnectivityMonitor: Send + Sync {
    /// Returns true if the remote is currently considered reachable.
    fn is_reachable(&self) -> bool;

    /// Registers `handler` for future transitions.
    fn subscribe(&self, handler: ConnectivityHandler) -> SubscriptionId;

    /// Removes a handler. Returns false if it was not registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// Connectivity state set by the host application.
///
/// Feed it from a platform network callback, a probe, or a test.
/// Handlers must not call [`ManualConnectivity::set_reachable`] themselves.
pub struct ManualConnectivity {
    inner: Mutex<Inner>,
    dispatch: Mutex<()>,
}

struct Inner {
    reachable: bool,
    next_id: u64,
    handlers: Vec<(SubscriptionId, ConnectivityHandler)>,
}

impl ManualConnectivity {
    /// Creates a monitor with the given initial state.
    pub fn new(reachable: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                reachable,
                next_id: 1,
                handlers: Vec::new(),
            }),
            dispatch: Mutex::new(()),
        }
    }

    /// Creates a shared monitor.
    pub fn shared(reachable: bool) -> Arc<Self> {
        Arc::new(Self::new(reachable))
    }

    /// Records the current reachability and notifies subscribers if it
    /// changed. Returns true on a transition.
    pub fn set_reachable(&self, reachable: bool) -> bool {
        // Serializes transitions so handlers see them in order.
        let _dispatch = self.dispatch.lock();
        let handlers = {
            let mut inner = self.inner.lock();
            if inner.reachable == reachable {
                return false;
            }
            inner.reachable = reachable;
            inner
                .handlers
                .iter()
                .map(|(_, handler)| Arc::clone(handler))
                .collect::<Vec<_>>()
        };

        if reachable {
            info!(subscribers = handlers.len(), "remote became reachable");
        } else {
            warn!(subscribers = handlers.len(), "remote became unreachable");
        }
        for handler in handlers {
            handler(reachable);
        }
        true
    }

    /// Number of registered handlers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().handlers.len()
    }
}

impl ConnectivityMonitor for ManualConnectivity {
    fn is_reachable(&self) -> bool {
        self.inner.lock().reachable
    }

    fn subscribe(&self, handler: ConnectivityHandler) -> SubscriptionId {
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.handlers.push((id, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.handlers.len();
        inner.handlers.retain(|(existing, _)| *existing != id);
        inner.handlers.len() != before
    }
}

impl fmt::Debug for ManualConnectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ManualConnectivity")
            .field("reachable", &inner.reachable)
            .field("subscribers", &inner.handlers.len())
            .finish()
    }
}

/// One reachability check.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Returns true if the remote answered.
    async fn probe(&self) -> bool;
}

/// Probes by opening a TCP connection.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    /// Probes `addr` (`host:port`), giving up after `timeout`.
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn probe(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                debug!(addr = %self.addr, error = %err, "probe failed");
                false
            }
            Err(_) => {
                debug!(addr = %self.addr, timeout = ?self.timeout, "probe timed out");
                false
            }
        }
    }
}

/// Connectivity driven by a periodic [`ReachabilityProbe`].
///
/// The probe task stops when this value is dropped.
pub struct ProbeConnectivity {
    state: Arc<ManualConnectivity>,
    task: JoinHandle<()>,
}

impl ProbeConnectivity {
    /// Starts probing every `interval`, assuming `initial` until the first
    /// probe completes. Must be called inside a tokio runtime.
    pub fn spawn<P>(probe: P, interval: Duration, initial: bool) -> Self
    where
        P: ReachabilityProbe + 'static,
    {
        let state = ManualConnectivity::shared(initial);
        let task = tokio::spawn({
            let state = Arc::clone(&state);
            async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    let reachable = probe.probe().await;
                    state.set_reachable(reachable);
                }
            }
        });
        Self { state, task }
    }

    /// Stops probing. The last observed state is kept.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl ConnectivityMonitor for ProbeConnectivity {
    fn is_reachable(&self) -> bool {
        self.state.is_reachable()
    }

    fn subscribe(&self, handler: ConnectivityHandler) -> SubscriptionId {
        self.state.subscribe(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.unsubscribe(id)
    }
}

impl Drop for ProbeConnectivity {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn recorder() -> (ConnectivityHandler, Arc<Mutex<Vec<bool>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler: ConnectivityHandler = {
            let seen = Arc::clone(&seen);
            Arc::new(move |reachable| seen.lock().push(reachable))
        };
        (handler, seen)
    }

    #[test]
    fn handler_runs_once_per_transition() {
        let monitor = ManualConnectivity::new(false);
        let (handler, seen) = recorder();
        monitor.subscribe(handler);

        assert!(!monitor.set_reachable(false));
        assert!(monitor.set_reachable(true));
        assert!(!monitor.set_reachable(true));
        assert!(monitor.set_reachable(false));

        assert_eq!(*seen.lock(), vec![true, false]);
        assert!(!monitor.is_reachable());
    }

    #[test]
    fn unsubscribed_handler_is_not_called() {
        let monitor = ManualConnectivity::new(true);
        let calls = Arc::new(AtomicUsize::new(0));
        let id = monitor.subscribe({
            let calls = Arc::clone(&calls);
            Arc::new(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        });

        assert!(monitor.unsubscribe(id));
        assert!(!monitor.unsubscribe(id));
        monitor.set_reachable(false);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(monitor.subscriber_count(), 0);
    }

    struct FlagProbe(Arc<AtomicBool>);

    #[async_trait]
    impl ReachabilityProbe for FlagProbe {
        async fn probe(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    async fn wait_for(monitor: &ProbeConnectivity, reachable: bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while monitor.is_reachable() != reachable {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("probe never reported the expected state");
    }

    #[tokio::test]
    async fn probe_connectivity_follows_probe() {
        let flag = Arc::new(AtomicBool::new(true));
        let monitor =
            ProbeConnectivity::spawn(FlagProbe(Arc::clone(&flag)), Duration::from_millis(10), false);
        let (handler, seen) = recorder();
        monitor.subscribe(handler);

        wait_for(&monitor, true).await;
        flag.store(false, Ordering::SeqCst);
        wait_for(&monitor, false).await;

        assert_eq!(*seen.lock(), vec![true, false]);
    }

    #[tokio::test]
    async fn tcp_probe_detects_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let probe = TcpProbe::new(addr.to_string(), Duration::from_secs(2));
        assert!(probe.probe().await);

        drop(listener);
        assert!(!probe.probe().await);
    }
}
