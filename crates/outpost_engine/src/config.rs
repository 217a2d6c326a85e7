//! Configuration for the sync engine.

use outpost_store::DatasetName;
use std::time::Duration;

/// Configuration for sync cycles.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Reference datasets pulled on every cycle.
    pub datasets: Vec<DatasetName>,
    /// Timeout for each remote call.
    pub request_timeout: Duration,
    /// Maximum number of dataset pulls in flight at once.
    pub pull_concurrency: usize,
    /// Interval for periodic sync, if enabled.
    pub sync_interval: Option<Duration>,
    /// Backoff applied to periodic sync after failed cycles.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a configuration pulling `datasets`.
    pub fn new(datasets: impl IntoIterator<Item = DatasetName>) -> Self {
        Self {
            datasets: datasets.into_iter().collect(),
            request_timeout: Duration::from_secs(30),
            pull_concurrency: 4,
            sync_interval: None,
            retry: RetryConfig::default(),
        }
    }

    /// Adds a dataset to pull.
    pub fn with_dataset(mut self, dataset: DatasetName) -> Self {
        if !self.datasets.contains(&dataset) {
            self.datasets.push(dataset);
        }
        self
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets how many pulls may run concurrently. Zero is treated as one.
    pub fn with_pull_concurrency(mut self, concurrency: usize) -> Self {
        self.pull_concurrency = concurrency.max(1);
        self
    }

    /// Enables periodic sync.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Backoff for periodic sync after failures.
///
/// After `n` consecutive retryable failures (`0 < n < max_attempts`) the next
/// periodic cycle runs after [`RetryConfig::delay_for_attempt`]`(n)`, capped at
/// the sync interval. Past `max_attempts` the regular interval applies again.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Number of quick retries before falling back to the regular interval.
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no quick retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.add_jitter = jitter;
        self
    }

    /// Calculates the delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Up to 25% extra.
            let jitter = delay_secs * 0.25 * jitter_fraction();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }

    /// Delay before the next periodic cycle after `failures` consecutive
    /// retryable failures.
    pub fn next_periodic_delay(&self, interval: Duration, failures: u32) -> Duration {
        if failures == 0 || failures >= self.max_attempts {
            interval
        } else {
            self.delay_for_attempt(failures).min(interval)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Pseudo-random fraction in `[0, 1)` from the clock's sub-second nanos.
fn jitter_fraction() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos % 1000) / 1000.0
}
