//! Cycle outcomes, status and statistics.

use crate::error::SyncError;
use chrono::{DateTime, Utc};
use outpost_store::{ActionId, ActionKind, DatasetName};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Whether a cycle is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// No cycle running.
    #[default]
    Idle,
    /// A cycle is running.
    Running,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Idle => f.write_str("idle"),
            SyncState::Running => f.write_str("running"),
        }
    }
}

/// An action the remote refused (or did not report on) in a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionFailure {
    /// The action, still queued.
    pub id: ActionId,
    /// Its kind.
    pub kind: ActionKind,
    /// What the remote said.
    pub detail: String,
}

/// What a completed cycle did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSummary {
    /// Records now held per pulled dataset.
    pub pulled: BTreeMap<DatasetName, usize>,
    /// Actions submitted.
    pub pushed_total: usize,
    /// Actions confirmed and removed from the queue.
    pub pushed_succeeded: usize,
    /// Actions left queued for the next cycle.
    pub pushed_failed: usize,
    /// Details for each failed action.
    pub failures: Vec<ActionFailure>,
    /// When the cycle started.
    pub started_at: DateTime<Utc>,
    /// When the cycle finished.
    pub finished_at: DateTime<Utc>,
}

impl SyncSummary {
    /// Total records pulled across datasets.
    pub fn records_pulled(&self) -> usize {
        self.pulled.values().sum()
    }

    /// True if some pushed actions were refused.
    pub fn has_failures(&self) -> bool {
        self.pushed_failed > 0
    }
}

/// Result of [`SyncEngine::trigger_sync`](crate::SyncEngine::trigger_sync).
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    /// The cycle completed. Individual actions may still have failed; see
    /// [`SyncSummary::pushed_failed`].
    Succeeded(SyncSummary),
    /// Another cycle was already running; this call did nothing.
    Skipped,
    /// The cycle failed.
    Failed(SyncError),
}

impl SyncOutcome {
    /// True for [`SyncOutcome::Succeeded`].
    pub fn is_succeeded(&self) -> bool {
        matches!(self, SyncOutcome::Succeeded(_))
    }

    /// True for [`SyncOutcome::Skipped`].
    pub fn is_skipped(&self) -> bool {
        matches!(self, SyncOutcome::Skipped)
    }

    /// The summary of a completed cycle.
    pub fn summary(&self) -> Option<&SyncSummary> {
        match self {
            SyncOutcome::Succeeded(summary) => Some(summary),
            _ => None,
        }
    }

    /// The error of a failed cycle.
    pub fn error(&self) -> Option<&SyncError> {
        match self {
            SyncOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Short machine-friendly label.
    pub fn label(&self) -> &'static str {
        match self {
            SyncOutcome::Succeeded(summary) if summary.has_failures() => "partial",
            SyncOutcome::Succeeded(_) => "succeeded",
            SyncOutcome::Skipped => "skipped",
            SyncOutcome::Failed(SyncError::NetworkUnavailable) => "offline",
            SyncOutcome::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Succeeded(s) if s.has_failures() => write!(
                f,
                "sync completed with partial failures: {} of {} actions rejected and kept for retry",
                s.pushed_failed, s.pushed_total
            ),
            SyncOutcome::Succeeded(s) => write!(
                f,
                "sync succeeded: {} records in {} datasets, {} actions confirmed",
                s.records_pulled(),
                s.pulled.len(),
                s.pushed_succeeded
            ),
            SyncOutcome::Skipped => f.write_str("sync skipped: another sync is already running"),
            SyncOutcome::Failed(SyncError::NetworkUnavailable) => {
                f.write_str("sync not attempted: network unavailable")
            }
            SyncOutcome::Failed(err) => write!(f, "sync failed: {err}"),
        }
    }
}

/// Snapshot of the engine for status indicators.
#[derive(Debug, Clone, Default)]
pub struct SyncStatus {
    /// Whether a cycle is running.
    pub state: SyncState,
    /// Completion time of the last succeeded cycle.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Outcome of the last attempted cycle. Skipped calls are not recorded.
    pub last_outcome: Option<SyncOutcome>,
}

impl SyncStatus {
    /// Summary of the last cycle, if it succeeded.
    pub fn last_summary(&self) -> Option<&SyncSummary> {
        self.last_outcome.as_ref().and_then(SyncOutcome::summary)
    }
}

/// Cumulative statistics since the engine was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Cycles that completed.
    pub cycles_succeeded: u64,
    /// Cycles that failed, including offline attempts.
    pub cycles_failed: u64,
    /// Calls skipped because a cycle was running.
    pub cycles_skipped: u64,
    /// Records written by dataset replacement.
    pub records_pulled: u64,
    /// Actions confirmed by the remote.
    pub actions_confirmed: u64,
    /// Action submissions the remote refused.
    pub actions_failed: u64,
}

impl SyncStats {
    pub(crate) fn record(&mut self, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Succeeded(summary) => {
                self.cycles_succeeded += 1;
                self.records_pulled += summary.records_pulled() as u64;
                self.actions_confirmed += summary.pushed_succeeded as u64;
                self.actions_failed += summary.pushed_failed as u64;
            }
            SyncOutcome::Skipped => self.cycles_skipped += 1,
            SyncOutcome::Failed(_) => self.cycles_failed += 1,
        }
    }
}
