//! Error types for the sync engine.

use outpost_store::StoreError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for remote gateway calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors reported by a [`RemoteGateway`](crate::RemoteGateway).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the call can be retried.
        retryable: bool,
    },

    /// The remote refused the request.
    #[error("remote rejected the request: {0}")]
    Rejected(String),

    /// The response did not have the expected shape.
    #[error("invalid response: {0}")]
    Invalid(String),

    /// The call did not complete in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl GatewayError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Transport { retryable, .. } => *retryable,
            GatewayError::Timeout(_) => true,
            GatewayError::Rejected(_) | GatewayError::Invalid(_) => false,
        }
    }
}

/// Phase of a sync cycle that talks to the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    /// Pulling reference datasets.
    Pull,
    /// Submitting the action queue.
    Push,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::Pull => f.write_str("pull"),
            SyncPhase::Push => f.write_str("push"),
        }
    }
}

/// Why a sync cycle failed.
///
/// Cloneable so the last outcome can be published to status subscribers.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// The remote is unreachable; nothing was attempted.
    #[error("network unavailable")]
    NetworkUnavailable,

    /// A remote call failed; the cycle stopped at `phase`.
    #[error("remote rejected the {phase} phase: {source}")]
    RemoteRejected {
        /// Phase that failed.
        phase: SyncPhase,
        /// Underlying gateway error.
        source: GatewayError,
    },

    /// The local store failed; nothing past the failure point was changed.
    #[error("local storage error: {0}")]
    LocalStorage(#[source] Arc<StoreError>),

    /// A background store task died before finishing.
    #[error("sync task aborted: {0}")]
    Aborted(String),
}

impl SyncError {
    /// Wraps a gateway error from `phase`.
    pub fn remote(phase: SyncPhase, source: GatewayError) -> Self {
        Self::RemoteRejected { phase, source }
    }

    /// Returns true if retrying soon may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::RemoteRejected { source, .. } => source.is_retryable(),
            SyncError::NetworkUnavailable
            | SyncError::LocalStorage(_)
            | SyncError::Aborted(_) => false,
        }
    }

    /// Phase that failed, if the remote was involved.
    pub fn phase(&self) -> Option<SyncPhase> {
        match self {
            SyncError::RemoteRejected { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        Self::LocalStorage(Arc::new(err))
    }
}
