//! Core type definitions for the local store.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Longest accepted dataset name, in bytes.
pub const MAX_DATASET_NAME_LEN: usize = 64;

/// Identifier of a journal transaction.
///
/// Transaction IDs increase monotonically within a store and are only used to
/// pair journal entries with their commit marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Commit sequence number.
///
/// Every committed transaction gets the next sequence number; the snapshot
/// records the last sequence it contains so replay can skip older commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// Creates a sequence number.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the following sequence number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

/// Name of a reference dataset such as `products` or `customers`.
///
/// Names are 1 to 64 bytes of ASCII letters, digits, `_`, `-` and `.`, and
/// not made of dots alone, so they are safe to embed in URLs and file names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetName(String);

impl DatasetName {
    /// Creates a dataset name, validating it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for empty, oversized,
    /// dot-only or non-conforming names.
    pub fn new(name: impl Into<String>) -> StoreResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(StoreError::invalid_argument("dataset name is empty"));
        }
        if name.len() > MAX_DATASET_NAME_LEN {
            return Err(StoreError::invalid_argument(format!(
                "dataset name exceeds {MAX_DATASET_NAME_LEN} bytes: {name}"
            )));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(StoreError::invalid_argument(format!(
                "dataset name {name:?} contains {c:?}"
            )));
        }
        // `.` and `..` are path segments, not names.
        if name.bytes().all(|b| b == b'.') {
            return Err(StoreError::invalid_argument(format!(
                "dataset name {name:?} is only dots"
            )));
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DatasetName {
    type Error = StoreError;

    fn try_from(value: String) -> StoreResult<Self> {
        Self::new(value)
    }
}

impl From<DatasetName> for String {
    fn from(value: DatasetName) -> Self {
        value.0
    }
}

impl FromStr for DatasetName {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        Self::new(s)
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier of a record inside a dataset.
///
/// Remote numeric identifiers are kept as their decimal text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a record ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Extracts an identifier from a JSON value: strings as-is, integers as
    /// decimal text. Anything else yields `None`.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => Some(Self(n.to_string())),
            _ => None,
        }
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A record of a reference dataset.
///
/// The body is opaque to the store: it is whatever the remote returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable identifier.
    pub id: RecordId,
    /// Record contents.
    pub body: serde_json::Value,
}

impl Record {
    /// Creates a record.
    pub fn new(id: impl Into<RecordId>, body: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            body,
        }
    }
}

/// Locally generated identifier of a queued action.
///
/// Assigned once at enqueue time and never changed; it is the join key
/// between a submission and the remote's per-item results, and the key the
/// remote deduplicates resubmissions by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(Uuid);

impl ActionId {
    /// Generates a fresh random ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl FromStr for ActionId {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| StoreError::invalid_argument(format!("invalid action id {s:?}: {e}")))
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Tag identifying what a queued action does, e.g. `sale` or
/// `work_order.complete`. The remote interprets it; the store does not.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActionKind(String);

impl ActionKind {
    /// Creates an action kind.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] if `kind` is blank.
    pub fn new(kind: impl Into<String>) -> StoreResult<Self> {
        let kind = kind.into();
        if kind.trim().is_empty() {
            return Err(StoreError::invalid_argument("action kind is empty"));
        }
        Ok(Self(kind))
    }

    /// Returns the kind as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ActionKind {
    type Error = StoreError;

    fn try_from(value: String) -> StoreResult<Self> {
        Self::new(value)
    }
}

impl From<ActionKind> for String {
    fn from(value: ActionKind) -> Self {
        value.0
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A user action recorded locally and awaiting remote confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    /// Identifier, fixed at creation.
    pub id: ActionId,
    /// What the action does.
    pub kind: ActionKind,
    /// Action data, opaque to the store.
    pub payload: serde_json::Value,
    /// When the action was recorded.
    pub created_at: DateTime<Utc>,
}

impl QueuedAction {
    /// Creates an action with a fresh ID, stamped now.
    #[must_use]
    pub fn new(kind: ActionKind, payload: serde_json::Value) -> Self {
        Self {
            id: ActionId::generate(),
            kind,
            payload,
            created_at: Utc::now(),
        }
    }
}
