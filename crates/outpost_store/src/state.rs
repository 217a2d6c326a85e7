//! In-memory view of committed store contents.

use crate::types::{ActionId, DatasetName, QueuedAction, Record, RecordId, SequenceNumber};
use std::collections::{BTreeMap, HashSet};

/// One change inside a transaction.
///
/// These are the only three ways store contents ever change.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Replace every record of a dataset with `records`.
    ReplaceDataset {
        /// Dataset being replaced.
        name: DatasetName,
        /// The complete new contents.
        records: Vec<Record>,
    },
    /// Append an action at the tail of the queue.
    AppendAction(QueuedAction),
    /// Remove the listed actions from the queue.
    RemoveActions(Vec<ActionId>),
}

impl Mutation {
    /// Short label used in logs and journal dumps.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::ReplaceDataset { .. } => "replace-dataset",
            Self::AppendAction(_) => "append-action",
            Self::RemoveActions(_) => "remove-actions",
        }
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct StoreState {
    pub(crate) datasets: BTreeMap<DatasetName, BTreeMap<RecordId, Record>>,
    pub(crate) queue: Vec<QueuedAction>,
    pub(crate) sequence: SequenceNumber,
}

impl StoreState {
    pub(crate) fn contains_action(&self, id: &ActionId) -> bool {
        self.queue.iter().any(|a| a.id == *id)
    }

    pub(crate) fn apply(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::ReplaceDataset { name, records } => {
                let contents = records.into_iter().map(|r| (r.id.clone(), r)).collect();
                self.datasets.insert(name, contents);
            }
            Mutation::AppendAction(action) => self.queue.push(action),
            Mutation::RemoveActions(ids) => {
                let ids: HashSet<ActionId> = ids.into_iter().collect();
                self.queue.retain(|a| !ids.contains(&a.id));
            }
        }
    }
}
