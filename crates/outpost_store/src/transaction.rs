//! Write transactions.

use crate::error::{StoreError, StoreResult};
use crate::state::{Mutation, StoreState};
use crate::types::{ActionId, DatasetName, QueuedAction, Record};
use std::collections::HashSet;

/// A set of changes committed atomically.
///
/// Obtained from [`crate::LocalStore::transaction`]. Changes are buffered and
/// only become visible, in order, when the closure returns `Ok` and the
/// journal write succeeds. Reads through the store inside the closure see the
/// state as of before the transaction.
pub struct Transaction<'a> {
    view: &'a StoreState,
    mutations: Vec<Mutation>,
    appended: HashSet<ActionId>,
    removed: HashSet<ActionId>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(view: &'a StoreState) -> Self {
        Self {
            view,
            mutations: Vec::new(),
            appended: HashSet::new(),
            removed: HashSet::new(),
        }
    }

    /// Replaces the whole of dataset `name` with `records`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] if two records share an ID; a
    /// dataset is a set keyed by record ID and must equal exactly what was
    /// supplied.
    pub fn replace_dataset(&mut self, name: DatasetName, records: Vec<Record>) -> StoreResult<()> {
        let mut seen = HashSet::with_capacity(records.len());
        if let Some(dup) = records.iter().find(|r| !seen.insert(&r.id)) {
            return Err(StoreError::invalid_argument(format!(
                "dataset {name} contains record {} twice",
                dup.id
            )));
        }
        self.mutations.push(Mutation::ReplaceDataset { name, records });
        Ok(())
    }

    /// Appends `action` to the tail of the queue.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] if an action with the same ID
    /// is already queued.
    pub fn append_action(&mut self, action: QueuedAction) -> StoreResult<()> {
        if self.is_queued(&action.id) {
            return Err(StoreError::invalid_argument(format!(
                "action {} is already queued",
                action.id
            )));
        }
        self.removed.remove(&action.id);
        self.appended.insert(action.id);
        self.mutations.push(Mutation::AppendAction(action));
        Ok(())
    }

    /// Removes the listed actions. IDs that are not queued are ignored.
    ///
    /// Returns how many queued actions will be removed.
    pub fn remove_actions<'i, I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = &'i ActionId>,
    {
        let mut live = Vec::new();
        for id in ids {
            if self.is_queued(id) && self.removed.insert(*id) {
                live.push(*id);
            }
        }
        let count = live.len();
        if count > 0 {
            self.mutations.push(Mutation::RemoveActions(live));
        }
        count
    }

    /// True if `id` is queued, taking this transaction's changes into account.
    #[must_use]
    pub fn is_queued(&self, id: &ActionId) -> bool {
        (self.appended.contains(id) || self.view.contains_action(id)) && !self.removed.contains(id)
    }

    /// True if nothing has been changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub(crate) fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActionKind;
    use serde_json::json;

    fn action() -> QueuedAction {
        QueuedAction::new(ActionKind::new("sale").unwrap(), json!({}))
    }

    #[test]
    fn duplicate_record_ids_are_rejected() {
        let state = StoreState::default();
        let mut txn = Transaction::new(&state);
        let result = txn.replace_dataset(
            DatasetName::new("products").unwrap(),
            vec![Record::new("a", json!(1)), Record::new("a", json!(2))],
        );
        assert!(matches!(result, Err(StoreError::InvalidArgument { .. })));
        assert!(txn.is_empty());
    }

    #[test]
    fn appending_a_queued_id_twice_fails() {
        let state = StoreState::default();
        let mut txn = Transaction::new(&state);
        let a = action();
        txn.append_action(a.clone()).unwrap();
        assert!(txn.append_action(a).is_err());
    }

    #[test]
    fn removing_unknown_ids_records_nothing() {
        let state = StoreState::default();
        let mut txn = Transaction::new(&state);
        assert_eq!(txn.remove_actions(&[ActionId::generate()]), 0);
        assert!(txn.is_empty());
    }

    #[test]
    fn remove_sees_appends_in_same_transaction() {
        let state = StoreState::default();
        let mut txn = Transaction::new(&state);
        let a = action();
        txn.append_action(a.clone()).unwrap();

        assert_eq!(txn.remove_actions([&a.id, &a.id]), 1);
        assert!(!txn.is_queued(&a.id));
        assert_eq!(txn.into_mutations().len(), 2);
    }

    #[test]
    fn remove_sees_committed_queue() {
        let mut state = StoreState::default();
        let a = action();
        state.apply(Mutation::AppendAction(a.clone()));

        let mut txn = Transaction::new(&state);
        assert!(txn.is_queued(&a.id));
        assert_eq!(txn.remove_actions(&[a.id]), 1);
        assert!(!txn.is_queued(&a.id));
    }
}
