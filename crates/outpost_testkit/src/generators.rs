//! Property-based test generators using proptest.
//!
//! Provides strategies for generating datasets, queues and submit outcomes
//! that hold the invariants the store enforces (unique record IDs, non-blank
//! action kinds).

use outpost_store::{ActionKind, DatasetName, QueuedAction, Record};
use proptest::prelude::*;
use serde_json::{json, Value};

/// Strategy for generating valid dataset names.
pub fn dataset_name_strategy() -> impl Strategy<Value = DatasetName> {
    prop::string::string_regex("[a-z][a-z0-9_.-]{0,23}")
        .expect("Invalid regex")
        .prop_map(|name| DatasetName::new(name).expect("regex yields valid names"))
}

/// Strategy for generating small JSON bodies.
pub fn body_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z ]{0,16}".prop_map(Value::String),
        (any::<u32>(), "[a-z]{1,8}").prop_map(|(qty, sku)| json!({ "sku": sku, "qty": qty })),
    ]
}

/// Strategy for generating one dataset's contents, with unique record IDs in
/// shuffled order.
pub fn records_strategy(max_len: usize) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::btree_map("[a-z0-9]{1,8}", body_strategy(), 0..=max_len)
        .prop_map(|map| {
            map.into_iter()
                .map(|(id, body)| Record::new(id, body))
                .collect::<Vec<_>>()
        })
        .prop_shuffle()
}

/// Strategy for generating action kinds.
pub fn action_kind_strategy() -> impl Strategy<Value = ActionKind> {
    prop_oneof![
        Just("sale"),
        Just("refund"),
        Just("visit.logged"),
        Just("work_order.complete"),
    ]
    .prop_map(|kind| ActionKind::new(kind).expect("static kinds are valid"))
}

/// Strategy for generating a single queued action.
pub fn queued_action_strategy() -> impl Strategy<Value = QueuedAction> {
    (action_kind_strategy(), body_strategy())
        .prop_map(|(kind, payload)| QueuedAction::new(kind, payload))
}

/// Strategy for generating an action queue of up to `max_len` actions.
pub fn queue_strategy(max_len: usize) -> impl Strategy<Value = Vec<QueuedAction>> {
    prop::collection::vec(queued_action_strategy(), 0..=max_len)
}

/// Strategy for generating a queue together with a per-item success flag,
/// as a remote would report for a batch submit.
pub fn queue_with_outcomes_strategy(
    max_len: usize,
) -> impl Strategy<Value = (Vec<QueuedAction>, Vec<bool>)> {
    queue_strategy(max_len).prop_flat_map(|queue| {
        let len = queue.len();
        (Just(queue), prop::collection::vec(any::<bool>(), len))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    proptest! {
        #[test]
        fn generated_records_have_unique_ids(records in records_strategy(32)) {
            let ids: HashSet<_> = records.iter().map(|r| r.id.clone()).collect();
            prop_assert_eq!(ids.len(), records.len());
        }

        #[test]
        fn outcomes_match_queue_length((queue, outcomes) in queue_with_outcomes_strategy(16)) {
            prop_assert_eq!(queue.len(), outcomes.len());
        }
    }
}
