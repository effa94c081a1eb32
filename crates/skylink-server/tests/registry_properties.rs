//! Property-based tests for the subscriber registry and producer slot.

use std::collections::HashSet;

use proptest::prelude::*;
use skylink_proto::Identity;
use skylink_server::{ProducerSlot, SubscriberHandle, SubscriberRegistry};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
enum Op {
    Register,
    Remove(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Register), any::<usize>().prop_map(Op::Remove)]
}

fn handle() -> SubscriberHandle {
    let (sender, _receiver) = mpsc::channel(1);
    SubscriberHandle { sender, cancel: CancellationToken::new() }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: Ids are never reused and the registry size always matches
    /// the live set, for any interleaving of registrations and removals
    #[test]
    fn prop_registry_ids_unique_and_count_consistent(ops in prop::collection::vec(op(), 1..100)) {
        let mut registry = SubscriberRegistry::new();
        let mut issued = HashSet::new();
        let mut live = Vec::new();

        for op in ops {
            match op {
                Op::Register => {
                    let id = registry.register(handle());
                    prop_assert!(issued.insert(id), "id {} reused", id);
                    live.push(id);
                },
                Op::Remove(pick) if !live.is_empty() => {
                    let id = live.swap_remove(pick % live.len());
                    prop_assert!(registry.remove(id).is_some());
                },
                Op::Remove(_) => {},
            }

            prop_assert_eq!(registry.len(), live.len());
            prop_assert_eq!(registry.snapshot().len(), live.len());
        }
    }

    /// Property: However claims and releases interleave, at most one lease
    /// exists and the slot is occupied exactly when one does
    #[test]
    fn prop_producer_slot_is_singleton(claims in prop::collection::vec(any::<bool>(), 1..50)) {
        let slot = ProducerSlot::new();
        let mut held = None;

        for claim in claims {
            if claim {
                match slot.try_claim(Identity::Producer, 0) {
                    Ok(lease) => {
                        prop_assert!(held.is_none());
                        held = Some(lease);
                    },
                    Err(_) => prop_assert!(held.is_some()),
                }
            } else {
                held = None;
            }

            prop_assert_eq!(slot.is_occupied(), held.is_some());
        }
    }
}
