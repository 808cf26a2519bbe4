//! Property tests for the causal-chain invariant: for every aggregate
//! version sequence `v1…vn`, `vi.aggregate_version == i` and, for `i >= 2`,
//! `vi.previous_event_id == v{i-1}.event_id`.

use bytehot_events::{DomainEvent, Envelope};
use bytehot_types::{AggregateId, AggregateType};
use proptest::prelude::*;

fn change_event(n: u64) -> DomainEvent {
    DomainEvent::ClassFileChanged {
        path: format!("/proj/Service{n}.class"),
        class_name: Some(format!("Service{n}")),
        size_bytes: n,
        detected_at: chrono::Utc::now(),
    }
}

fn build_chain(length: usize) -> Vec<Envelope> {
    let aggregate_type = AggregateType::new("filewatch").unwrap();
    let aggregate_id = AggregateId::new("X").unwrap();
    let mut chain = Vec::with_capacity(length);
    let mut previous: Option<&Envelope> = None;
    for n in 0..length {
        let envelope = match previous {
            None => Envelope::for_new_session(aggregate_type.clone(), aggregate_id.clone(), change_event(n as u64)),
            Some(prev) => Envelope::for_existing_session(
                aggregate_type.clone(),
                aggregate_id.clone(),
                prev.event_id,
                prev.aggregate_version,
                change_event(n as u64),
            ),
        };
        chain.push(envelope);
        previous = chain.last();
    }
    chain
}

proptest! {
    #[test]
    fn aggregate_version_equals_position_in_chain(length in 1usize..40) {
        let chain = build_chain(length);
        for (index, envelope) in chain.iter().enumerate() {
            prop_assert_eq!(envelope.aggregate_version, (index + 1) as u64);
        }
    }

    #[test]
    fn previous_event_id_links_to_the_prior_envelope(length in 2usize..40) {
        let chain = build_chain(length);
        for window in chain.windows(2) {
            prop_assert_eq!(window[1].previous_event_id, Some(window[0].event_id));
            bytehot_events::verify_chain(&window[0], &window[1]).unwrap();
        }
    }

    #[test]
    fn first_envelope_in_any_chain_has_no_previous_event(length in 1usize..40) {
        let chain = build_chain(length);
        prop_assert_eq!(chain[0].previous_event_id, None);
        prop_assert_eq!(chain[0].aggregate_version, 1);
    }

    #[test]
    fn serde_round_trip_preserves_structural_equality_for_arbitrary_payloads(
        size_bytes in 0u64..10_000_000,
        class_name in "[A-Za-z][A-Za-z0-9_]{0,40}",
    ) {
        let aggregate_type = AggregateType::new("filewatch").unwrap();
        let aggregate_id = AggregateId::new("X").unwrap();
        let envelope = Envelope::for_new_session(
            aggregate_type,
            aggregate_id,
            DomainEvent::ClassFileChanged {
                path: format!("/proj/{class_name}.class"),
                class_name: Some(class_name),
                size_bytes,
                detected_at: chrono::Utc::now(),
            },
        );
        let json = serde_json::to_string(&envelope).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(envelope, back);
    }
}
