// Property tests for marking arithmetic and transition firing.

use kgflow_net::{create_arc, create_place, create_transition, Marking, PetriNet};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn diamond_net() -> PetriNet {
    PetriNet::new(
        vec![
            create_place("p1", false, false),
            create_place("p2", false, false),
            create_place("p3", false, false),
            create_place("p4", false, false),
        ],
        vec![create_transition("t", "")],
        vec![
            create_arc("p1", "t"),
            create_arc("p2", "t"),
            create_arc("t", "p3"),
            create_arc("t", "p4"),
        ],
        "diamond",
    )
    .unwrap()
}

proptest! {
    // Firing changes exactly the preset and postset places, by the arc weights.
    #[test]
    fn firing_is_local(
        p1 in 1u64..5,
        p2 in 1u64..5,
        p3 in 0u64..5,
        p4 in 0u64..5,
        extra in 0u64..5,
    ) {
        let net = diamond_net();
        let marking = Marking::from_map(BTreeMap::from([
            ("p1".to_string(), p1),
            ("p2".to_string(), p2),
            ("p3".to_string(), p3),
            ("p4".to_string(), p4),
            ("bystander".to_string(), extra),
        ]));

        let next = net.fire("t", &marking).unwrap();
        prop_assert_eq!(next.get("p1"), p1 - 1);
        prop_assert_eq!(next.get("p2"), p2 - 1);
        prop_assert_eq!(next.get("p3"), p3 + 1);
        prop_assert_eq!(next.get("p4"), p4 + 1);
        prop_assert_eq!(next.get("bystander"), extra);
    }

    // add/remove round-trips leave the marking unchanged.
    #[test]
    fn add_then_remove_is_identity(count in 1u64..100) {
        let marking = Marking::from([("p", 3u64)]);
        let back = marking.add("p", count).remove("p", count).unwrap();
        prop_assert_eq!(back, marking);
    }

    // A disabled transition never fires, whatever the bystander load.
    #[test]
    fn disabled_never_fires(p2 in 0u64..5, noise in 0u64..10) {
        let net = diamond_net();
        let marking = Marking::from_map(BTreeMap::from([
            ("p2".to_string(), p2),
            ("elsewhere".to_string(), noise),
        ]));
        // p1 is empty, so t must be disabled
        prop_assert!(!net.is_enabled("t", &marking));
        prop_assert!(net.fire("t", &marking).is_err());
    }
}
