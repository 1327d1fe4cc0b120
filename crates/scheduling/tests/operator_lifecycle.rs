//! Operator admission, timeout, and per-store capacity accounting, driven
//! through `OperatorController`'s public surface only.

use pd_core::config::ScheduleConfig;
use pd_core::{Operator, OperatorKind, OperatorState, RegionEpoch, RegionId, Step, StoreId};
use pd_scheduling::OperatorController;
use proptest::prelude::*;

fn remove_peer_op(region: RegionId, store: StoreId, timeout_ms: i64) -> Operator {
    Operator::new(
        region,
        RegionEpoch::default(),
        OperatorKind::Region,
        vec![Step::RemovePeer { store }],
        0,
        timeout_ms,
    )
}

/// A timed-out operator's store reservation must be released, so a second
/// operator that was stalled at capacity can be admitted afterward.
#[test]
fn timeout_releases_the_store_reservation() {
    let controller = OperatorController::new(16);
    let mut schedule = ScheduleConfig::default();
    schedule.max_pending_peer = 1;

    let op_a = remove_peer_op(RegionId(1), StoreId(1), 100);
    controller.add_waiting_operator(op_a, &schedule).unwrap();

    let op_b = remove_peer_op(RegionId(2), StoreId(1), 100);
    let err = controller.add_waiting_operator(op_b.clone(), &schedule).unwrap_err();
    assert!(matches!(err, pd_scheduling::Error::StalledAtCapacity(RegionId(2), StoreId(1))));

    let cache = pd_cluster::ClusterCache::default();
    controller.push_operators(&cache, 200);
    assert!(controller.get_operator(RegionId(1)).is_none());
    assert_eq!(controller.history()[0].state, OperatorState::Timeout);

    controller.add_waiting_operator(op_b, &schedule).unwrap();
    assert!(controller.get_operator(RegionId(2)).is_some());
}

proptest! {
    /// For every region id touched by an arbitrary sequence of submissions,
    /// the controller holds at most one non-terminal operator at a time.
    #[test]
    fn at_most_one_live_operator_per_region(
        region_ids in proptest::collection::vec(1u64..4, 1..40),
        kinds in proptest::collection::vec(0u8..3, 1..40),
    ) {
        let controller = OperatorController::new(64);
        let schedule = ScheduleConfig::default();
        let n = region_ids.len().min(kinds.len());
        for i in 0..n {
            let kind = match kinds[i] {
                0 => OperatorKind::Leader,
                1 => OperatorKind::Region,
                _ => OperatorKind::AdminOp,
            };
            let op = Operator::new(
                RegionId(region_ids[i]),
                RegionEpoch::default(),
                kind,
                vec![Step::RemovePeer { store: StoreId(region_ids[i]) }],
                0,
                1_000_000,
            );
            let _ = controller.add_waiting_operator(op, &schedule);
        }
        let mut seen = std::collections::HashSet::new();
        for id in region_ids {
            let region = RegionId(id);
            if !seen.insert(region) {
                continue;
            }
            // At most one entry ever lives in `in_flight` per region id by
            // construction of `add_waiting_operator`; this just confirms
            // nothing slipped through as a second live entry.
            let live = controller.get_operator(region);
            prop_assert!(live.map(|o| !o.is_terminal()).unwrap_or(true));
        }
    }
}
