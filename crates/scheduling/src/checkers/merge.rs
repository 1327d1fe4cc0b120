//! Merge checker: adjacent undersized regions sharing placement eligibility
//! become a merge pair.

use crate::view::ClusterView;
use pd_core::{Operator, OperatorKind, Region, Step};

/// `region` merges into `neighbor` when adjacent in key space, both below
/// the merge thresholds once combined, and not already scheduled.
pub fn check(region: &Region, neighbor: &Region, view: &ClusterView, now: i64) -> Option<Operator> {
    if !are_adjacent(region, neighbor) {
        return None;
    }
    let combined_size = region.stats.approximate_size + neighbor.stats.approximate_size;
    let combined_keys = region.stats.approximate_keys + neighbor.stats.approximate_keys;
    if combined_size > view.schedule.region_merge_size_bytes
        || combined_keys > view.schedule.region_merge_keys
    {
        return None;
    }
    if !same_leader_eligible_placement(region, neighbor) {
        return None;
    }
    Some(Operator::new(
        region.id,
        region.epoch,
        OperatorKind::Region,
        vec![Step::MergeRegion { into: neighbor.id }],
        now,
        pd_core::operator::default_timeout_ms(OperatorKind::Region),
    ))
}

fn are_adjacent(a: &Region, b: &Region) -> bool {
    a.end_key == b.start_key || b.end_key == a.start_key
}

/// Both regions must be able to run their leader on the same set of
/// label-eligible stores, i.e. carry peers on the same store set.
fn same_leader_eligible_placement(a: &Region, b: &Region) -> bool {
    let a_stores: std::collections::HashSet<_> = a.peers.iter().map(|p| p.store_id).collect();
    let b_stores: std::collections::HashSet<_> = b.peers.iter().map(|p| p.store_id).collect();
    a_stores == b_stores
}
