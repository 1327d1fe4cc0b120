//! Split checker: regions past the size/keys threshold split, by size or
//! at a table boundary.

use crate::view::ClusterView;
use pd_core::{Operator, OperatorKind, Region, SplitPolicy, Step};

pub fn check(region: &Region, view: &ClusterView, now: i64) -> Option<Operator> {
    let over_size = region.stats.approximate_size > view.schedule.region_split_size_bytes;
    let over_keys = region.stats.approximate_keys > view.schedule.region_split_keys;
    if !over_size && !over_keys {
        return None;
    }
    let (policy, keys) = split_key(region);
    Some(Operator::new(
        region.id,
        region.epoch,
        OperatorKind::Region,
        vec![Step::SplitRegion { policy, keys }],
        now,
        pd_core::operator::default_timeout_ms(OperatorKind::Region),
    ))
}

/// Table-boundary keys take precedence when the region's start key encodes
/// a table prefix recognizable by a `t` tag byte; otherwise split at the
/// approximate midpoint of the key range.
fn split_key(region: &Region) -> (SplitPolicy, Vec<Vec<u8>>) {
    if region.start_key.first() == Some(&b't') {
        return (SplitPolicy::TableBoundary, Vec::new());
    }
    let mid = midpoint(&region.start_key, &region.end_key);
    (SplitPolicy::Size, vec![mid])
}

fn midpoint(start: &[u8], end: &[u8]) -> Vec<u8> {
    if end.is_empty() {
        let mut mid = start.to_vec();
        mid.push(0x80);
        return mid;
    }
    let len = start.len().max(end.len());
    let mut a = start.to_vec();
    let mut b = end.to_vec();
    a.resize(len, 0);
    b.resize(len, 0);
    let mut mid = vec![0u8; len];
    let mut carry = 0u16;
    for i in (0..len).rev() {
        let sum = a[i] as u16 + b[i] as u16 + carry * 256;
        mid[i] = (sum / 2) as u8;
        carry = sum % 2;
    }
    mid
}

#[cfg(test)]
mod tests {
    use super::*;
    use pd_core::config::{NamespaceConfig, ReplicationConfig, ScheduleConfig};
    use pd_core::{PlacementRuleSet, RegionId};
    use pd_cluster::ClusterCache;

    #[test]
    fn oversized_region_splits_by_size() {
        let cache = ClusterCache::default();
        let mut schedule = ScheduleConfig::default();
        schedule.region_split_size_bytes = 100;
        let repl = ReplicationConfig::default();
        let placement = PlacementRuleSet::flat(1);
        let view = ClusterView::new(&cache, &schedule, &repl, &placement, &[]);

        let mut r = Region::new(RegionId(1), b"a".to_vec(), b"z".to_vec(), vec![]);
        r.stats.approximate_size = 200;
        let op = check(&r, &view, 0).unwrap();
        assert!(matches!(op.steps.front(), Some(Step::SplitRegion { policy: SplitPolicy::Size, .. })));
    }

    #[test]
    fn table_prefixed_region_splits_at_table_boundary() {
        let cache = ClusterCache::default();
        let mut schedule = ScheduleConfig::default();
        schedule.region_split_keys = 10;
        let repl = ReplicationConfig::default();
        let placement = PlacementRuleSet::flat(1);
        let view = ClusterView::new(&cache, &schedule, &repl, &placement, &[]);

        let mut r = Region::new(RegionId(1), b"t1".to_vec(), b"t2".to_vec(), vec![]);
        r.stats.approximate_keys = 20;
        let op = check(&r, &view, 0).unwrap();
        assert!(matches!(
            op.steps.front(),
            Some(Step::SplitRegion { policy: SplitPolicy::TableBoundary, .. })
        ));
    }

    #[test]
    fn undersized_region_has_no_split() {
        let cache = ClusterCache::default();
        let schedule = ScheduleConfig::default();
        let repl = ReplicationConfig::default();
        let placement = PlacementRuleSet::flat(1);
        let view = ClusterView::new(&cache, &schedule, &repl, &placement, &[]);

        let r = Region::new(RegionId(1), b"a".to_vec(), b"z".to_vec(), vec![]);
        assert!(check(&r, &view, 0).is_none());
    }
}
