//! Spreads leaders uniformly across stores for a named `[start, end)` key
//! range — used to avoid a single store accumulating every leader in a
//! freshly split table range.

use super::Scheduler;
use crate::view::ClusterView;
use pd_core::{Operator, OperatorKind, Step};
use rustc_hash::FxHashMap;
use std::time::Duration;

pub struct ScatterRangeScheduler {
    name: String,
    start: Vec<u8>,
    end: Vec<u8>,
    interval: Duration,
}

impl ScatterRangeScheduler {
    pub fn new(name: impl Into<String>, start: Vec<u8>, end: Vec<u8>, interval: Duration) -> Self {
        Self { name: name.into(), start, end, interval }
    }
}

impl Scheduler for ScatterRangeScheduler {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_interval(&self) -> Duration {
        self.interval
    }

    fn allow(&self, view: &ClusterView) -> bool {
        view.cache.all_stores().len() >= 2
    }

    fn schedule(&self, view: &ClusterView, now: i64) -> Vec<Operator> {
        let regions = view.cache.scan_regions(&self.start, &self.end, usize::MAX);
        if regions.is_empty() {
            return Vec::new();
        }
        let mut leader_counts: FxHashMap<pd_core::StoreId, u32> = FxHashMap::default();
        for store in view.cache.all_stores() {
            leader_counts.insert(store.id, 0);
        }
        for region in &regions {
            if let Some(leader) = region.leader {
                *leader_counts.entry(leader.store_id).or_insert(0) += 1;
            }
        }

        for region in &regions {
            let Some(leader) = region.leader else { continue };
            let leader_count = *leader_counts.get(&leader.store_id).unwrap_or(&0);
            let Some((&lightest_store, &lightest_count)) = region
                .peers
                .iter()
                .filter_map(|p| leader_counts.get_key_value(&p.store_id))
                .min_by_key(|(_, count)| **count)
            else {
                continue;
            };
            if lightest_store != leader.store_id && lightest_count + 1 < leader_count {
                return vec![Operator::new(
                    region.id,
                    region.epoch,
                    OperatorKind::Leader,
                    vec![Step::TransferLeader { from: leader.store_id, to: lightest_store }],
                    now,
                    pd_core::operator::default_timeout_ms(OperatorKind::Leader),
                )];
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pd_core::config::{NamespaceConfig, ReplicationConfig, ScheduleConfig};
    use pd_core::{Peer, PeerId, PlacementRuleSet, Region, RegionId, Store, StoreId};
    use pd_cluster::ClusterCache;

    #[test]
    fn moves_leader_to_lighter_store_in_range() {
        let cache = ClusterCache::default();
        cache.put_store(Store::new(StoreId(1), "1:1"));
        cache.put_store(Store::new(StoreId(2), "2:1"));

        let peer_a = Peer::voter(PeerId(1), StoreId(1));
        let peer_b = Peer::voter(PeerId(2), StoreId(2));
        for (id, leader_store) in [(1u64, StoreId(1)), (2, StoreId(1)), (3, StoreId(1))] {
            let mut r = Region::new(RegionId(id), vec![id as u8], vec![id as u8 + 1], vec![peer_a, peer_b]);
            r.leader = Some(if leader_store == StoreId(1) { peer_a } else { peer_b });
            cache.put_region(r);
        }

        let schedule = ScheduleConfig::default();
        let repl = ReplicationConfig::default();
        let placement = PlacementRuleSet::flat(2);
        let view = ClusterView::new(&cache, &schedule, &repl, &placement, &[]);

        let scheduler = ScatterRangeScheduler::new("scatter-t", vec![0], vec![10], Duration::from_millis(0));
        let ops = scheduler.schedule(&view, 0);
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            ops[0].steps.front(),
            Some(Step::TransferLeader { from: StoreId(1), to: StoreId(2) })
        ));
    }
}
