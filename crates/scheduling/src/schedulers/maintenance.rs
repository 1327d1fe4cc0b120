//! Operator-driven test/maintenance schedulers: evict or grant leadership
//! for a named store, or shuffle leaders/regions at random for chaos
//! testing and controlled drains.

use super::Scheduler;
use crate::view::ClusterView;
use pd_core::{Operator, OperatorKind, Step, StoreId};
use std::time::Duration;

/// Continuously transfers every leader off `store_id` — used to drain a
/// store ahead of planned maintenance.
pub struct EvictLeaderScheduler {
    store_id: StoreId,
    interval: Duration,
}

impl EvictLeaderScheduler {
    pub fn new(store_id: StoreId, interval: Duration) -> Self {
        Self { store_id, interval }
    }
}

impl Scheduler for EvictLeaderScheduler {
    fn name(&self) -> &str {
        "evict-leader"
    }

    fn min_interval(&self) -> Duration {
        self.interval
    }

    fn allow(&self, view: &ClusterView) -> bool {
        view.cache.get_store(self.store_id).is_some()
    }

    fn schedule(&self, view: &ClusterView, now: i64) -> Vec<Operator> {
        let leading = view.cache.get_store_regions(self.store_id, Some(pd_cluster::Role::Leader));
        let Some(&region_id) = leading.first() else {
            return Vec::new();
        };
        let Some(region) = view.cache.get_region(region_id) else {
            return Vec::new();
        };
        let Some(target) = region.peers.iter().find(|p| p.store_id != self.store_id && !p.is_learner) else {
            return Vec::new();
        };
        vec![Operator::new(
            region.id,
            region.epoch,
            OperatorKind::Leader,
            vec![Step::TransferLeader { from: self.store_id, to: target.store_id }],
            now,
            pd_core::operator::default_timeout_ms(OperatorKind::Leader),
        )]
    }
}

/// The mirror image of [`EvictLeaderScheduler`]: continuously transfers
/// leadership for every region with a voter on `store_id` toward it.
pub struct GrantLeaderScheduler {
    store_id: StoreId,
    interval: Duration,
}

impl GrantLeaderScheduler {
    pub fn new(store_id: StoreId, interval: Duration) -> Self {
        Self { store_id, interval }
    }
}

impl Scheduler for GrantLeaderScheduler {
    fn name(&self) -> &str {
        "grant-leader"
    }

    fn min_interval(&self) -> Duration {
        self.interval
    }

    fn allow(&self, view: &ClusterView) -> bool {
        view.cache.get_store(self.store_id).is_some()
    }

    fn schedule(&self, view: &ClusterView, now: i64) -> Vec<Operator> {
        let hosted = view.cache.get_store_regions(self.store_id, Some(pd_cluster::Role::Follower));
        let Some(&region_id) = hosted.first() else {
            return Vec::new();
        };
        let Some(region) = view.cache.get_region(region_id) else {
            return Vec::new();
        };
        let Some(leader) = region.leader else {
            return Vec::new();
        };
        if leader.store_id == self.store_id {
            return Vec::new();
        }
        vec![Operator::new(
            region.id,
            region.epoch,
            OperatorKind::Leader,
            vec![Step::TransferLeader { from: leader.store_id, to: self.store_id }],
            now,
            pd_core::operator::default_timeout_ms(OperatorKind::Leader),
        )]
    }
}

/// Randomly transfers a leader somewhere else in its own voter set — a
/// chaos/soak-testing tool, not a production balancer.
pub struct ShuffleLeaderScheduler {
    interval: Duration,
}

impl ShuffleLeaderScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Scheduler for ShuffleLeaderScheduler {
    fn name(&self) -> &str {
        "shuffle-leader"
    }

    fn min_interval(&self) -> Duration {
        self.interval
    }

    fn allow(&self, view: &ClusterView) -> bool {
        view.cache.all_stores().len() >= 2
    }

    fn schedule(&self, view: &ClusterView, now: i64) -> Vec<Operator> {
        let stores = view.cache.all_stores();
        if stores.is_empty() {
            return Vec::new();
        }
        let pick = &stores[rand::random::<usize>() % stores.len()];
        let leading = view.cache.get_store_regions(pick.id, Some(pd_cluster::Role::Leader));
        let Some(&region_id) = leading.first() else {
            return Vec::new();
        };
        let Some(region) = view.cache.get_region(region_id) else {
            return Vec::new();
        };
        let candidates: Vec<_> = region.peers.iter().filter(|p| p.store_id != pick.id && !p.is_learner).collect();
        if candidates.is_empty() {
            return Vec::new();
        }
        let target = candidates[rand::random::<usize>() % candidates.len()];
        vec![Operator::new(
            region.id,
            region.epoch,
            OperatorKind::Leader,
            vec![Step::TransferLeader { from: pick.id, to: target.store_id }],
            now,
            pd_core::operator::default_timeout_ms(OperatorKind::Leader),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pd_core::config::{NamespaceConfig, ReplicationConfig, ScheduleConfig};
    use pd_core::{Peer, PeerId, PlacementRuleSet, Region, RegionId, Store};
    use pd_cluster::ClusterCache;

    #[test]
    fn evict_leader_transfers_away_from_target_store() {
        let cache = ClusterCache::default();
        cache.put_store(Store::new(StoreId(1), "1:1"));
        cache.put_store(Store::new(StoreId(2), "2:1"));
        let peer_a = Peer::voter(PeerId(1), StoreId(1));
        let peer_b = Peer::voter(PeerId(2), StoreId(2));
        let mut region = Region::new(RegionId(1), vec![], vec![], vec![peer_a, peer_b]);
        region.leader = Some(peer_a);
        cache.put_region(region);

        let schedule = ScheduleConfig::default();
        let repl = ReplicationConfig::default();
        let placement = PlacementRuleSet::flat(2);
        let view = ClusterView::new(&cache, &schedule, &repl, &placement, &[]);

        let scheduler = EvictLeaderScheduler::new(StoreId(1), Duration::from_millis(0));
        let ops = scheduler.schedule(&view, 0);
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            ops[0].steps.front(),
            Some(Step::TransferLeader { from: StoreId(1), to: StoreId(2) })
        ));
    }
}
