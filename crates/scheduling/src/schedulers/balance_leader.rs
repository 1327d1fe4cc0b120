//! Moves leadership from the store with the most leaders to the store
//! with the fewest, driven by leader-count deviation rather than size.

use super::Scheduler;
use crate::view::ClusterView;
use pd_core::{Operator, OperatorKind, Step, Store};
use std::time::Duration;

pub struct BalanceLeaderScheduler {
    interval: Duration,
}

impl BalanceLeaderScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    fn leader_score(store: &Store) -> f64 {
        store.stats.leader_count as f64
    }
}

impl Scheduler for BalanceLeaderScheduler {
    fn name(&self) -> &str {
        "balance-leader"
    }

    fn min_interval(&self) -> Duration {
        self.interval
    }

    fn allow(&self, view: &ClusterView) -> bool {
        view.cache.all_stores().len() >= 2
    }

    fn schedule(&self, view: &ClusterView, now: i64) -> Vec<Operator> {
        let mut stores = view.cache.all_stores();
        if stores.len() < 2 {
            return Vec::new();
        }
        stores.sort_by(|a, b| Self::leader_score(b).total_cmp(&Self::leader_score(a)));
        let source = stores[0].clone();
        let target = stores.last().unwrap().clone();
        if view.scores_equal(Self::leader_score(&source), Self::leader_score(&target)) {
            return Vec::new();
        }

        let leader_regions = view.cache.get_store_regions(source.id, Some(pd_cluster::Role::Leader));
        let Some(&region_id) = leader_regions.first() else {
            return Vec::new();
        };
        let Some(region) = view.cache.get_region(region_id) else {
            return Vec::new();
        };
        if region.peer_on_store(target.id).is_none() {
            // Target doesn't hold this region; leadership can only move to
            // an existing voter peer.
            return Vec::new();
        }

        vec![Operator::new(
            region.id,
            region.epoch,
            OperatorKind::Leader,
            vec![Step::TransferLeader { from: source.id, to: target.id }],
            now,
            pd_core::operator::default_timeout_ms(OperatorKind::Leader),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pd_core::config::{NamespaceConfig, ReplicationConfig, ScheduleConfig};
    use pd_core::{Peer, PeerId, PlacementRuleSet, Region, RegionId, StoreId};
    use pd_cluster::ClusterCache;

    #[test]
    fn transfers_leader_to_least_loaded_store() {
        let cache = ClusterCache::default();
        let mut busy = Store::new(StoreId(1), "1:1");
        busy.stats.leader_count = 10;
        cache.put_store(busy);
        let idle = Store::new(StoreId(2), "2:1");
        cache.put_store(idle);

        let peer_a = Peer::voter(PeerId(1), StoreId(1));
        let peer_b = Peer::voter(PeerId(2), StoreId(2));
        let mut region = Region::new(RegionId(1), vec![], vec![], vec![peer_a, peer_b]);
        region.leader = Some(peer_a);
        cache.put_region(region);

        let schedule = ScheduleConfig::default();
        let repl = ReplicationConfig::default();
        let placement = PlacementRuleSet::flat(2);
        let view = ClusterView::new(&cache, &schedule, &repl, &placement, &[]);

        let scheduler = BalanceLeaderScheduler::new(Duration::from_millis(0));
        let ops = scheduler.schedule(&view, 0);
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            ops[0].steps.front(),
            Some(Step::TransferLeader { from: StoreId(1), to: StoreId(2) })
        ));
    }
}
