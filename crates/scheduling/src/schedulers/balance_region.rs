//! Moves a peer off the busiest store onto the least busy store that can
//! legally host it, when the two differ by more than the score tolerance.

use super::Scheduler;
use crate::view::ClusterView;
use pd_core::{Operator, OperatorKind, Step, Store};
use std::time::Duration;

pub struct BalanceRegionScheduler {
    interval: Duration,
}

impl BalanceRegionScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Scheduler for BalanceRegionScheduler {
    fn name(&self) -> &str {
        "balance-region"
    }

    fn min_interval(&self) -> Duration {
        self.interval
    }

    fn allow(&self, view: &ClusterView) -> bool {
        view.cache.all_stores().len() >= 2
    }

    fn schedule(&self, view: &ClusterView, now: i64) -> Vec<Operator> {
        let mut scored: Vec<(Store, f64)> = view
            .cache
            .all_stores()
            .into_iter()
            .filter_map(|s| view.region_score(&s).map(|score| (s, score)))
            .collect();
        if scored.len() < 2 {
            return Vec::new();
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        let (source, source_score) = scored[0].clone();
        if source_score < view.schedule.min_used_ratio || source_score > view.schedule.max_used_ratio {
            return Vec::new();
        }

        let region_ids = view.cache.get_store_regions(source.id, None);
        if region_ids.is_empty() {
            return Vec::new();
        }
        let region_id = region_ids[rand::random::<usize>() % region_ids.len()];
        let Some(region) = view.cache.get_region(region_id) else {
            return Vec::new();
        };

        let Some((target, target_score)) = scored
            .iter()
            .rev()
            .find(|(s, _)| region.peer_on_store(s.id).is_none())
            .cloned()
        else {
            return Vec::new();
        };

        if view.scores_equal(source_score, target_score) {
            return Vec::new();
        }

        vec![Operator::new(
            region.id,
            region.epoch,
            OperatorKind::Region,
            vec![
                Step::AddPeer { store: target.id, is_learner: true },
                Step::PromoteLearner { store: target.id },
                Step::RemovePeer { store: source.id },
            ],
            now,
            pd_core::operator::default_timeout_ms(OperatorKind::Region),
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
    fn moves_peer_from_busiest_to_emptiest_store() {
        let cache = ClusterCache::default();
        let mut busy = Store::new(StoreId(1), "1:1");
        busy.stats.capacity = 100;
        busy.stats.available = 10;
        cache.put_store(busy);
        let mut idle = Store::new(StoreId(2), "2:1");
        idle.stats.capacity = 100;
        idle.stats.available = 95;
        cache.put_store(idle);

        let mut region = Region::new(RegionId(1), vec![], vec![], vec![Peer::voter(PeerId(1), StoreId(1))]);
        region.leader = Some(Peer::voter(PeerId(1), StoreId(1)));
        cache.put_region(region);

        let mut schedule = ScheduleConfig::default();
        schedule.max_used_ratio = 1.0;
        let repl = ReplicationConfig::default();
        let placement = PlacementRuleSet::flat(1);
        let view = ClusterView::new(&cache, &schedule, &repl, &placement, &[]);

        let scheduler = BalanceRegionScheduler::new(Duration::from_millis(0));
        let ops = scheduler.schedule(&view, 0);
        assert_eq!(ops.len(), 1);
        assert!(matches!(ops[0].steps.front(), Some(Step::AddPeer { store: StoreId(2), .. })));
    }

    #[test]
    fn balanced_cluster_produces_no_operator() {
        let cache = ClusterCache::default();
        let mut a = Store::new(StoreId(1), "1:1");
        a.stats.capacity = 100;
        a.stats.available = 50;
        cache.put_store(a);
        let mut b = Store::new(StoreId(2), "2:1");
        b.stats.capacity = 100;
        b.stats.available = 50;
        cache.put_store(b);
        cache.put_region(Region::new(RegionId(1), vec![], vec![], vec![Peer::voter(PeerId(1), StoreId(1))]));

        let schedule = ScheduleConfig::default();
        let repl = ReplicationConfig::default();
        let placement = PlacementRuleSet::flat(1);
        let view = ClusterView::new(&cache, &schedule, &repl, &placement, &[]);
        let scheduler = BalanceRegionScheduler::new(Duration::from_millis(0));
        assert!(scheduler.schedule(&view, 0).is_empty());
    }
}
