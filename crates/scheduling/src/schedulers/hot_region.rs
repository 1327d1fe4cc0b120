//! Ranks stores by aggregate hot bytes rate and tries to move either a hot
//! leader or a hot peer to a cooler store. Two instances are registered,
//! one per `HotRegionKind`.

use super::Scheduler;
use crate::view::ClusterView;
use pd_core::{HotSpotKind, Operator, OperatorKind, Step};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotRegionKind {
    Read,
    Write,
}

impl HotRegionKind {
    fn spot_kind(self) -> HotSpotKind {
        match self {
            HotRegionKind::Read => HotSpotKind::ReadByLeader,
            HotRegionKind::Write => HotSpotKind::WriteByPeer,
        }
    }
}

pub struct HotRegionScheduler {
    kind: HotRegionKind,
    interval: Duration,
}

impl HotRegionScheduler {
    pub fn new(kind: HotRegionKind, interval: Duration) -> Self {
        Self { kind, interval }
    }
}

impl Scheduler for HotRegionScheduler {
    fn name(&self) -> &str {
        match self.kind {
            HotRegionKind::Read => "hot-region-read",
            HotRegionKind::Write => "hot-region-write",
        }
    }

    fn min_interval(&self) -> Duration {
        self.interval
    }

    fn allow(&self, view: &ClusterView) -> bool {
        view.cache.all_stores().len() >= 2
    }

    fn schedule(&self, view: &ClusterView, now: i64) -> Vec<Operator> {
        let spot_kind = self.kind.spot_kind();
        let stores = view.cache.all_stores();
        let Some(busiest) = stores
            .iter()
            .max_by(|a, b| {
                view.cache
                    .hot
                    .top_for_store(a.id)
                    .iter()
                    .map(|s| s.bytes_rate)
                    .sum::<f64>()
                    .total_cmp(
                        &view
                            .cache
                            .hot
                            .top_for_store(b.id)
                            .iter()
                            .map(|s| s.bytes_rate)
                            .sum::<f64>(),
                    )
            })
        else {
            return Vec::new();
        };

        let Some(hottest) = view
            .cache
            .hot
            .top_for_store(busiest.id)
            .into_iter()
            .find(|s| s.kind == spot_kind)
        else {
            return Vec::new();
        };
        let Some(region) = view.cache.get_region(hottest.region_id) else {
            return Vec::new();
        };

        let Some(cooler) = stores
            .iter()
            .filter(|s| s.id != busiest.id && region.peer_on_store(s.id).is_none())
            .min_by(|a, b| {
                view.cache
                    .hot
                    .top_for_store(a.id)
                    .iter()
                    .map(|s| s.bytes_rate)
                    .sum::<f64>()
                    .total_cmp(
                        &view
                            .cache
                            .hot
                            .top_for_store(b.id)
                            .iter()
                            .map(|s| s.bytes_rate)
                            .sum::<f64>(),
                    )
            })
        else {
            return Vec::new();
        };

        vec![Operator::new(
            region.id,
            region.epoch,
            OperatorKind::Region,
            vec![
                Step::AddPeer { store: cooler.id, is_learner: true },
                Step::PromoteLearner { store: cooler.id },
                Step::RemovePeer { store: busiest.id },
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
    use pd_core::{HotPeerStat, Peer, PeerId, PlacementRuleSet, Region, RegionId, Store, StoreId};
    use pd_cluster::ClusterCache;

    #[test]
    fn moves_hot_peer_off_busiest_store() {
        let cache = ClusterCache::default();
        cache.put_store(Store::new(StoreId(1), "1:1"));
        cache.put_store(Store::new(StoreId(2), "2:1"));

        let region = Region::new(RegionId(1), vec![], vec![], vec![Peer::voter(PeerId(1), StoreId(1))]);
        cache.put_region(region);

        let mut stat = HotPeerStat::new(RegionId(1), StoreId(1), HotSpotKind::WriteByPeer);
        stat.bytes_rate = 1_000_000.0;
        cache.hot.upsert(stat);

        let schedule = ScheduleConfig::default();
        let repl = ReplicationConfig::default();
        let placement = PlacementRuleSet::flat(1);
        let view = ClusterView::new(&cache, &schedule, &repl, &placement, &[]);

        let scheduler = HotRegionScheduler::new(HotRegionKind::Write, Duration::from_millis(0));
        let ops = scheduler.schedule(&view, 0);
        assert_eq!(ops.len(), 1);
        assert!(matches!(ops[0].steps.front(), Some(Step::AddPeer { store: StoreId(2), .. })));
    }
}
