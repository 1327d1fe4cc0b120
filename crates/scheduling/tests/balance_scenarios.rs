//! Balance scheduling across an imbalanced four-store cluster: the
//! registry must emit a corrective operator when the globally busiest
//! store (which hosts the region) diverges from an idle store that
//! doesn't, and stay silent once every store's usage is within tolerance.

use pd_cluster::ClusterCache;
use pd_core::config::{NamespaceConfig, ReplicationConfig, ScheduleConfig};
use pd_core::{Peer, PeerId, PlacementRuleSet, Region, RegionId, Store, StoreId};
use pd_scheduling::schedulers::balance_region::BalanceRegionScheduler;
use pd_scheduling::{ClusterView, SchedulerRegistry};
use std::time::Duration;

fn store_with_available(id: u64, available: u64) -> Store {
    let mut s = Store::new(StoreId(id), format!("{id}:1"));
    s.stats.capacity = 100;
    s.stats.available = available;
    s
}

fn cluster(available: [u64; 4]) -> ClusterCache {
    let cache = ClusterCache::default();
    for (i, avail) in available.iter().enumerate() {
        cache.put_store(store_with_available((i + 1) as u64, *avail));
    }
    // Region's three replicas sit on stores 1, 3, 4; store 2 holds none,
    // making it the only legal add target for a rebalance.
    let peers = vec![
        Peer::voter(PeerId(1), StoreId(1)),
        Peer::voter(PeerId(2), StoreId(3)),
        Peer::voter(PeerId(3), StoreId(4)),
    ];
    let mut region = Region::new(RegionId(1), vec![], vec![], peers.clone());
    region.leader = Some(peers[0]);
    cache.put_region(region);
    cache
}

fn run_registry(cache: &ClusterCache, schedule: &ScheduleConfig) -> Vec<pd_core::Operator> {
    let repl = ReplicationConfig::default();
    let placement = PlacementRuleSet::flat(3);
    let namespaces: Vec<NamespaceConfig> = Vec::new();
    let view = ClusterView::new(cache, schedule, &repl, &placement, &namespaces);
    let mut registry = SchedulerRegistry::new();
    registry.register(Box::new(BalanceRegionScheduler::new(Duration::from_millis(0))));
    registry.tick(&view, 0)
}

#[test]
fn imbalanced_cluster_emits_a_balance_operator() {
    // Store 1 is the busiest (10% available) and hosts the region; store 2
    // is nearly empty (95% available) and doesn't.
    let cache = cluster([10, 95, 50, 50]);
    let mut schedule = ScheduleConfig::default();
    schedule.min_used_ratio = 0.3;
    schedule.max_used_ratio = 1.0;

    let ops = run_registry(&cache, &schedule);
    assert_eq!(ops.len(), 1);
    assert!(matches!(ops[0].steps.front(), Some(pd_core::Step::AddPeer { store: StoreId(2), .. })));
}

#[test]
fn balanced_cluster_emits_nothing() {
    let cache = cluster([50, 52, 49, 51]);
    let schedule = ScheduleConfig::default();

    let ops = run_registry(&cache, &schedule);
    assert!(ops.is_empty());
}
