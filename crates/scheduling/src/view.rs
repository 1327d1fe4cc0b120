//! Read-only snapshot of cache + configuration handed to checkers and
//! schedulers. Neither borrows mutably; they only ever produce candidate
//! operators, never write the cache directly.

use pd_core::config::{NamespaceConfig, ReplicationConfig, ScheduleConfig};
use pd_core::PlacementRuleSet;
use pd_cluster::ClusterCache;

pub struct ClusterView<'a> {
    pub cache: &'a ClusterCache,
    pub schedule: &'a ScheduleConfig,
    pub replication: &'a ReplicationConfig,
    pub placement: &'a PlacementRuleSet,
    pub namespaces: &'a [NamespaceConfig],
}

impl<'a> ClusterView<'a> {
    pub fn new(
        cache: &'a ClusterCache,
        schedule: &'a ScheduleConfig,
        replication: &'a ReplicationConfig,
        placement: &'a PlacementRuleSet,
        namespaces: &'a [NamespaceConfig],
    ) -> Self {
        Self {
            cache,
            schedule,
            replication,
            placement,
            namespaces,
        }
    }

    /// A store's region score: used ratio relative to cluster mean, stores
    /// busy sending/receiving snapshots excluded from candidacy entirely.
    pub fn region_score(&self, store: &pd_core::Store) -> Option<f64> {
        if store.stats.sending_snap_count >= self.schedule.max_snap_sending
            || store.stats.receiving_snap_count >= self.schedule.max_snap_receiving
        {
            return None;
        }
        Some(store.stats.used_ratio())
    }

    pub fn mean_used_ratio(&self) -> f64 {
        let stores = self.cache.all_stores();
        if stores.is_empty() {
            return 0.0;
        }
        let sum: f64 = stores.iter().map(|s| s.stats.used_ratio()).sum();
        sum / stores.len() as f64
    }

    /// Two scores are interchangeable when within `score_tolerance`.
    pub fn scores_equal(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.schedule.score_tolerance
    }
}
