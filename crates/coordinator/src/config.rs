//! The snapshot of tuning knobs a running [`crate::Coordinator`] consults.
//! Reloading config means building a new snapshot and swapping it in; no
//! component holds a mutable reference to individual fields.

use pd_core::config::{NamespaceConfig, ReplicationConfig, ScheduleConfig};
use pd_core::PlacementRuleSet;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub schedule: ScheduleConfig,
    pub replication: ReplicationConfig,
    pub placement: PlacementRuleSet,
    pub namespaces: Vec<NamespaceConfig>,
    /// How often the patrol loop scans a batch of regions.
    pub patrol_interval: Duration,
    /// Number of regions scanned per patrol tick.
    pub patrol_batch_size: usize,
    /// How often the scheduler loop polls registered schedulers.
    pub scheduler_tick_interval: Duration,
    /// How often the push loop advances in-flight operators.
    pub push_tick_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let max_replicas = ReplicationConfig::default().max_replicas;
        Self {
            schedule: ScheduleConfig::default(),
            replication: ReplicationConfig::default(),
            placement: PlacementRuleSet::flat(max_replicas),
            namespaces: Vec::new(),
            patrol_interval: Duration::from_millis(500),
            patrol_batch_size: 256,
            scheduler_tick_interval: Duration::from_millis(200),
            push_tick_interval: Duration::from_millis(200),
        }
    }
}
