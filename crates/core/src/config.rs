//! Shared, typed configuration documents, stored under
//! `config/{schedule, replication, namespace/<ns>, label-property,
//! cluster-version}`.
//!
//! Each document below is a plain struct with explicit defaults, not an
//! opaque JSON blob threaded through by key path.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationConfig {
    pub max_replicas: usize,
    pub location_labels: Vec<String>,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            max_replicas: 3,
            location_labels: Vec::new(),
        }
    }
}

/// Balancer tuning: capacity ratios, snapshot caps, balance interval, max
/// balance count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub min_used_ratio: f64,
    pub max_used_ratio: f64,
    /// Stores whose scores differ by less than this are considered equal,
    /// so two stores within the same score bucket are interchangeable.
    pub score_tolerance: f64,
    pub max_snap_sending: u32,
    pub max_snap_receiving: u32,
    pub max_pending_peer: u32,
    pub max_merge: u32,
    pub balance_interval_ms: u64,
    pub max_balance_count: u32,
    pub max_store_down_time_ms: i64,
    pub region_merge_size_bytes: u64,
    pub region_merge_keys: u64,
    pub region_split_size_bytes: u64,
    pub region_split_keys: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            min_used_ratio: 0.0,
            max_used_ratio: 0.8,
            score_tolerance: 0.05,
            max_snap_sending: 3,
            max_snap_receiving: 3,
            max_pending_peer: 16,
            max_merge: 8,
            balance_interval_ms: 1000,
            max_balance_count: 4,
            max_store_down_time_ms: 30 * 60 * 1000,
            region_merge_size_bytes: 20 * 1024 * 1024,
            region_merge_keys: 200_000,
            region_split_size_bytes: 96 * 1024 * 1024,
            region_split_keys: 960_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamespaceConfig {
    pub name: String,
    pub required_label: (String, String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterVersion(pub String);

impl Default for ClusterVersion {
    fn default() -> Self {
        Self("1.0.0".to_string())
    }
}
