//! The cluster cache and heartbeat processing layer: the authoritative
//! in-memory view of stores and regions, kept current by store and region
//! heartbeats and consulted by the scheduling layer.

pub mod cache;
pub mod error;
pub mod heartbeat;
pub mod write_behind;

pub use cache::{ClusterCache, HotCache, Role};
pub use error::{Error, Result};
pub use heartbeat::{
    process_region_heartbeat, process_store_heartbeat, update_hot_stats, RegionHeartbeatOutcome,
};
pub use write_behind::WriteBehindBuffer;
