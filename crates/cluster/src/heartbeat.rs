//! Store and region heartbeat processing against the cluster cache.

use crate::cache::ClusterCache;
use crate::error::{Error, Result};
use pd_core::{HotSpotKind, Region, RegionId, StoreId, StoreStats};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionHeartbeatOutcome {
    /// Updated the cached region in place; peer membership changed and the
    /// caller should persist.
    UpdatedInPlace { membership_changed: bool },
    /// A split or merge arrival: `removed` lists the regions this one
    /// superseded.
    SplitOrMergeArrival { removed: Vec<RegionId> },
}

/// Apply a store heartbeat: update stats and last-heartbeat timestamp.
/// Rejects unknown or tombstoned stores.
pub fn process_store_heartbeat(
    cache: &ClusterCache,
    store_id: StoreId,
    stats: StoreStats,
    now: i64,
) -> Result<()> {
    let mut store = cache.get_store(store_id).ok_or(Error::UnknownStore(store_id))?;
    if store.is_tombstone() {
        return Err(Error::StoreTombstoned(store_id));
    }
    store.stats = stats;
    store.last_heartbeat_ts = now;
    cache.put_store(store);
    Ok(())
}

/// Apply a region heartbeat per the decision table:
/// 1. Same id, incoming epoch strictly older → stale, reject.
/// 2. Overlaps only strictly-older cached regions → split/merge arrival.
/// 3. Overlaps a cached region with equal-or-newer epoch → stale, reject.
/// 4. Otherwise, update in place.
pub fn process_region_heartbeat(
    cache: &ClusterCache,
    incoming: Region,
) -> Result<RegionHeartbeatOutcome> {
    let membership_changed = cache
        .get_region(incoming.id)
        .map(|cached| {
            if incoming.epoch.is_stale_relative_to(&cached.epoch) {
                Err(Error::StaleRegion(incoming.id))
            } else {
                Ok(cached.peers != incoming.peers)
            }
        })
        .transpose()?
        .unwrap_or(true);

    let overlapping = cache.peek_overlapping(&incoming);
    if overlapping.is_empty() {
        cache.put_region(incoming);
        return Ok(RegionHeartbeatOutcome::UpdatedInPlace { membership_changed });
    }

    for other in &overlapping {
        if !other.epoch.is_stale_relative_to(&incoming.epoch) {
            return Err(Error::StaleRegion(incoming.id));
        }
    }
    let removed = cache.put_region(incoming);
    Ok(RegionHeartbeatOutcome::SplitOrMergeArrival { removed })
}

/// Update hot-spot statistics for every peer in `region`: leaders get a
/// `ReadByLeader` and a `WriteByLeader` entry, every peer (including the
/// leader) gets a `WriteByPeer` entry for replication write load.
pub fn update_hot_stats(cache: &ClusterCache, region: &Region, now: i64) {
    for peer in &region.peers {
        let Some(store) = cache.get_store(peer.store_id) else {
            continue;
        };
        let is_leader = region.leader.map(|l| l.id) == Some(peer.id);
        let mut kinds = vec![HotSpotKind::WriteByPeer];
        if is_leader {
            kinds.push(HotSpotKind::ReadByLeader);
            kinds.push(HotSpotKind::WriteByLeader);
        }
        for kind in kinds {
            apply_one_kind(cache, region, &store.stats, peer.store_id, kind, now);
        }
    }
}

fn apply_one_kind(
    cache: &ClusterCache,
    region: &Region,
    store_stats: &StoreStats,
    store_id: StoreId,
    kind: HotSpotKind,
    now: i64,
) {
    let (bytes_rate, keys_rate, store_rate) = match kind {
        HotSpotKind::ReadByLeader => (
            region.stats.bytes_read_rate,
            region.stats.keys_read_rate,
            store_stats.bytes_read_rate,
        ),
        HotSpotKind::WriteByPeer | HotSpotKind::WriteByLeader => (
            region.stats.bytes_written_rate,
            region.stats.keys_written_rate,
            store_stats.bytes_written_rate,
        ),
    };
    let threshold = pd_core::hotspot::dynamic_threshold(store_rate, kind);
    let mut stat = cache
        .hot
        .get(store_id, region.id, kind)
        .unwrap_or_else(|| pd_core::HotPeerStat::new(region.id, store_id, kind));
    stat.observe(bytes_rate, keys_rate, now);
    if stat.is_hot(threshold) {
        stat.mark_hot();
        cache.hot.upsert(stat);
    } else if stat.mark_cold() {
        cache.hot.remove(store_id, region.id, kind);
    } else {
        cache.hot.upsert(stat);
    }
}
