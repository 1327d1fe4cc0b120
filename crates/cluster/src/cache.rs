//! The cluster cache: three mutually-consistent region indices behind one
//! `RwLock`, a store table with a label index behind another, and a
//! lock-free per-store role index for concurrent heartbeat reads.

use dashmap::DashMap;
use parking_lot::RwLock;
use pd_core::{Region, RegionId, Store, StoreId};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Leader,
    Follower,
    Learner,
}

#[derive(Debug, Default)]
struct RoleSets {
    leader: FxHashSet<RegionId>,
    follower: FxHashSet<RegionId>,
    learner: FxHashSet<RegionId>,
}

impl RoleSets {
    fn set_for(&mut self, role: Role) -> &mut FxHashSet<RegionId> {
        match role {
            Role::Leader => &mut self.leader,
            Role::Follower => &mut self.follower,
            Role::Learner => &mut self.learner,
        }
    }

    fn remove_everywhere(&mut self, region_id: RegionId) {
        self.leader.remove(&region_id);
        self.follower.remove(&region_id);
        self.learner.remove(&region_id);
    }
}

#[derive(Default)]
struct RegionIndex {
    by_id: FxHashMap<RegionId, Region>,
    /// `start_key -> region id`, ordered for range scans and point lookups.
    by_start_key: BTreeMap<Vec<u8>, RegionId>,
}

#[derive(Default)]
struct StoreTable {
    by_id: FxHashMap<StoreId, Store>,
    by_label: BTreeMap<(String, String), FxHashSet<StoreId>>,
}

/// Bounded top-N hot-peer tracking, addressed by `(store_id, region_id,
/// kind)` — a store can carry a `ReadByLeader` and a `WriteByLeader` entry
/// for the same region simultaneously.
pub struct HotCache {
    stats: DashMap<(StoreId, RegionId, pd_core::HotSpotKind), pd_core::HotPeerStat>,
    top_n: usize,
}

impl HotCache {
    pub fn new(top_n: usize) -> Self {
        Self {
            stats: DashMap::new(),
            top_n,
        }
    }

    pub fn upsert(&self, stat: pd_core::HotPeerStat) {
        self.stats
            .insert((stat.store_id, stat.region_id, stat.kind), stat);
    }

    pub fn remove(&self, store_id: StoreId, region_id: RegionId, kind: pd_core::HotSpotKind) {
        self.stats.remove(&(store_id, region_id, kind));
    }

    pub fn get(
        &self,
        store_id: StoreId,
        region_id: RegionId,
        kind: pd_core::HotSpotKind,
    ) -> Option<pd_core::HotPeerStat> {
        self.stats
            .get(&(store_id, region_id, kind))
            .map(|e| e.value().clone())
    }

    /// Top-N hottest peers for a store, by smoothed bytes rate descending.
    pub fn top_for_store(&self, store_id: StoreId) -> Vec<pd_core::HotPeerStat> {
        let mut all: Vec<pd_core::HotPeerStat> = self
            .stats
            .iter()
            .filter(|e| e.key().0 == store_id)
            .map(|e| e.value().clone())
            .collect();
        all.sort_by(|a, b| b.bytes_rate.total_cmp(&a.bytes_rate));
        all.truncate(self.top_n);
        all
    }
}

/// The authoritative in-memory view of the cluster: regions, stores, and
/// hot-spot statistics. Heartbeat processing and the scheduling layer both
/// read and write through this type.
pub struct ClusterCache {
    regions: RwLock<RegionIndex>,
    stores: RwLock<StoreTable>,
    store_roles: DashMap<StoreId, RoleSets>,
    pub hot: HotCache,
}

impl Default for ClusterCache {
    fn default() -> Self {
        Self::new(16)
    }
}

impl ClusterCache {
    pub fn new(hot_top_n: usize) -> Self {
        Self {
            regions: RwLock::new(RegionIndex::default()),
            stores: RwLock::new(StoreTable::default()),
            store_roles: DashMap::new(),
            hot: HotCache::new(hot_top_n),
        }
    }

    // ---- Stores ----

    pub fn put_store(&self, store: Store) {
        let mut table = self.stores.write();
        if let Some(old) = table.by_id.get(&store.id) {
            for (k, v) in &old.labels {
                if let Some(set) = table.by_label.get_mut(&(k.clone(), v.clone())) {
                    set.remove(&store.id);
                }
            }
        }
        for (k, v) in &store.labels {
            table
                .by_label
                .entry((k.clone(), v.clone()))
                .or_default()
                .insert(store.id);
        }
        table.by_id.insert(store.id, store);
    }

    pub fn get_store(&self, id: StoreId) -> Option<Store> {
        self.stores.read().by_id.get(&id).cloned()
    }

    pub fn stores_with_label(&self, key: &str, value: &str) -> Vec<StoreId> {
        self.stores
            .read()
            .by_label
            .get(&(key.to_string(), value.to_string()))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn all_stores(&self) -> Vec<Store> {
        self.stores.read().by_id.values().cloned().collect()
    }

    // ---- Regions ----

    pub fn get_region(&self, id: RegionId) -> Option<Region> {
        self.regions.read().by_id.get(&id).cloned()
    }

    pub fn get_region_by_key(&self, key: &[u8]) -> Option<Region> {
        let index = self.regions.read();
        let candidate = index
            .by_start_key
            .range(..=key.to_vec())
            .next_back()
            .map(|(_, id)| *id)?;
        index
            .by_id
            .get(&candidate)
            .filter(|r| r.contains_key(key))
            .cloned()
    }

    /// Returns up to `limit` regions in key order starting at or after
    /// `start`; `end` bounds the scan exclusively (empty means unbounded).
    pub fn scan_regions(&self, start: &[u8], end: &[u8], limit: usize) -> Vec<Region> {
        let index = self.regions.read();
        let range = if end.is_empty() {
            index.by_start_key.range(start.to_vec()..)
        } else {
            index.by_start_key.range(start.to_vec()..end.to_vec())
        };
        range
            .take(limit)
            .filter_map(|(_, id)| index.by_id.get(id).cloned())
            .collect()
    }

    /// Insert or replace a region, first removing any cached region whose
    /// key range overlaps it. Returns the ids of regions removed this way.
    pub fn put_region(&self, region: Region) -> Vec<RegionId> {
        let mut index = self.regions.write();
        let overlapping: Vec<RegionId> = index
            .by_id
            .values()
            .filter(|r| r.id != region.id && r.overlaps(&region))
            .map(|r| r.id)
            .collect();
        for id in &overlapping {
            self.remove_region_locked(&mut index, *id);
        }
        // Replacing the same id: drop its old role entries before
        // reindexing so peers dropped from the new version don't linger.
        self.remove_region_locked(&mut index, region.id);
        self.reindex_roles(&region);
        index
            .by_start_key
            .insert(region.start_key.clone(), region.id);
        index.by_id.insert(region.id, region);
        overlapping
    }

    fn remove_region_locked(&self, index: &mut RegionIndex, id: RegionId) {
        if let Some(r) = index.by_id.remove(&id) {
            index.by_start_key.remove(&r.start_key);
            for peer in &r.peers {
                if let Some(mut entry) = self.store_roles.get_mut(&peer.store_id) {
                    entry.remove_everywhere(id);
                }
            }
        }
    }

    fn reindex_roles(&self, region: &Region) {
        for peer in &region.peers {
            let role = if region.leader.map(|l| l.id) == Some(peer.id) {
                Role::Leader
            } else if peer.is_learner {
                Role::Learner
            } else {
                Role::Follower
            };
            let mut entry = self.store_roles.entry(peer.store_id).or_default();
            entry.remove_everywhere(region.id);
            entry.set_for(role).insert(region.id);
        }
    }

    /// Cached regions (excluding `region.id` itself) whose key range
    /// overlaps `region`, without mutating anything.
    pub fn peek_overlapping(&self, region: &Region) -> Vec<Region> {
        let index = self.regions.read();
        index
            .by_id
            .values()
            .filter(|r| r.id != region.id && r.overlaps(region))
            .cloned()
            .collect()
    }

    pub fn get_store_regions(&self, store_id: StoreId, role_filter: Option<Role>) -> Vec<RegionId> {
        let Some(entry) = self.store_roles.get(&store_id) else {
            return Vec::new();
        };
        match role_filter {
            Some(Role::Leader) => entry.leader.iter().copied().collect(),
            Some(Role::Follower) => entry.follower.iter().copied().collect(),
            Some(Role::Learner) => entry.learner.iter().copied().collect(),
            None => entry
                .leader
                .iter()
                .chain(entry.follower.iter())
                .chain(entry.learner.iter())
                .copied()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pd_core::{Peer, PeerId};

    fn region(id: u64, start: &[u8], end: &[u8], peers: Vec<Peer>) -> Region {
        Region::new(RegionId(id), start.to_vec(), end.to_vec(), peers)
    }

    #[test]
    fn get_region_by_key_finds_containing_region() {
        let cache = ClusterCache::default();
        cache.put_region(region(1, b"a", b"m", vec![]));
        cache.put_region(region(2, b"m", b"", vec![]));

        assert_eq!(cache.get_region_by_key(b"c").unwrap().id, RegionId(1));
        assert_eq!(cache.get_region_by_key(b"z").unwrap().id, RegionId(2));
        assert!(cache.get_region_by_key(b"0").is_none());
    }

    #[test]
    fn put_region_removes_overlapping() {
        let cache = ClusterCache::default();
        cache.put_region(region(1, b"a", b"z", vec![]));
        let removed = cache.put_region(region(2, b"m", b"n", vec![]));
        assert_eq!(removed, vec![RegionId(1)]);
        assert!(cache.get_region(RegionId(1)).is_none());
        assert!(cache.get_region(RegionId(2)).is_some());
    }

    #[test]
    fn scan_regions_respects_order_and_limit() {
        let cache = ClusterCache::default();
        cache.put_region(region(1, b"a", b"b", vec![]));
        cache.put_region(region(2, b"b", b"c", vec![]));
        cache.put_region(region(3, b"c", b"", vec![]));

        let scanned = cache.scan_regions(b"", b"", 2);
        assert_eq!(scanned.iter().map(|r| r.id).collect::<Vec<_>>(), vec![RegionId(1), RegionId(2)]);
    }

    #[test]
    fn store_role_index_tracks_leader_and_followers() {
        let cache = ClusterCache::default();
        let peer_a = Peer::voter(PeerId(1), StoreId(1));
        let peer_b = Peer::voter(PeerId(2), StoreId(2));
        let mut r = region(1, b"a", b"", vec![peer_a, peer_b]);
        r.leader = Some(peer_a);
        cache.put_region(r);

        assert_eq!(
            cache.get_store_regions(StoreId(1), Some(Role::Leader)),
            vec![RegionId(1)]
        );
        assert_eq!(
            cache.get_store_regions(StoreId(2), Some(Role::Follower)),
            vec![RegionId(1)]
        );
        assert!(cache.get_store_regions(StoreId(2), Some(Role::Leader)).is_empty());
    }

    #[test]
    fn label_index_finds_stores() {
        let cache = ClusterCache::default();
        let mut s = Store::new(StoreId(1), "a:1");
        s.labels.insert("zone".into(), "a".into());
        cache.put_store(s);
        assert_eq!(cache.stores_with_label("zone", "a"), vec![StoreId(1)]);
    }

    #[test]
    fn hot_cache_top_n_orders_by_bytes_rate() {
        let hot = HotCache::new(2);
        for (region, rate) in [(1u64, 10.0), (2, 50.0), (3, 30.0)] {
            let mut stat = pd_core::HotPeerStat::new(
                RegionId(region),
                StoreId(1),
                pd_core::HotSpotKind::ReadByLeader,
            );
            stat.bytes_rate = rate;
            hot.upsert(stat);
        }
        let top = hot.top_for_store(StoreId(1));
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].region_id, RegionId(2));
        assert_eq!(top[1].region_id, RegionId(3));
    }
}
