//! `PdService`: the full RPC surface as a plain Rust trait, mirroring
//! `examples/system-pclub-rust-study/.../tikv/src/pd/mod.rs`'s `PdClient`
//! trait on the client side of the same protocol. `PdServer` is the
//! in-process implementation used by tests and by `pd-server`'s own
//! dispatcher; a real deployment would put a tonic/axum transport in front
//! of it (see the `rpc` feature).

use crate::error::{Error, Result, ServiceError};
use parking_lot::RwLock;
use pd_cluster::ClusterCache;
use pd_coordinator::Coordinator;
use pd_core::{Region, RegionId, Step, Store, StoreId};
use pd_metastore::election::MemberInfo;
use pd_metastore::{IdAllocator, LeadershipHandle, SafePointTracker};
use pd_scheduling::{OperatorController, Scheduler};
use pd_tso::TsoAllocator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub cluster_id: u64,
    pub sender_id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseHeader {
    pub cluster_id: u64,
    pub error: Option<ServiceError>,
}

impl ResponseHeader {
    fn ok(cluster_id: u64) -> Self {
        Self { cluster_id, error: None }
    }
}

/// Every state-changing method returns `Result<T>`; the dispatcher (not
/// shown here, since this crate's dispatch is a direct function call) is
/// responsible for folding an `Err` into a `ResponseHeader`'s `error` field
/// before it reaches the wire.
pub trait PdService {
    fn bootstrap(&self, header: RequestHeader, first_store: Store, first_region: Region) -> Result<ResponseHeader>;
    fn is_bootstrapped(&self) -> bool;
    fn get_members(&self) -> Vec<MemberInfo>;
    fn tso(&self, count: u32) -> Result<u64>;
    fn alloc_id(&self) -> Result<u64>;
    fn get_store(&self, id: StoreId) -> Option<Store>;
    fn put_store(&self, store: Store) -> Result<()>;
    fn remove_store(&self, id: StoreId) -> Result<()>;
    fn get_region(&self, key: &[u8]) -> Option<Region>;
    fn get_region_by_id(&self, id: RegionId) -> Option<Region>;
    fn scan_regions(&self, start: &[u8], end: &[u8], limit: usize) -> Vec<Region>;
    fn store_heartbeat(&self, store_id: StoreId, stats: pd_core::StoreStats) -> Result<()>;
    fn region_heartbeat(&self, region: Region) -> Result<Option<Step>>;
    fn ask_split(&self, region_id: RegionId) -> Result<(RegionId, Vec<pd_core::PeerId>)>;
    fn report_split(&self, left: Region, right: Region) -> Result<()>;
    fn ask_batch_split(&self, region_id: RegionId, count: usize) -> Result<Vec<(RegionId, Vec<pd_core::PeerId>)>>;
    fn report_batch_split(&self, regions: Vec<Region>) -> Result<()>;
    fn get_gc_safe_point(&self) -> Result<u64>;
    fn update_gc_safe_point(&self, safe_point: u64) -> Result<u64>;
    fn update_service_gc_safe_point(&self, service_id: String, safe_point: u64) -> Result<u64>;
    fn scatter_region(&self, region_id: RegionId) -> Result<()>;
    fn get_operator(&self, region_id: RegionId) -> Option<pd_core::Operator>;
}

/// Owns every long-lived component for one leadership term. `leadership` is
/// swapped out by the caller (via [`PdServer::set_leadership`]) whenever a
/// campaign or demotion changes it; every other field is shared across
/// terms since cache/controller state naturally drains itself on
/// demotion (see [`Coordinator::run`]).
pub struct PdServer {
    cluster_id: u64,
    cache: Arc<ClusterCache>,
    controller: Arc<OperatorController>,
    coordinator: Arc<Coordinator>,
    tso: Arc<TsoAllocator>,
    ids: Arc<IdAllocator>,
    leadership: RwLock<Option<Arc<LeadershipHandle>>>,
    bootstrapped: AtomicBool,
    members: RwLock<Vec<MemberInfo>>,
}

impl PdServer {
    pub fn new(
        cluster_id: u64,
        cache: Arc<ClusterCache>,
        controller: Arc<OperatorController>,
        coordinator: Arc<Coordinator>,
        tso: Arc<TsoAllocator>,
        ids: Arc<IdAllocator>,
    ) -> Self {
        Self {
            cluster_id,
            cache,
            controller,
            coordinator,
            tso,
            ids,
            leadership: RwLock::new(None),
            bootstrapped: AtomicBool::new(false),
            members: RwLock::new(Vec::new()),
        }
    }

    pub fn set_leadership(&self, handle: Option<Arc<LeadershipHandle>>) {
        *self.leadership.write() = handle;
    }

    pub fn set_members(&self, members: Vec<MemberInfo>) {
        *self.members.write() = members;
    }

    fn leader_handle(&self) -> Result<Arc<LeadershipHandle>> {
        self.leadership
            .read()
            .clone()
            .filter(|h| !h.is_expired())
            .ok_or(Error::MetaStore(pd_metastore::Error::NotLeader))
    }
}

impl PdService for PdServer {
    fn bootstrap(&self, header: RequestHeader, first_store: Store, first_region: Region) -> Result<ResponseHeader> {
        if self.bootstrapped.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyBootstrapped);
        }
        self.cache.put_store(first_store);
        self.cache.put_region(first_region);
        Ok(ResponseHeader::ok(header.cluster_id.max(self.cluster_id)))
    }

    fn is_bootstrapped(&self) -> bool {
        self.bootstrapped.load(Ordering::Acquire)
    }

    fn get_members(&self) -> Vec<MemberInfo> {
        self.members.read().clone()
    }

    fn tso(&self, count: u32) -> Result<u64> {
        let handle = self.leader_handle()?;
        Ok(self.tso.generate(&handle, count)?.pack())
    }

    fn alloc_id(&self) -> Result<u64> {
        let handle = self.leader_handle()?;
        Ok(self.ids.alloc(&handle)?)
    }

    fn get_store(&self, id: StoreId) -> Option<Store> {
        self.cache.get_store(id)
    }

    fn put_store(&self, store: Store) -> Result<()> {
        self.cache.put_store(store);
        Ok(())
    }

    fn remove_store(&self, id: StoreId) -> Result<()> {
        let mut store = self.cache.get_store(id).ok_or(pd_core::Error::StoreNotFound(id))?;
        store.transition_to(pd_core::StoreState::Offline)?;
        self.cache.put_store(store);
        Ok(())
    }

    fn get_region(&self, key: &[u8]) -> Option<Region> {
        self.cache.get_region_by_key(key)
    }

    fn get_region_by_id(&self, id: RegionId) -> Option<Region> {
        self.cache.get_region(id)
    }

    fn scan_regions(&self, start: &[u8], end: &[u8], limit: usize) -> Vec<Region> {
        self.cache.scan_regions(start, end, limit)
    }

    fn store_heartbeat(&self, store_id: StoreId, stats: pd_core::StoreStats) -> Result<()> {
        pd_cluster::process_store_heartbeat(&self.cache, store_id, stats, now_ms())?;
        Ok(())
    }

    fn region_heartbeat(&self, region: Region) -> Result<Option<Step>> {
        let region_id = region.id;
        pd_cluster::process_region_heartbeat(&self.cache, region)?;
        if let Some(cached) = self.cache.get_region(region_id) {
            pd_cluster::update_hot_stats(&self.cache, &cached, now_ms());
        }
        Ok(self.controller.next_step_for_heartbeat(region_id))
    }

    fn ask_split(&self, region_id: RegionId) -> Result<(RegionId, Vec<pd_core::PeerId>)> {
        let region = self.cache.get_region(region_id).ok_or(pd_core::Error::RegionNotFound(region_id))?;
        let handle = self.leader_handle()?;
        let new_region_id = RegionId(self.ids.alloc(&handle)?);
        let peer_ids = region
            .peers
            .iter()
            .map(|_| Ok(pd_core::PeerId(self.ids.alloc(&handle)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok((new_region_id, peer_ids))
    }

    fn report_split(&self, left: Region, right: Region) -> Result<()> {
        self.cache.put_region(left);
        self.cache.put_region(right);
        Ok(())
    }

    fn ask_batch_split(&self, region_id: RegionId, count: usize) -> Result<Vec<(RegionId, Vec<pd_core::PeerId>)>> {
        let region = self.cache.get_region(region_id).ok_or(pd_core::Error::RegionNotFound(region_id))?;
        let handle = self.leader_handle()?;
        (0..count)
            .map(|_| {
                let new_region_id = RegionId(self.ids.alloc(&handle)?);
                let peer_ids = region
                    .peers
                    .iter()
                    .map(|_| Ok(pd_core::PeerId(self.ids.alloc(&handle)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok((new_region_id, peer_ids))
            })
            .collect()
    }

    fn report_batch_split(&self, regions: Vec<Region>) -> Result<()> {
        for region in regions {
            self.cache.put_region(region);
        }
        Ok(())
    }

    fn get_gc_safe_point(&self) -> Result<u64> {
        let handle = self.leader_handle()?;
        Ok(SafePointTracker::cluster_safe_point(&handle)?)
    }

    fn update_gc_safe_point(&self, safe_point: u64) -> Result<u64> {
        let handle = self.leader_handle()?;
        Ok(SafePointTracker::recompute_cluster_safe_point(&handle).map(|_| safe_point)?)
    }

    fn update_service_gc_safe_point(&self, service_id: String, safe_point: u64) -> Result<u64> {
        let handle = self.leader_handle()?;
        SafePointTracker::update_service_safe_point(&handle, &service_id, safe_point)?;
        Ok(SafePointTracker::recompute_cluster_safe_point(&handle)?)
    }

    fn scatter_region(&self, region_id: RegionId) -> Result<()> {
        let region = self.cache.get_region(region_id).ok_or(pd_core::Error::RegionNotFound(region_id))?;
        let config = self.coordinator.config();
        let view = pd_scheduling::ClusterView::new(&self.cache, &config.schedule, &config.replication, &config.placement, &config.namespaces);

        // Reuse the range scatterer, scoped down to just this region's own
        // key span, so a single `ScatterRegion` call spreads its leader the
        // same way a `scatter-range` job spreads a whole table's.
        let scatterer = pd_scheduling::schedulers::scatter_range::ScatterRangeScheduler::new(
            format!("scatter-region-{}", region_id.0),
            region.start_key.clone(),
            region.end_key.clone(),
            std::time::Duration::from_millis(0),
        );
        for op in scatterer.schedule(&view, now_ms()) {
            self.controller.add_waiting_operator(op, &config.schedule)?;
        }

        if let Some(op) = pd_scheduling::checkers::replica::check(&region, &view, now_ms()) {
            self.controller.add_waiting_operator(op, &config.schedule)?;
        }
        Ok(())
    }

    fn get_operator(&self, region_id: RegionId) -> Option<pd_core::Operator> {
        self.controller.get_operator(region_id)
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}
