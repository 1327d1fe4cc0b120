//! Wires checkers, schedulers, and the operator controller together and
//! drives them on owned tasks for the lifetime of one leadership term.
//!
//! The coordinator starts when a node is handed a [`LeadershipHandle`] and
//! stops the moment that handle expires: three tasks (patrol, scheduler,
//! push) share one child cancellation token and unwind together, the same
//! task-per-loop-tied-to-a-cancellation-token shape used for every other
//! long-running loop in the system.

pub mod config;
pub mod error;

use pd_cluster::ClusterCache;
use pd_core::config::NamespaceConfig;
use pd_core::Region;
use pd_metastore::LeadershipHandle;
use pd_scheduling::checkers;
use pd_scheduling::{ClusterView, OperatorController, SchedulerRegistry};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use config::CoordinatorConfig;
pub use error::{Error, Result};

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}

/// Picks, for a region, the first configured namespace it matches. A region
/// "belongs" to a namespace when at least one of its peers sits on a store
/// carrying the namespace's required label; this mirrors how placement
/// rules themselves are matched against peer stores rather than against
/// the region directly, since regions carry no label of their own.
fn owning_namespace<'a>(
    region: &Region,
    cache: &ClusterCache,
    namespaces: &'a [NamespaceConfig],
) -> Option<&'a NamespaceConfig> {
    namespaces.iter().find(|ns| {
        region.peers.iter().any(|p| {
            cache
                .get_store(p.store_id)
                .and_then(|s| s.label(&ns.required_label.0).map(|v| v == ns.required_label.1))
                .unwrap_or(false)
        })
    })
}

pub struct Coordinator {
    cache: Arc<ClusterCache>,
    controller: Arc<OperatorController>,
    registry: Mutex<SchedulerRegistry>,
    config: RwLock<CoordinatorConfig>,
}

impl Coordinator {
    pub fn new(
        cache: Arc<ClusterCache>,
        controller: Arc<OperatorController>,
        registry: SchedulerRegistry,
        config: CoordinatorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            cache,
            controller,
            registry: Mutex::new(registry),
            config: RwLock::new(config),
        })
    }

    pub fn config(&self) -> CoordinatorConfig {
        self.config.read().clone()
    }

    pub fn set_config(&self, config: CoordinatorConfig) {
        *self.config.write() = config;
    }

    pub fn cache(&self) -> &Arc<ClusterCache> {
        &self.cache
    }

    pub fn controller(&self) -> &Arc<OperatorController> {
        &self.controller
    }

    /// Runs the patrol/scheduler/push loops until `handle` expires, then
    /// drops every in-flight operator without marking it terminal (it will
    /// time out harmlessly on whichever node takes over leadership next)
    /// and returns.
    pub async fn run(self: Arc<Self>, handle: Arc<LeadershipHandle>) {
        let token = handle.child_token();

        let patrol = tokio::spawn({
            let this = Arc::clone(&self);
            let token = token.clone();
            async move { this.patrol_loop(token).await }
        });
        let scheduler = tokio::spawn({
            let this = Arc::clone(&self);
            let token = token.clone();
            async move { this.scheduler_loop(token).await }
        });
        let push = tokio::spawn({
            let this = Arc::clone(&self);
            let token = token.clone();
            async move { this.push_loop(token).await }
        });

        token.cancelled().await;
        patrol.abort();
        scheduler.abort();
        push.abort();
        let _ = tokio::join!(patrol, scheduler, push);

        self.controller.drop_all_on_demotion();
        tracing::info!("coordinator stopped, leadership term ended");
    }

    async fn patrol_loop(&self, token: CancellationToken) {
        let mut cursor: Vec<u8> = Vec::new();
        loop {
            let interval = self.config().patrol_interval;
            tokio::select! {
                _ = tokio::time::sleep(interval) => self.patrol_tick(&mut cursor),
                () = token.cancelled() => return,
            }
        }
    }

    fn patrol_tick(&self, cursor: &mut Vec<u8>) {
        let config = self.config();
        let view = ClusterView::new(&self.cache, &config.schedule, &config.replication, &config.placement, &config.namespaces);
        let now = now_ms();

        let mut regions = self.cache.scan_regions(&cursor[..], &[], config.patrol_batch_size);
        if regions.is_empty() && !cursor.is_empty() {
            cursor.clear();
            regions = self.cache.scan_regions(&cursor[..], &[], config.patrol_batch_size);
        }
        if let Some(last) = regions.last() {
            *cursor = last.end_key.clone();
        }

        for region in &regions {
            let neighbor = if region.end_key.is_empty() {
                None
            } else {
                self.cache.get_region_by_key(&region.end_key)
            };
            let namespace = owning_namespace(region, &self.cache, &config.namespaces);
            if let Some(op) = checkers::run(region, neighbor.as_ref(), namespace, &view, now) {
                if let Err(e) = self.controller.add_waiting_operator(op, &config.schedule) {
                    tracing::debug!(region_id = ?region.id, error = %e, "patrol-generated operator not admitted");
                }
            }
        }
    }

    async fn scheduler_loop(&self, token: CancellationToken) {
        loop {
            let interval = self.config().scheduler_tick_interval;
            tokio::select! {
                _ = tokio::time::sleep(interval) => self.scheduler_tick(),
                () = token.cancelled() => return,
            }
        }
    }

    fn scheduler_tick(&self) {
        let config = self.config();
        let view = ClusterView::new(&self.cache, &config.schedule, &config.replication, &config.placement, &config.namespaces);
        let now = now_ms();
        let ops = self.registry.lock().tick(&view, now);
        for op in ops {
            let region_id = op.region_id;
            if let Err(e) = self.controller.add_waiting_operator(op, &config.schedule) {
                tracing::debug!(region_id = ?region_id, error = %e, "scheduler-generated operator not admitted");
            }
        }
    }

    async fn push_loop(&self, token: CancellationToken) {
        loop {
            let interval = self.config().push_tick_interval;
            tokio::select! {
                _ = tokio::time::sleep(interval) => self.controller.push_operators(&self.cache, now_ms()),
                () = token.cancelled() => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pd_core::{Peer, PeerId, Region, RegionId, Store, StoreId};
    use pd_metastore::election::{Election, MemberInfo};
    use pd_metastore::InMemoryMetaStore;
    use std::time::Duration as StdDuration;

    fn campaign() -> Arc<LeadershipHandle> {
        let store = InMemoryMetaStore::new();
        let election = Election::new(store, b"leader".to_vec());
        let member = MemberInfo {
            member_id: 1,
            address: "127.0.0.1:2379".into(),
            deploy_path: String::new(),
            binary_version: String::new(),
            git_hash: String::new(),
            leader_priority: 0,
        };
        Arc::new(election.campaign(&member).unwrap())
    }

    #[test]
    fn owning_namespace_matches_on_peer_store_label() {
        let cache = ClusterCache::default();
        let mut store = Store::new(StoreId(1), "1:1");
        store.labels.insert("zone".into(), "dc1".into());
        cache.put_store(store);
        let region = Region::new(RegionId(1), vec![], vec![], vec![Peer::voter(PeerId(1), StoreId(1))]);

        let ns = NamespaceConfig { name: "dc1-ns".into(), required_label: ("zone".into(), "dc1".into()) };
        let found = owning_namespace(&region, &cache, std::slice::from_ref(&ns));
        assert_eq!(found.map(|n| n.name.as_str()), Some("dc1-ns"));

        let other = NamespaceConfig { name: "dc2-ns".into(), required_label: ("zone".into(), "dc2".into()) };
        assert!(owning_namespace(&region, &cache, std::slice::from_ref(&other)).is_none());
    }

    #[test]
    fn patrol_tick_wraps_cursor_around_full_keyspace() {
        let cache = Arc::new(ClusterCache::default());
        cache.put_store(Store::new(StoreId(1), "1:1"));
        cache.put_store(Store::new(StoreId(2), "2:1"));
        cache.put_store(Store::new(StoreId(3), "3:1"));
        let peers = vec![
            Peer::voter(PeerId(1), StoreId(1)),
            Peer::voter(PeerId(2), StoreId(2)),
            Peer::voter(PeerId(3), StoreId(3)),
        ];
        cache.put_region(Region::new(RegionId(1), vec![], vec![], peers));

        let controller = Arc::new(OperatorController::new(16));
        let coordinator = Coordinator::new(
            cache,
            controller,
            SchedulerRegistry::new(),
            CoordinatorConfig { patrol_batch_size: 8, ..Default::default() },
        );

        let mut cursor = Vec::new();
        coordinator.patrol_tick(&mut cursor);
        assert!(cursor.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn run_exits_and_drops_operators_on_demotion() {
        let cache = Arc::new(ClusterCache::default());
        let controller = Arc::new(OperatorController::new(16));
        let coordinator = Coordinator::new(
            cache,
            Arc::clone(&controller),
            SchedulerRegistry::new(),
            CoordinatorConfig {
                patrol_interval: StdDuration::from_millis(5),
                scheduler_tick_interval: StdDuration::from_millis(5),
                push_tick_interval: StdDuration::from_millis(5),
                ..Default::default()
            },
        );

        let handle = campaign();
        let run_handle = Arc::clone(&handle);
        let task = tokio::spawn(coordinator.clone().run(run_handle));
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        handle.expire();
        tokio::time::timeout(StdDuration::from_secs(1), task).await.unwrap().unwrap();
    }
}
