use std::sync::Arc;

use clap::Parser;
use pd_cluster::ClusterCache;
use pd_coordinator::{Coordinator, CoordinatorConfig};
use pd_metastore::election::{Election, MemberInfo};
use pd_metastore::InMemoryMetaStore;
use pd_scheduling::schedulers::{
    balance_leader::BalanceLeaderScheduler, balance_region::BalanceRegionScheduler,
    hot_region::{HotRegionKind, HotRegionScheduler},
};
use pd_scheduling::{OperatorController, SchedulerRegistry};
use pd_server::{Cli, PdServer, ServerConfig};
use pd_tso::TsoAllocator;
use std::time::Duration;

const CLUSTER_ID: u64 = 1;
const OPERATOR_HISTORY_CAP: usize = 1024;

fn default_scheduler_registry() -> SchedulerRegistry {
    let mut registry = SchedulerRegistry::new();
    registry.register(Box::new(BalanceRegionScheduler::new(Duration::from_secs(30))));
    registry.register(Box::new(BalanceLeaderScheduler::new(Duration::from_secs(30))));
    registry.register(Box::new(HotRegionScheduler::new(HotRegionKind::Read, Duration::from_secs(10))));
    registry.register(Box::new(HotRegionScheduler::new(HotRegionKind::Write, Duration::from_secs(10))));
    registry
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();
    let mut config = match ServerConfig::load_file(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            std::process::exit(1);
        }
    };
    config.apply_cli(&cli);

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        tracing::error!(error = %e, dir = ?config.data_dir, "failed to create data directory");
        std::process::exit(1);
    }

    tracing::info!(listen_addr = %config.listen_addr, advertise_addr = %config.advertise_addr, "starting control-plane server");

    // A real deployment points this at the configured meta-store
    // endpoints over its client; the in-process store stands in for it
    // here, the same test-double role `InMemoryMetaStore` already plays
    // in every other crate's unit tests.
    let store = InMemoryMetaStore::new();
    let election = Election::new(store, b"leader".to_vec());
    let member = MemberInfo {
        member_id: CLUSTER_ID,
        address: config.advertise_addr.clone(),
        deploy_path: config.data_dir.display().to_string(),
        binary_version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: String::new(),
        leader_priority: 0,
    };
    let handle = match election.campaign(&member) {
        Ok(h) => Arc::new(h),
        Err(e) => {
            tracing::error!(error = %e, "failed to campaign for leadership");
            std::process::exit(1);
        }
    };

    let cache = Arc::new(ClusterCache::default());
    let controller = Arc::new(OperatorController::new(OPERATOR_HISTORY_CAP));
    let coordinator_config = CoordinatorConfig {
        schedule: config.schedule.clone(),
        replication: config.replication.clone(),
        ..CoordinatorConfig::default()
    };
    let coordinator = Coordinator::new(
        Arc::clone(&cache),
        Arc::clone(&controller),
        default_scheduler_registry(),
        coordinator_config,
    );

    let tso = Arc::new(TsoAllocator::new(config.tso_save_interval_ms));
    if let Err(e) = tso.initialize(&handle) {
        tracing::error!(error = %e, "failed to initialize timestamp oracle");
        std::process::exit(1);
    }
    let ids = Arc::new(pd_metastore::IdAllocator::new(1000));

    let server = Arc::new(PdServer::new(CLUSTER_ID, Arc::clone(&cache), Arc::clone(&controller), Arc::clone(&coordinator), Arc::clone(&tso), ids));
    server.set_leadership(Some(Arc::clone(&handle)));
    server.set_members(vec![member]);

    let write_behind = Arc::new(pd_cluster::WriteBehindBuffer::new());
    let write_behind_task = Arc::clone(&write_behind).spawn(Arc::clone(&handle), Duration::from_millis(500));

    let coordinator_task = tokio::spawn(Arc::clone(&coordinator).run(Arc::clone(&handle)));

    let tso_save_task = {
        let tso = Arc::clone(&tso);
        let handle = Arc::clone(&handle);
        let token = handle.child_token();
        let interval = Duration::from_millis(config.tso_save_interval_ms.max(1) as u64);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = tso.update_once(&handle) {
                            tracing::warn!(error = %e, "tso window save failed");
                        }
                    }
                    () = token.cancelled() => return,
                }
            }
        })
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            handle.expire();
        }
        () = handle.child_token().cancelled() => {}
    }

    let _ = tokio::join!(coordinator_task, tso_save_task, write_behind_task);
    tracing::info!("control-plane server stopped");
}
