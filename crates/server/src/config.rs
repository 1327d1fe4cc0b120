//! Config file (TOML) overlaid by CLI flags. Fields mirror the ones the
//! teacher's `strata-engine` config loader exposes: a data directory, listen
//! addresses, and tuning knobs, with CLI flags taking precedence over the
//! file when both are given.

use clap::Parser;
use pd_core::config::{ReplicationConfig, ScheduleConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub meta_store_endpoints: Vec<String>,
    pub listen_addr: String,
    pub advertise_addr: String,
    pub leader_lease_secs: u64,
    pub tso_save_interval_ms: i64,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub replication: ReplicationConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            meta_store_endpoints: vec!["127.0.0.1:2379".to_string()],
            listen_addr: "0.0.0.0:2380".to_string(),
            advertise_addr: "127.0.0.1:2380".to_string(),
            leader_lease_secs: 10,
            tso_save_interval_ms: 3000,
            schedule: ScheduleConfig::default(),
            replication: ReplicationConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load_file(path: Option<&std::path::Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Ok(toml::from_str(&text)?)
            }
            None => Ok(ServerConfig::default()),
        }
    }

    /// CLI flags win over whatever the file (or default) set.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(dir) = &cli.data_dir {
            self.data_dir = dir.clone();
        }
        if !cli.meta_store_endpoints.is_empty() {
            self.meta_store_endpoints = cli.meta_store_endpoints.clone();
        }
        if let Some(addr) = &cli.listen_addr {
            self.listen_addr = addr.clone();
        }
        if let Some(addr) = &cli.advertise_addr {
            self.advertise_addr = addr.clone();
        }
        if let Some(secs) = cli.leader_lease_secs {
            self.leader_lease_secs = secs;
        }
        if let Some(ms) = cli.tso_save_interval_ms {
            self.tso_save_interval_ms = ms;
        }
    }
}

/// CLI flags overlaid onto the loaded config file; any flag left unset
/// keeps whatever the file (or the default) already had.
#[derive(Debug, Parser)]
#[command(name = "pd-server", about = "Placement-driver control plane")]
pub struct Cli {
    /// Path to a TOML config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    #[arg(long = "meta-store-endpoint")]
    pub meta_store_endpoints: Vec<String>,

    #[arg(long = "listen-addr")]
    pub listen_addr: Option<String>,

    #[arg(long = "advertise-addr")]
    pub advertise_addr: Option<String>,

    #[arg(long = "leader-lease-secs")]
    pub leader_lease_secs: Option<u64>,

    #[arg(long = "tso-save-interval-ms")]
    pub tso_save_interval_ms: Option<i64>,
}
