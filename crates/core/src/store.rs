//! Store data model.

use crate::error::{Error, Result};
use crate::ids::StoreId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A store's lifecycle state. `Up -> Offline -> Tombstone` is the only
/// legal transition chain; `Tombstone` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreState {
    Up,
    Offline,
    Tombstone,
}

impl StoreState {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: StoreState) -> bool {
        matches!(
            (self, next),
            (StoreState::Up, StoreState::Up)
                | (StoreState::Up, StoreState::Offline)
                | (StoreState::Offline, StoreState::Offline)
                | (StoreState::Offline, StoreState::Tombstone)
                | (StoreState::Tombstone, StoreState::Tombstone)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub capacity: u64,
    pub available: u64,
    pub region_count: u64,
    pub leader_count: u64,
    pub sending_snap_count: u32,
    pub receiving_snap_count: u32,
    pub start_ts: i64,
    pub bytes_written_rate: f64,
    pub bytes_read_rate: f64,
    pub keys_written_rate: f64,
    pub keys_read_rate: f64,
}

impl StoreStats {
    /// Fraction of capacity in use, used by the balance-region scheduler's
    /// region-score function.
    pub fn used_ratio(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        let used = self.capacity.saturating_sub(self.available);
        used as f64 / self.capacity as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub address: String,
    pub state: StoreState,
    pub labels: BTreeMap<String, String>,
    pub last_heartbeat_ts: i64,
    pub stats: StoreStats,
    pub version: String,
    pub deploy_path: String,
    pub block_count: u32,
}

impl Store {
    pub fn new(id: StoreId, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
            state: StoreState::Up,
            labels: BTreeMap::new(),
            last_heartbeat_ts: 0,
            stats: StoreStats::default(),
            version: String::new(),
            deploy_path: String::new(),
            block_count: 0,
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Apply a state transition, enforcing the legal-chain invariant.
    pub fn transition_to(&mut self, next: StoreState) -> Result<()> {
        if self.state == StoreState::Tombstone && next != StoreState::Tombstone {
            return Err(Error::InvalidStoreTransition {
                store: self.id,
                from: self.state,
                to: next,
            });
        }
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidStoreTransition {
                store: self.id,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn is_tombstone(&self) -> bool {
        self.state == StoreState::Tombstone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transition_chain() {
        let mut s = Store::new(StoreId(1), "a:1");
        assert!(s.transition_to(StoreState::Offline).is_ok());
        assert!(s.transition_to(StoreState::Tombstone).is_ok());
    }

    #[test]
    fn tombstone_is_terminal() {
        let mut s = Store::new(StoreId(1), "a:1");
        s.transition_to(StoreState::Offline).unwrap();
        s.transition_to(StoreState::Tombstone).unwrap();
        assert!(s.transition_to(StoreState::Up).is_err());
    }

    #[test]
    fn cannot_skip_offline() {
        // Up -> Tombstone directly is not in the legal chain.
        let mut s = Store::new(StoreId(1), "a:1");
        assert!(s.transition_to(StoreState::Tombstone).is_err());
    }

    #[test]
    fn used_ratio() {
        let mut stats = StoreStats::default();
        stats.capacity = 100;
        stats.available = 40;
        assert!((stats.used_ratio() - 0.6).abs() < 1e-9);
    }
}
