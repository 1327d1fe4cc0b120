//! Region/Peer data model.

use crate::ids::{PeerId, RegionId, StoreId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub id: PeerId,
    pub store_id: StoreId,
    pub is_learner: bool,
}

impl Peer {
    pub fn voter(id: PeerId, store_id: StoreId) -> Self {
        Self {
            id,
            store_id,
            is_learner: false,
        }
    }

    pub fn learner(id: PeerId, store_id: StoreId) -> Self {
        Self {
            id,
            store_id,
            is_learner: true,
        }
    }
}

/// `(conf_ver, version)`. `conf_ver` advances on membership change,
/// `version` on split/merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionEpoch {
    pub conf_ver: u64,
    pub version: u64,
}

impl RegionEpoch {
    pub fn new(conf_ver: u64, version: u64) -> Self {
        Self { conf_ver, version }
    }

    /// `self` is strictly older than `other` on at least one axis and not
    /// newer on the other. Not a total order (two epochs can be
    /// incomparable only if this returns false both ways, which never
    /// happens in practice since conf_ver/version never decrease).
    pub fn is_stale_relative_to(&self, other: &RegionEpoch) -> bool {
        (self.conf_ver < other.conf_ver && self.version <= other.version)
            || (self.conf_ver <= other.conf_ver && self.version < other.version)
    }

    pub fn bump_conf_ver(self) -> Self {
        Self {
            conf_ver: self.conf_ver + 1,
            version: self.version,
        }
    }

    pub fn bump_version(self) -> Self {
        Self {
            conf_ver: self.conf_ver,
            version: self.version + 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionStats {
    pub approximate_size: u64,
    pub approximate_keys: u64,
    pub bytes_written_rate: f64,
    pub bytes_read_rate: f64,
    pub keys_written_rate: f64,
    pub keys_read_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub start_key: Vec<u8>,
    /// Exclusive end key; empty means +infinity.
    pub end_key: Vec<u8>,
    pub epoch: RegionEpoch,
    pub peers: Vec<Peer>,
    pub leader: Option<Peer>,
    /// `(peer, down_seconds)`.
    pub down_peers: Vec<(Peer, u64)>,
    pub pending_peers: Vec<Peer>,
    pub stats: RegionStats,
}

impl Region {
    pub fn new(id: RegionId, start_key: Vec<u8>, end_key: Vec<u8>, peers: Vec<Peer>) -> Self {
        Self {
            id,
            start_key,
            end_key,
            epoch: RegionEpoch::default(),
            peers,
            leader: None,
            down_peers: Vec::new(),
            pending_peers: Vec::new(),
            stats: RegionStats::default(),
        }
    }

    /// Empty `end_key` means +infinity.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        key >= self.start_key.as_slice()
            && (self.end_key.is_empty() || key < self.end_key.as_slice())
    }

    /// Whether `[start, end)` ranges overlap, treating an empty end as
    /// +infinity on either side.
    pub fn overlaps(&self, other: &Region) -> bool {
        let starts_before_other_ends =
            other.end_key.is_empty() || self.start_key < other.end_key;
        let other_starts_before_self_ends =
            self.end_key.is_empty() || other.start_key < self.end_key;
        starts_before_other_ends && other_starts_before_self_ends
    }

    pub fn peer_on_store(&self, store_id: StoreId) -> Option<&Peer> {
        self.peers.iter().find(|p| p.store_id == store_id)
    }

    pub fn voter_count(&self) -> usize {
        self.peers.iter().filter(|p| !p.is_learner).count()
    }

    pub fn has_duplicate_store(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.peers.iter().any(|p| !seen.insert(p.store_id))
    }

    pub fn size_and_keys(&self) -> (u64, u64) {
        (self.stats.approximate_size, self.stats.approximate_keys)
    }
}
