//! Shared error taxonomy.
//!
//! `pd-core::Error` carries the leaf variants that have meaning independent
//! of any single component — the stale/placement/data-model errors. Every
//! downstream crate wraps this type in its own `Error` via `#[from]` and
//! adds component-specific variants (`NotLeader` in `pd-metastore`,
//! `Timeout`/`Cancelled` in `pd-scheduling`).

use crate::ids::{PeerId, RegionId, StoreId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("store {0} is tombstoned")]
    StoreTombstoned(StoreId),

    #[error("store {0} not found")]
    StoreNotFound(StoreId),

    #[error("store {existing} already registered with address {address}")]
    DuplicateStoreAddress { existing: StoreId, address: String },

    #[error("invalid store state transition for store {store}: {from:?} -> {to:?}")]
    InvalidStoreTransition {
        store: StoreId,
        from: crate::store::StoreState,
        to: crate::store::StoreState,
    },

    #[error("region {0} not found")]
    RegionNotFound(RegionId),

    #[error("region {region} heartbeat is stale: incoming epoch {incoming:?}, cached {cached:?}")]
    RegionStale {
        region: RegionId,
        incoming: crate::region::RegionEpoch,
        cached: crate::region::RegionEpoch,
    },

    #[error("region {0} already has a peer on store {1}")]
    DuplicatePeerStore(RegionId, StoreId),

    #[error("peer {0} not found in region {1}")]
    PeerNotFound(PeerId, RegionId),

    #[error("placement rule violated: {0}")]
    PlacementViolation(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the caller should retry with refreshed metadata rather than
    /// treat this as fatal. Stale epochs and not-found lookups both fall
    /// into this bucket; placement violations and invalid input do not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RegionStale { .. } | Error::RegionNotFound(_) | Error::StoreNotFound(_)
        )
    }
}
