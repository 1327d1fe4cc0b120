use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] pd_core::Error),

    #[error(transparent)]
    MetaStore(#[from] pd_metastore::Error),

    #[error("store {0:?} is unknown, must be registered with PutStore first")]
    UnknownStore(pd_core::StoreId),

    #[error("store {0:?} is tombstoned and rejects heartbeats")]
    StoreTombstoned(pd_core::StoreId),

    #[error("region {0:?} heartbeat is stale relative to the cached epoch")]
    StaleRegion(pd_core::RegionId),
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::MetaStore(e) => e.is_retryable(),
            _ => false,
        }
    }
}
