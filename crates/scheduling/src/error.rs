use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] pd_core::Error),

    #[error(transparent)]
    Cluster(#[from] pd_cluster::Error),

    #[error("operator for region {0:?} rejected: an equal-or-higher priority operator is already running")]
    RejectedByPriority(pd_core::RegionId),

    #[error("operator for region {0:?} stalled: store {1:?} is at capacity")]
    StalledAtCapacity(pd_core::RegionId, pd_core::StoreId),

    #[error("no region {0:?} found for operator submission")]
    UnknownRegion(pd_core::RegionId),
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Cluster(e) => e.is_retryable(),
            Error::StalledAtCapacity(..) => true,
            _ => false,
        }
    }
}
