//! The RPC-facing error taxonomy: a tagged union distinct from the
//! internal `thiserror` enums, since it has to serialize onto the wire
//! unchanged regardless of which internal component produced it.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ServiceError {
    NotBootstrapped,
    AlreadyBootstrapped,
    NotLeader,
    StoreTombstoned,
    RegionNotFound,
    Internal(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] pd_core::Error),
    #[error(transparent)]
    MetaStore(#[from] pd_metastore::Error),
    #[error(transparent)]
    Cluster(#[from] pd_cluster::Error),
    #[error(transparent)]
    Scheduling(#[from] pd_scheduling::Error),
    #[error(transparent)]
    Tso(#[from] pd_tso::Error),
    #[error("cluster is not bootstrapped")]
    NotBootstrapped,
    #[error("cluster is already bootstrapped")]
    AlreadyBootstrapped,
}

impl Error {
    /// Collapses the internal error taxonomy down to the wire-level tagged
    /// union every RPC response header carries.
    pub fn to_service_error(&self) -> ServiceError {
        match self {
            Error::NotBootstrapped => ServiceError::NotBootstrapped,
            Error::AlreadyBootstrapped => ServiceError::AlreadyBootstrapped,
            Error::MetaStore(pd_metastore::Error::NotLeader) => ServiceError::NotLeader,
            Error::Tso(pd_tso::Error::NotLeader) => ServiceError::NotLeader,
            Error::Cluster(pd_cluster::Error::StoreTombstoned(_)) => ServiceError::StoreTombstoned,
            Error::Core(pd_core::Error::RegionNotFound(_)) => ServiceError::RegionNotFound,
            other => ServiceError::Internal(other.to_string()),
        }
    }
}
