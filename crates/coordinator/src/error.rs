use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

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
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Core(e) => e.is_retryable(),
            Error::MetaStore(e) => e.is_retryable(),
            Error::Cluster(e) => e.is_retryable(),
            Error::Scheduling(e) => e.is_retryable(),
        }
    }
}
