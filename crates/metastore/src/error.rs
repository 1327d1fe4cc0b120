//! Error taxonomy for the meta-store client / leadership / election / id
//! allocator.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] pd_core::Error),

    /// The compare-and-swap predicate `create_revision(leader_key) ==
    /// term_rev` failed: the caller is no longer leader.
    #[error("not leader")]
    NotLeader,

    #[error("meta-store io error: {0}")]
    MetaStoreIo(String),

    #[error("meta-store transaction failed: {0}")]
    MetaStoreTxn(String),

    #[error("lease error: {0}")]
    Lease(String),

    #[error("key already exists: {0:?}")]
    AlreadyExists(Vec<u8>),

    #[error("key not found: {0:?}")]
    NotFound(Vec<u8>),

    #[error("watch cursor was compacted past revision {0}")]
    WatchCompacted(i64),
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::MetaStoreIo(_) | Error::MetaStoreTxn(_))
    }
}
