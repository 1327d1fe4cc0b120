//! Meta-store client, leadership, election and the components that build
//! directly on a leadership-gated write:
//!
//! - [`client`]: the `MetaStore` trait and its in-memory test double.
//! - [`leadership`]: `LeadershipHandle`, the single write seam for every
//!   other component.
//! - [`election`]: `Election` (campaign/resign/watch) and `KeepAlive`.
//! - [`alloc`]: the block-based `IdAllocator`.
//! - [`safepoint`]: GC safe point bookkeeping.

pub mod alloc;
pub mod client;
pub mod election;
pub mod error;
pub mod leadership;
pub mod safepoint;

pub use alloc::IdAllocator;
pub use client::{InMemoryMetaStore, KvPair, MetaStore, WatchEvent};
pub use election::{Election, KeepAlive, LeaderChange, MemberInfo};
pub use error::{Error, Result};
pub use leadership::LeadershipHandle;
pub use safepoint::SafePointTracker;
