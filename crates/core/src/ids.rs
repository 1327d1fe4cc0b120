//! Identifier newtypes.
//!
//! Stores, regions and peers are all plain `u64`s on the wire, but keeping
//! them as distinct types at the API boundary stops a store id and a region
//! id from being swapped at a call site by accident.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl $name {
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(StoreId);
id_newtype!(RegionId);
id_newtype!(PeerId);

/// A cluster-wide unique id, minted by the id allocator (component B).
pub type AllocatedId = u64;
