//! GC safe point tracking.
//!
//! Keyed under `gc/safe_point` and `gc/safe_point/service/<id>`. The
//! bookkeeping is pure and leadership-gated like everything else in this
//! crate; it does not drive GC execution itself.

use crate::leadership::LeadershipHandle;
use pd_core::error::{Error, Result};
use std::collections::BTreeMap;

const CLUSTER_SAFE_POINT_KEY: &[u8] = b"gc/safe_point";
const SERVICE_PREFIX: &[u8] = b"gc/safe_point/service/";

pub struct SafePointTracker;

impl SafePointTracker {
    /// Advance a named service's safe point. Rejects attempts to move it
    /// backwards — safe points are advance-only.
    pub fn update_service_safe_point(
        handle: &LeadershipHandle,
        service_id: &str,
        safe_point: u64,
    ) -> Result<()> {
        let key = [SERVICE_PREFIX, service_id.as_bytes()].concat();
        let current = handle
            .store()
            .get(&key)
            .map_err(meta_err)?
            .map(|kv| decode(&kv.value))
            .unwrap_or(0);
        if safe_point < current {
            return Err(Error::InvalidInput(format!(
                "service {service_id} safe point may not regress: {current} -> {safe_point}"
            )));
        }
        handle
            .cas_write(&key, &encode(safe_point))
            .map_err(meta_err)?;
        Ok(())
    }

    /// The cluster safe point is the minimum over all services' safe
    /// points — GC may not reclaim anything any registered service still
    /// needs.
    pub fn recompute_cluster_safe_point(handle: &LeadershipHandle) -> Result<u64> {
        let pairs = handle.store().get_prefix(SERVICE_PREFIX).map_err(meta_err)?;
        let mut by_service: BTreeMap<Vec<u8>, u64> = BTreeMap::new();
        for kv in pairs {
            by_service.insert(kv.key, decode(&kv.value));
        }
        let min = by_service.values().copied().min().unwrap_or(0);
        handle
            .cas_write(CLUSTER_SAFE_POINT_KEY, &encode(min))
            .map_err(meta_err)?;
        Ok(min)
    }

    pub fn cluster_safe_point(handle: &LeadershipHandle) -> Result<u64> {
        Ok(handle
            .store()
            .get(CLUSTER_SAFE_POINT_KEY)
            .map_err(meta_err)?
            .map(|kv| decode(&kv.value))
            .unwrap_or(0))
    }
}

fn encode(v: u64) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

fn decode(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let len = bytes.len().min(8);
    buf[8 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
    u64::from_be_bytes(buf)
}

fn meta_err(e: crate::error::Error) -> Error {
    Error::Internal(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryMetaStore;
    use crate::leadership::LeadershipHandle;

    fn handle() -> LeadershipHandle {
        let store = InMemoryMetaStore::new();
        let rev = store.cas_put(b"leader", None, b"node-a").unwrap();
        LeadershipHandle::new(store, b"leader".to_vec(), rev)
    }

    #[test]
    fn cluster_safe_point_is_min_of_services() {
        let h = handle();
        SafePointTracker::update_service_safe_point(&h, "gc_worker", 100).unwrap();
        SafePointTracker::update_service_safe_point(&h, "backup", 50).unwrap();
        let min = SafePointTracker::recompute_cluster_safe_point(&h).unwrap();
        assert_eq!(min, 50);
    }

    #[test]
    fn safe_point_cannot_regress() {
        let h = handle();
        SafePointTracker::update_service_safe_point(&h, "gc_worker", 100).unwrap();
        assert!(SafePointTracker::update_service_safe_point(&h, "gc_worker", 50).is_err());
    }
}
