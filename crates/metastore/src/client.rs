//! A thin wrapper over a linearizable key-value store.
//!
//! `MetaStore` is the seam between this control plane and the external
//! consensus KV that backs it. Everything downstream only ever talks to
//! this trait. `InMemoryMetaStore` is the test double used throughout
//! this workspace's test suites.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub create_revision: i64,
    pub mod_revision: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Put(KvPair),
    Delete { key: Vec<u8>, mod_revision: i64 },
}

/// A linearizable get/put/txn/watch key-value store.
pub trait MetaStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<KvPair>>;

    fn get_prefix(&self, prefix: &[u8]) -> Result<Vec<KvPair>>;

    /// Unconditional put. Returns the new `mod_revision`.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<i64>;

    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Conditional write: succeeds only if `key`'s current `create_revision`
    /// equals `expected_create_revision` (`None` means "key must not exist
    /// yet"). Returns the new `create_revision` on success.
    fn cas_put(
        &self,
        key: &[u8],
        expected_create_revision: Option<i64>,
        value: &[u8],
    ) -> Result<i64>;

    /// Put `key` unconditionally, but only if `guard_key`'s current
    /// `create_revision` still equals `expected_guard_create_revision`.
    /// This is the single primitive every leader-only write in the system
    /// is built on: `guard_key` is the leader key, and the expected
    /// revision is the term the caller campaigned at, so any write made
    /// after a lost election is rejected regardless of the target key's
    /// own history. Returns the target key's new `mod_revision`.
    fn cas_put_guarded(
        &self,
        key: &[u8],
        value: &[u8],
        guard_key: &[u8],
        expected_guard_create_revision: i64,
    ) -> Result<i64>;

    /// Poll for events with `mod_revision > *cursor`, advancing `*cursor`
    /// to the latest revision observed. A resumable alternative to a raw
    /// streaming watch, so tests can drive it deterministically.
    fn poll_watch(&self, prefix: &[u8], cursor: &mut i64) -> Result<Vec<WatchEvent>>;

    fn current_revision(&self) -> i64;
}

#[derive(Default)]
struct Inner {
    map: BTreeMap<Vec<u8>, KvPair>,
    revision: i64,
    /// `(mod_revision, event)`, append-only. Watchers scan forward from
    /// their cursor; a real implementation would compact this, which is
    /// why `poll_watch` reports `WatchCompacted` once entries age out.
    log: Vec<(i64, WatchEvent)>,
}

/// In-memory `MetaStore`, used by tests and by the in-process test harness.
/// Not a substitute for the real external consensus KV in production.
pub struct InMemoryMetaStore {
    inner: Mutex<Inner>,
    /// Bound on `log` length before old entries are dropped, forcing
    /// watchers who fall too far behind to see `WatchCompacted`.
    log_capacity: usize,
}

impl InMemoryMetaStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner::default()),
            log_capacity: 4096,
        })
    }

    fn record(&self, inner: &mut Inner, event: WatchEvent) {
        inner.log.push((inner.revision, event));
        if inner.log.len() > self.log_capacity {
            let drop_count = inner.log.len() - self.log_capacity;
            inner.log.drain(0..drop_count);
        }
    }
}

impl Default for InMemoryMetaStore {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            log_capacity: 4096,
        }
    }
}

impl MetaStore for InMemoryMetaStore {
    fn get(&self, key: &[u8]) -> Result<Option<KvPair>> {
        Ok(self.inner.lock().map.get(key).cloned())
    }

    fn get_prefix(&self, prefix: &[u8]) -> Result<Vec<KvPair>> {
        let inner = self.inner.lock();
        Ok(inner
            .map
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(_, v)| v.clone())
            .collect())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<i64> {
        let mut inner = self.inner.lock();
        inner.revision += 1;
        let revision = inner.revision;
        let create_revision = inner
            .map
            .get(key)
            .map(|kv| kv.create_revision)
            .unwrap_or(revision);
        let pair = KvPair {
            key: key.to_vec(),
            value: value.to_vec(),
            create_revision,
            mod_revision: revision,
        };
        inner.map.insert(key.to_vec(), pair.clone());
        self.record(&mut inner, WatchEvent::Put(pair));
        Ok(revision)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.map.remove(key).is_some() {
            inner.revision += 1;
            let revision = inner.revision;
            self.record(
                &mut inner,
                WatchEvent::Delete {
                    key: key.to_vec(),
                    mod_revision: revision,
                },
            );
        }
        Ok(())
    }

    fn cas_put(
        &self,
        key: &[u8],
        expected_create_revision: Option<i64>,
        value: &[u8],
    ) -> Result<i64> {
        let mut inner = self.inner.lock();
        let existing_create_revision = inner.map.get(key).map(|kv| kv.create_revision);
        if existing_create_revision != expected_create_revision {
            return Err(Error::NotLeader);
        }
        inner.revision += 1;
        let revision = inner.revision;
        let create_revision = expected_create_revision.unwrap_or(revision);
        let pair = KvPair {
            key: key.to_vec(),
            value: value.to_vec(),
            create_revision,
            mod_revision: revision,
        };
        inner.map.insert(key.to_vec(), pair.clone());
        self.record(&mut inner, WatchEvent::Put(pair));
        Ok(create_revision)
    }

    fn cas_put_guarded(
        &self,
        key: &[u8],
        value: &[u8],
        guard_key: &[u8],
        expected_guard_create_revision: i64,
    ) -> Result<i64> {
        let mut inner = self.inner.lock();
        let guard_create_revision = inner.map.get(guard_key).map(|kv| kv.create_revision);
        if guard_create_revision != Some(expected_guard_create_revision) {
            return Err(Error::NotLeader);
        }
        inner.revision += 1;
        let revision = inner.revision;
        let create_revision = inner
            .map
            .get(key)
            .map(|kv| kv.create_revision)
            .unwrap_or(revision);
        let pair = KvPair {
            key: key.to_vec(),
            value: value.to_vec(),
            create_revision,
            mod_revision: revision,
        };
        inner.map.insert(key.to_vec(), pair.clone());
        self.record(&mut inner, WatchEvent::Put(pair));
        Ok(revision)
    }

    fn poll_watch(&self, prefix: &[u8], cursor: &mut i64) -> Result<Vec<WatchEvent>> {
        let inner = self.inner.lock();
        if let Some((oldest_revision, _)) = inner.log.first() {
            if *cursor < *oldest_revision - 1 && *cursor != 0 {
                return Err(Error::WatchCompacted(*cursor));
            }
        }
        let events: Vec<WatchEvent> = inner
            .log
            .iter()
            .filter(|(rev, _)| *rev > *cursor)
            .filter(|(_, ev)| match ev {
                WatchEvent::Put(kv) => kv.key.starts_with(prefix),
                WatchEvent::Delete { key, .. } => key.starts_with(prefix),
            })
            .map(|(_, ev)| ev.clone())
            .collect();
        *cursor = inner.revision;
        Ok(events)
    }

    fn current_revision(&self) -> i64 {
        self.inner.lock().revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cas_put_requires_matching_create_revision() {
        let store = InMemoryMetaStore::new();
        // Key doesn't exist yet: None is required.
        let rev = store.cas_put(b"leader", None, b"node-a").unwrap();
        // A second CAS claiming it doesn't exist must fail.
        assert!(store.cas_put(b"leader", None, b"node-b").is_err());
        // The correct create_revision succeeds.
        assert!(store.cas_put(b"leader", Some(rev), b"node-a-2").is_ok());
    }

    #[test]
    fn guarded_cas_ignores_target_key_history() {
        let store = InMemoryMetaStore::new();
        let term_rev = store.cas_put(b"leader", None, b"node-a").unwrap();

        // First write under this term: target key doesn't exist yet. A
        // naive cas_put(key, Some(term_rev), ..) would wrongly reject this.
        assert!(store
            .cas_put_guarded(b"alloc_id", b"1", b"leader", term_rev)
            .is_ok());
        // A second write to the same target key under the same term must
        // also succeed — the guard is the leader key, not the target.
        assert!(store
            .cas_put_guarded(b"alloc_id", b"2", b"leader", term_rev)
            .is_ok());

        // Once the leader key moves (new term), the guard must fail.
        store.delete(b"leader").unwrap();
        store.cas_put(b"leader", None, b"node-b").unwrap();
        assert!(store
            .cas_put_guarded(b"alloc_id", b"3", b"leader", term_rev)
            .is_err());
    }

    #[test]
    fn prefix_scan_and_watch_resume() {
        let store = InMemoryMetaStore::new();
        store.put(b"raft/s/1", b"store-1").unwrap();
        store.put(b"raft/s/2", b"store-2").unwrap();
        store.put(b"raft/r/1", b"region-1").unwrap();

        let stores = store.get_prefix(b"raft/s/").unwrap();
        assert_eq!(stores.len(), 2);

        let mut cursor = 0;
        let events = store.poll_watch(b"raft/s/", &mut cursor).unwrap();
        assert_eq!(events.len(), 2);

        store.put(b"raft/s/3", b"store-3").unwrap();
        let events = store.poll_watch(b"raft/s/", &mut cursor).unwrap();
        assert_eq!(events.len(), 1);
    }
}
