//! Leader election / member registry.

use crate::client::{MetaStore, WatchEvent};
use crate::error::{Error, Result};
use crate::leadership::LeadershipHandle;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub member_id: u64,
    pub address: String,
    pub deploy_path: String,
    pub binary_version: String,
    pub git_hash: String,
    pub leader_priority: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LeaderChange {
    Elected(MemberInfo),
    Vacant,
}

/// Campaigns for control-plane leadership on top of the meta store.
pub struct Election {
    store: Arc<dyn MetaStore>,
    leader_key: Vec<u8>,
}

impl Election {
    pub fn new(store: Arc<dyn MetaStore>, leader_key: impl Into<Vec<u8>>) -> Self {
        Self {
            store,
            leader_key: leader_key.into(),
        }
    }

    /// Put the leader key with a lease; fails if the key already exists
    /// with a live lease (modeled here as simply "already exists" — lease
    /// expiry is the external consensus KV's concern). The `create_revision`
    /// of a successful put becomes the term.
    pub fn campaign(&self, member: &MemberInfo) -> Result<LeadershipHandle> {
        let value = rmp_serde::to_vec(member).map_err(|e| Error::MetaStoreTxn(e.to_string()))?;
        match self.store.cas_put(&self.leader_key, None, &value) {
            Ok(term_rev) => {
                info!(member_id = member.member_id, term_rev, "campaign succeeded");
                Ok(LeadershipHandle::new(
                    self.store.clone(),
                    self.leader_key.clone(),
                    term_rev,
                ))
            }
            Err(_) => Err(Error::AlreadyExists(self.leader_key.clone())),
        }
    }

    /// Delete the leader key and expire `handle`; callers must treat any
    /// outstanding operations as aborted.
    pub fn resign(&self, handle: &LeadershipHandle) -> Result<()> {
        if handle.is_expired() {
            return Ok(());
        }
        self.store.delete(&self.leader_key)?;
        handle.expire();
        Ok(())
    }

    /// Resumable watcher over the leader key; `cursor` starts at 0 and is
    /// updated in place on every call.
    pub fn poll_leader_change(&self, cursor: &mut i64) -> Result<Vec<LeaderChange>> {
        let events = self.store.poll_watch(&self.leader_key, cursor)?;
        let mut changes = Vec::new();
        for event in events {
            match event {
                WatchEvent::Put(kv) => {
                    let member: MemberInfo = rmp_serde::from_slice(&kv.value)
                        .map_err(|e| Error::MetaStoreTxn(e.to_string()))?;
                    changes.push(LeaderChange::Elected(member));
                }
                WatchEvent::Delete { .. } => changes.push(LeaderChange::Vacant),
            }
        }
        Ok(changes)
    }

    pub fn current_leader(&self) -> Result<Option<MemberInfo>> {
        match self.store.get(&self.leader_key)? {
            Some(kv) => {
                let member = rmp_serde::from_slice(&kv.value)
                    .map_err(|e| Error::MetaStoreTxn(e.to_string()))?;
                Ok(Some(member))
            }
            None => Ok(None),
        }
    }
}

/// Background lease refresh. On refresh failure the handle is marked
/// expired, which propagates shutdown to every leader-only component via
/// its cancellation token.
pub struct KeepAlive {
    handle_thread: Option<thread::JoinHandle<()>>,
    stopped: Arc<AtomicBool>,
}

impl KeepAlive {
    /// Spawn the refresh loop. `refresh` is the lease-renewal RPC against
    /// the external meta store; here it's provided by the caller so tests
    /// can inject failures deterministically.
    pub fn spawn(
        handle: Arc<LeadershipHandle>,
        interval: Duration,
        mut refresh: impl FnMut() -> bool + Send + 'static,
    ) -> Self {
        let stopped = Arc::new(AtomicBool::new(false));
        let stopped_clone = stopped.clone();
        let cancel = handle.child_token();
        let join = thread::spawn(move || {
            while !cancel.is_cancelled() && !stopped_clone.load(Ordering::Acquire) {
                thread::sleep(interval);
                if cancel.is_cancelled() {
                    break;
                }
                if !refresh() {
                    warn!("lease refresh failed, demoting leadership handle");
                    handle.expire();
                    break;
                }
            }
        });
        Self {
            handle_thread: Some(join),
            stopped,
        }
    }

    pub fn stop(mut self) {
        self.stopped.store(true, Ordering::Release);
        if let Some(t) = self.handle_thread.take() {
            let _ = t.join();
        }
    }
}

#[allow(dead_code)]
fn _assert_send_sync<T: Send + Sync>() {}
#[allow(dead_code)]
fn _assertions() {
    _assert_send_sync::<CancellationToken>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryMetaStore;

    fn member(id: u64) -> MemberInfo {
        MemberInfo {
            member_id: id,
            address: format!("node-{id}:2379"),
            deploy_path: "/data".into(),
            binary_version: "0.1.0".into(),
            git_hash: "deadbeef".into(),
            leader_priority: 0,
        }
    }

    #[test]
    fn only_one_campaign_succeeds() {
        let store = InMemoryMetaStore::new();
        let election = Election::new(store, b"leader".to_vec());
        let h1 = election.campaign(&member(1)).unwrap();
        assert!(election.campaign(&member(2)).is_err());
        assert!(!h1.is_expired());
    }

    #[test]
    fn resign_then_recampaign() {
        let store = InMemoryMetaStore::new();
        let election = Election::new(store, b"leader".to_vec());
        let h1 = election.campaign(&member(1)).unwrap();
        election.resign(&h1).unwrap();
        assert!(h1.is_expired());
        let h2 = election.campaign(&member(2)).unwrap();
        assert!(!h2.is_expired());
        assert_ne!(h1.term(), h2.term());
    }

    #[test]
    fn watch_reports_election_and_vacancy() {
        let store = InMemoryMetaStore::new();
        let election = Election::new(store, b"leader".to_vec());
        let mut cursor = 0;
        let h1 = election.campaign(&member(1)).unwrap();
        let changes = election.poll_leader_change(&mut cursor).unwrap();
        assert_eq!(changes, vec![LeaderChange::Elected(member(1))]);

        election.resign(&h1).unwrap();
        let changes = election.poll_leader_change(&mut cursor).unwrap();
        assert_eq!(changes, vec![LeaderChange::Vacant]);
    }
}
