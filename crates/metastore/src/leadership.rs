//! `LeadershipHandle`: every state-changing write in the system goes
//! through one of these.

use crate::client::MetaStore;
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A handle representing one leadership term. Every write made through it
/// is conditional on `create_revision(leader_key) == term_rev`; once the
/// predicate fails once, the handle is permanently expired and a fresh
/// `Campaign` is required.
pub struct LeadershipHandle {
    store: Arc<dyn MetaStore>,
    leader_key: Vec<u8>,
    term_rev: i64,
    expired: AtomicBool,
    /// Root of the cancellation tree: every owned thread/task downstream
    /// of leadership derives a child token from this one, so losing
    /// leadership cancels everything transitively.
    cancel_token: CancellationToken,
}

impl LeadershipHandle {
    pub(crate) fn new(store: Arc<dyn MetaStore>, leader_key: Vec<u8>, term_rev: i64) -> Self {
        Self {
            store,
            leader_key,
            term_rev,
            expired: AtomicBool::new(false),
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn term(&self) -> i64 {
        self.term_rev
    }

    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::Acquire) || self.cancel_token.is_cancelled()
    }

    /// Demote this handle. Idempotent. Cancels every descendant task.
    pub fn expire(&self) {
        self.expired.store(true, Ordering::Release);
        self.cancel_token.cancel();
    }

    /// A child token that is cancelled whenever this handle expires.
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    /// Conditional put, rejecting immediately if the handle is already
    /// known to be expired and demoting it on a failed CAS. The write is
    /// guarded by `leader_key` still having `create_revision == term_rev`,
    /// not by `key`'s own history, so unrelated keys can be written any
    /// number of times within a single term.
    pub fn cas_write(&self, key: &[u8], value: &[u8]) -> Result<i64> {
        if self.is_expired() {
            return Err(Error::NotLeader);
        }
        match self
            .store
            .cas_put_guarded(key, value, &self.leader_key, self.term_rev)
        {
            Ok(rev) => Ok(rev),
            Err(Error::NotLeader) => {
                self.expire();
                Err(Error::NotLeader)
            }
            Err(e) => Err(e),
        }
    }

    pub fn leader_key(&self) -> &[u8] {
        &self.leader_key
    }

    pub fn store(&self) -> &Arc<dyn MetaStore> {
        &self.store
    }
}
