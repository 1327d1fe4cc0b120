//! Coalescing write-behind persistence for region state.
//!
//! Region heartbeats update the in-memory cache synchronously, but
//! persisting every single heartbeat to the meta-store would make the
//! heartbeat path as slow as the slowest quorum write. Instead, updates are
//! coalesced into a pending map keyed by region id (later writes to the same
//! region simply overwrite earlier ones) and an owned task drains it
//! periodically, the way the teacher's WAL writer batches appends between
//! fsyncs instead of syncing on every write.
//!
//! Persistence is idempotent (writing the same region twice is harmless) so
//! replaying a region that was flushed just before a crash is safe, and a
//! lost buffer on crash just means the next heartbeat repopulates it.

use dashmap::DashMap;
use pd_core::region::Region;
use pd_core::ids::RegionId;
use pd_metastore::LeadershipHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn region_key(id: RegionId) -> Vec<u8> {
    format!("/pd/regions/{}", id.get()).into_bytes()
}

/// Bounded only by the number of distinct regions touched between flushes;
/// a single hot region heartbeating many times between flushes still
/// occupies one entry. The capacity-1 `wake` channel is the "bounded
/// channel" the owned drain task blocks on between flushes: it carries no
/// payload, just a doorbell, so a burst of heartbeats for many regions
/// still wakes the drain loop once rather than once per heartbeat.
pub struct WriteBehindBuffer {
    pending: DashMap<RegionId, Region>,
    wake: mpsc::Sender<()>,
    wake_rx: parking_lot::Mutex<Option<mpsc::Receiver<()>>>,
}

impl WriteBehindBuffer {
    pub fn new() -> Self {
        let (wake, wake_rx) = mpsc::channel(1);
        Self { pending: DashMap::new(), wake, wake_rx: parking_lot::Mutex::new(Some(wake_rx)) }
    }

    /// Coalesces with any not-yet-flushed update for the same region, then
    /// rings the doorbell so the drain task flushes promptly instead of
    /// waiting out the rest of its periodic interval. The doorbell itself
    /// coalesces via `try_send`: if one is already pending, this is a no-op.
    pub fn enqueue(&self, region: Region) {
        self.pending.insert(region.id, region);
        let _ = self.wake.try_send(());
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drains everything pending as of this call and attempts to persist
    /// each region through `handle`. A region that fails to persist (lost
    /// leadership, meta-store unavailable) is dropped rather than retried
    /// here: the next heartbeat for that region will re-enqueue it.
    pub fn flush_once(&self, handle: &LeadershipHandle) {
        let ids: Vec<RegionId> = self.pending.iter().map(|e| *e.key()).collect();
        for id in ids {
            let Some((_, region)) = self.pending.remove(&id) else { continue };
            let bytes = match rmp_serde::to_vec(&region) {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(region_id = ?id, error = %e, "failed to encode region for write-behind flush");
                    continue;
                }
            };
            if let Err(e) = handle.cas_write(&region_key(id), &bytes[..]) {
                tracing::debug!(region_id = ?id, error = %e, "write-behind flush stopped early, leadership likely lost");
                return;
            }
        }
    }

    /// Spawns the owned draining task, tied to the leadership handle's
    /// cancellation token the way the coordinator's patrol/scheduler/push
    /// loops are: the task exits on its own once leadership expires, with
    /// no explicit shutdown signal required from the caller.
    pub fn spawn(
        self: Arc<Self>,
        handle: Arc<LeadershipHandle>,
        flush_interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let token: CancellationToken = handle.child_token();
        let mut wake_rx = self.wake_rx.lock().take().expect("write-behind buffer spawned twice");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(flush_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.flush_once(&handle),
                    _ = wake_rx.recv() => self.flush_once(&handle),
                    () = token.cancelled() => {
                        self.flush_once(&handle);
                        return;
                    }
                }
            }
        })
    }
}

impl Default for WriteBehindBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pd_core::ids::PeerId;
    use pd_core::region::Peer;

    #[test]
    fn enqueue_coalesces_updates_to_the_same_region() {
        let buf = WriteBehindBuffer::new();
        let r1 = Region::new(RegionId(1), vec![], vec![10], vec![Peer::voter(PeerId(1), pd_core::ids::StoreId(1))]);
        let mut r2 = r1.clone();
        r2.epoch.bump_version();
        buf.enqueue(r1);
        buf.enqueue(r2.clone());
        assert_eq!(buf.pending_len(), 1);
        assert_eq!(buf.pending.get(&RegionId(1)).unwrap().epoch, r2.epoch);
    }
}
