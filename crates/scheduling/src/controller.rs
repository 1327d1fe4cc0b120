//! Operator controller: the in-flight `region_id -> Operator` map, per-store
//! concurrency caps, and a bounded history ring of finished operators.

use crate::error::{Error, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use pd_cluster::ClusterCache;
use pd_core::config::ScheduleConfig;
use pd_core::{Operator, OperatorState, Peer, RegionId, Step, StoreId};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Default)]
struct StoreCounters {
    pending_peer: AtomicU32,
    pending_leader: AtomicU32,
    pending_snap: AtomicU32,
}

/// What an operator's steps cost each participating store, used both to
/// check caps before admission and to release them on completion.
fn step_costs(steps: &VecDeque<Step>) -> Vec<(StoreId, CostKind)> {
    let mut out = Vec::new();
    for step in steps {
        match step {
            Step::TransferLeader { from, to } => {
                out.push((*from, CostKind::Leader));
                out.push((*to, CostKind::Leader));
            }
            Step::AddPeer { store, .. } => {
                out.push((*store, CostKind::Peer));
                out.push((*store, CostKind::Snap));
            }
            Step::RemovePeer { store } | Step::PromoteLearner { store } => {
                out.push((*store, CostKind::Peer));
            }
            Step::MergeRegion { .. } => {}
            Step::SplitRegion { .. } => {}
        }
    }
    out
}

#[derive(Debug, Clone, Copy)]
enum CostKind {
    Peer,
    Leader,
    Snap,
}

pub struct OperatorController {
    in_flight: DashMap<RegionId, Operator>,
    store_counters: DashMap<StoreId, StoreCounters>,
    history: Mutex<VecDeque<Operator>>,
    history_cap: usize,
}

impl OperatorController {
    pub fn new(history_cap: usize) -> Self {
        Self {
            in_flight: DashMap::new(),
            store_counters: DashMap::new(),
            history: Mutex::new(VecDeque::with_capacity(history_cap)),
            history_cap,
        }
    }

    /// Submit a candidate operator. Rejects if a non-terminal operator of
    /// equal or higher priority already owns the region; replaces a lower-
    /// priority one; enforces per-store concurrency caps.
    pub fn add_waiting_operator(&self, op: Operator, schedule: &ScheduleConfig) -> Result<()> {
        if let Some(existing) = self.in_flight.get(&op.region_id) {
            if !existing.is_terminal() && existing.kind >= op.kind {
                return Err(Error::RejectedByPriority(op.region_id));
            }
        }
        if let Some(store) = self.find_saturated_store(&op, schedule) {
            return Err(Error::StalledAtCapacity(op.region_id, store));
        }

        if let Some((_, mut replaced)) = self.in_flight.remove(&op.region_id) {
            replaced.mark_terminal(OperatorState::ReplacedBy);
            self.release(&replaced);
            self.push_history(replaced);
        }
        self.reserve(&op);
        self.in_flight.insert(op.region_id, op);
        Ok(())
    }

    fn find_saturated_store(&self, op: &Operator, schedule: &ScheduleConfig) -> Option<StoreId> {
        for (store, kind) in step_costs(&op.steps) {
            let counters = self.store_counters.entry(store).or_default();
            let at_cap = match kind {
                CostKind::Peer => counters.pending_peer.load(Ordering::Relaxed) >= schedule.max_pending_peer,
                CostKind::Leader => false,
                CostKind::Snap => counters.pending_snap.load(Ordering::Relaxed) >= schedule.max_snap_receiving,
            };
            if at_cap {
                return Some(store);
            }
        }
        None
    }

    fn reserve(&self, op: &Operator) {
        for (store, kind) in step_costs(&op.steps) {
            let counters = self.store_counters.entry(store).or_default();
            match kind {
                CostKind::Peer => counters.pending_peer.fetch_add(1, Ordering::Relaxed),
                CostKind::Leader => counters.pending_leader.fetch_add(1, Ordering::Relaxed),
                CostKind::Snap => counters.pending_snap.fetch_add(1, Ordering::Relaxed),
            };
        }
    }

    fn release(&self, op: &Operator) {
        for (store, kind) in step_costs(&op.steps) {
            if let Some(counters) = self.store_counters.get(&store) {
                match kind {
                    CostKind::Peer => {
                        counters.pending_peer.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                            Some(v.saturating_sub(1))
                        }).ok();
                    }
                    CostKind::Leader => {
                        counters.pending_leader.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                            Some(v.saturating_sub(1))
                        }).ok();
                    }
                    CostKind::Snap => {
                        counters.pending_snap.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                            Some(v.saturating_sub(1))
                        }).ok();
                    }
                }
            }
        }
    }

    fn push_history(&self, op: Operator) {
        let mut history = self.history.lock();
        if history.len() == self.history_cap {
            history.pop_front();
        }
        history.push_back(op);
    }

    /// Drive every in-flight operator forward one tick: advance a step if
    /// the cache shows it already took effect, mark `Cancelled` if the
    /// region's epoch diverged incompatibly, mark `Timeout` past deadline.
    pub fn push_operators(&self, cache: &ClusterCache, now: i64) {
        let region_ids: Vec<RegionId> = self.in_flight.iter().map(|e| *e.key()).collect();
        for region_id in region_ids {
            let Some(mut entry) = self.in_flight.get_mut(&region_id) else {
                continue;
            };
            let Some(region) = cache.get_region(region_id) else {
                continue;
            };

            if entry.has_timed_out(now) {
                entry.mark_terminal(OperatorState::Timeout);
            } else if region.epoch.conf_ver != entry.epoch_snapshot.conf_ver
                && entry.steps.iter().any(|s| matches!(s, Step::SplitRegion { .. } | Step::MergeRegion { .. }))
            {
                // conf_ver only moves on membership changes, never on a split/merge's
                // own version bump, so this is always an incompatible divergence.
                entry.mark_terminal(OperatorState::Cancelled);
            } else if let Some(step) = entry.current_step().cloned() {
                if step_reflected(&step, &region) {
                    entry.advance();
                }
            }

            if entry.is_terminal() {
                drop(entry);
                if let Some((_, op)) = self.in_flight.remove(&region_id) {
                    self.release(&op);
                    self.push_history(op);
                }
            }
        }
    }

    /// The step to hand back on the region's next heartbeat, if any.
    pub fn next_step_for_heartbeat(&self, region_id: RegionId) -> Option<Step> {
        self.in_flight.get(&region_id).and_then(|op| op.current_step().cloned())
    }

    pub fn get_operator(&self, region_id: RegionId) -> Option<Operator> {
        self.in_flight.get(&region_id).map(|e| e.clone())
    }

    pub fn history(&self) -> Vec<Operator> {
        self.history.lock().iter().cloned().collect()
    }

    /// Drop every in-flight operator without marking it terminal — called
    /// on leadership demotion; the new leader's fresh operators will
    /// naturally time out any steps the storage nodes already started.
    pub fn drop_all_on_demotion(&self) {
        self.in_flight.clear();
        self.store_counters.clear();
    }
}

fn step_reflected(step: &Step, region: &pd_core::Region) -> bool {
    match step {
        Step::AddPeer { store, .. } => region.peer_on_store(*store).is_some(),
        Step::PromoteLearner { store } => region
            .peer_on_store(*store)
            .map(|p| !p.is_learner)
            .unwrap_or(false),
        Step::RemovePeer { store } => region.peer_on_store(*store).is_none(),
        Step::TransferLeader { to, .. } => region.leader.map(|l: Peer| l.store_id) == Some(*to),
        Step::MergeRegion { .. } | Step::SplitRegion { .. } => {
            region.epoch.version > 0
        }
    }
}
