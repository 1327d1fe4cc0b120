//! Hot-spot peer statistics.

use crate::ids::{RegionId, StoreId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Floors below which a store is never considered hot, regardless of how
/// the dynamic per-store threshold computes.
pub const MIN_HOT_READ_BYTES_RATE: f64 = 128.0 * 1024.0;
pub const MIN_HOT_WRITE_BYTES_RATE: f64 = 16.0 * 1024.0;

/// Budget used to derive a store's dynamic hot threshold: threshold =
/// store's total bytes rate / this budget, floored as above.
pub const HOT_REGION_COUNT_BUDGET: f64 = 3.0;

/// Anti-count a peer starts at when first promoted to hot; decremented on
/// every cold heartbeat and removed at zero.
pub const DEFAULT_ANTI_COUNT: u32 = 3;

/// Bounded rolling window length for rate smoothing.
pub const ROLLING_WINDOW_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HotSpotKind {
    ReadByLeader,
    WriteByPeer,
    WriteByLeader,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotPeerStat {
    pub region_id: RegionId,
    pub store_id: StoreId,
    pub kind: HotSpotKind,
    pub bytes_rate: f64,
    pub keys_rate: f64,
    pub hot_degree: i32,
    pub anti_count: u32,
    pub last_update: i64,
    #[serde(skip)]
    pub rolling_window: VecDeque<f64>,
}

impl HotPeerStat {
    pub fn new(region_id: RegionId, store_id: StoreId, kind: HotSpotKind) -> Self {
        Self {
            region_id,
            store_id,
            kind,
            bytes_rate: 0.0,
            keys_rate: 0.0,
            hot_degree: 0,
            anti_count: DEFAULT_ANTI_COUNT,
            last_update: 0,
            rolling_window: VecDeque::with_capacity(ROLLING_WINDOW_LEN),
        }
    }

    /// Fold a new observed rate sample into the rolling window, updating
    /// the smoothed `bytes_rate`.
    pub fn observe(&mut self, bytes_rate: f64, keys_rate: f64, now: i64) {
        if self.rolling_window.len() == ROLLING_WINDOW_LEN {
            self.rolling_window.pop_front();
        }
        self.rolling_window.push_back(bytes_rate);
        self.bytes_rate = self.rolling_window.iter().sum::<f64>() / self.rolling_window.len() as f64;
        self.keys_rate = keys_rate;
        self.last_update = now;
    }

    /// Promoted to hot when bytes_rate crosses the dynamic threshold
    /// (floored); demoted by decrementing anti_count on cold heartbeats,
    /// removed when it hits zero.
    pub fn is_hot(&self, threshold: f64) -> bool {
        self.bytes_rate >= threshold
    }

    pub fn mark_cold(&mut self) -> bool {
        self.anti_count = self.anti_count.saturating_sub(1);
        self.anti_count == 0
    }

    pub fn mark_hot(&mut self) {
        self.anti_count = DEFAULT_ANTI_COUNT;
        self.hot_degree += 1;
    }
}

/// The dynamic per-store threshold: total store bytes rate divided by a
/// fixed hot-region count budget, floored.
pub fn dynamic_threshold(store_total_bytes_rate: f64, kind: HotSpotKind) -> f64 {
    let floor = match kind {
        HotSpotKind::ReadByLeader => MIN_HOT_READ_BYTES_RATE,
        HotSpotKind::WriteByPeer | HotSpotKind::WriteByLeader => MIN_HOT_WRITE_BYTES_RATE,
    };
    (store_total_bytes_rate / HOT_REGION_COUNT_BUDGET).max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floors_apply_even_with_low_store_rate() {
        let t = dynamic_threshold(0.0, HotSpotKind::ReadByLeader);
        assert_eq!(t, MIN_HOT_READ_BYTES_RATE);
    }

    #[test]
    fn anti_count_reaches_zero() {
        let mut stat = HotPeerStat::new(RegionId(1), StoreId(1), HotSpotKind::WriteByPeer);
        assert!(!stat.mark_cold());
        assert!(!stat.mark_cold());
        assert!(stat.mark_cold());
    }

    #[test]
    fn rolling_window_bounded() {
        let mut stat = HotPeerStat::new(RegionId(1), StoreId(1), HotSpotKind::ReadByLeader);
        for i in 0..10 {
            stat.observe(i as f64, 0.0, i);
        }
        assert_eq!(stat.rolling_window.len(), ROLLING_WINDOW_LEN);
    }
}
