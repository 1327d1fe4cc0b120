//! Schedulers: named, intervalled, backoff-aware producers of operators.
//! The registered set lives in an explicit [`SchedulerRegistry`], not a
//! process-global list.

pub mod balance_leader;
pub mod balance_region;
pub mod hot_region;
pub mod maintenance;
pub mod scatter_range;

use crate::view::ClusterView;
use pd_core::Operator;
use rustc_hash::FxHashMap;
use std::time::Duration;

pub trait Scheduler: Send + Sync {
    fn name(&self) -> &str;
    fn min_interval(&self) -> Duration;
    fn allow(&self, view: &ClusterView) -> bool;
    fn schedule(&self, view: &ClusterView, now: i64) -> Vec<Operator>;

    /// Exponential backoff, capped at 5 minutes, applied after consecutive
    /// empty ticks so an idle scheduler stops polling every interval.
    fn next_interval(&self, consecutive_empty: u32) -> Duration {
        let factor = 1u32 << consecutive_empty.min(5);
        (self.min_interval() * factor).min(Duration::from_secs(300))
    }
}

struct Entry {
    scheduler: Box<dyn Scheduler>,
    paused_until_ts: Option<i64>,
    consecutive_empty: u32,
    last_run_ts: i64,
}

/// The registered set of schedulers, ticked once per coordinator cadence.
/// An explicit struct (not a process-global list) so multiple coordinators
/// in a test process never share state.
#[derive(Default)]
pub struct SchedulerRegistry {
    entries: FxHashMap<String, Entry>,
}

impl SchedulerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, scheduler: Box<dyn Scheduler>) {
        let name = scheduler.name().to_string();
        self.entries.insert(
            name,
            Entry {
                scheduler,
                paused_until_ts: None,
                consecutive_empty: 0,
                last_run_ts: 0,
            },
        );
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Pause a scheduler until `now + delay_ms`.
    pub fn pause(&mut self, name: &str, now: i64, delay_ms: i64) -> bool {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.paused_until_ts = Some(now + delay_ms);
            true
        } else {
            false
        }
    }

    pub fn resume(&mut self, name: &str) -> bool {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.paused_until_ts = None;
            true
        } else {
            false
        }
    }

    /// Runs every scheduler whose interval has elapsed and which isn't
    /// paused, collecting all produced operators.
    pub fn tick(&mut self, view: &ClusterView, now: i64) -> Vec<Operator> {
        let mut out = Vec::new();
        for entry in self.entries.values_mut() {
            if let Some(until) = entry.paused_until_ts {
                if now < until {
                    continue;
                }
                entry.paused_until_ts = None;
            }
            let interval_ms = entry.scheduler.next_interval(entry.consecutive_empty).as_millis() as i64;
            if now.saturating_sub(entry.last_run_ts) < interval_ms {
                continue;
            }
            if !entry.scheduler.allow(view) {
                continue;
            }
            entry.last_run_ts = now;
            let ops = entry.scheduler.schedule(view, now);
            if ops.is_empty() {
                entry.consecutive_empty = entry.consecutive_empty.saturating_add(1);
            } else {
                entry.consecutive_empty = 0;
            }
            out.extend(ops);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ClusterView;
    use pd_cluster::ClusterCache;
    use pd_core::config::{NamespaceConfig, ReplicationConfig, ScheduleConfig};
    use pd_core::PlacementRuleSet;

    struct AlwaysEmpty;
    impl Scheduler for AlwaysEmpty {
        fn name(&self) -> &str {
            "always-empty"
        }
        fn min_interval(&self) -> Duration {
            Duration::from_millis(100)
        }
        fn allow(&self, _view: &ClusterView) -> bool {
            true
        }
        fn schedule(&self, _view: &ClusterView, _now: i64) -> Vec<Operator> {
            Vec::new()
        }
    }

    #[test]
    fn pause_skips_ticks_until_delay_elapses() {
        let mut registry = SchedulerRegistry::new();
        registry.register(Box::new(AlwaysEmpty));
        registry.pause("always-empty", 0, 1000);

        let cache = ClusterCache::default();
        let schedule = ScheduleConfig::default();
        let repl = ReplicationConfig::default();
        let placement = PlacementRuleSet::flat(1);
        let view = ClusterView::new(&cache, &schedule, &repl, &placement, &[]);

        registry.tick(&view, 500);
        assert_eq!(registry.entries.get("always-empty").unwrap().last_run_ts, 0);
        registry.tick(&view, 1500);
        assert_eq!(registry.entries.get("always-empty").unwrap().last_run_ts, 1500);
    }

    #[test]
    fn backoff_grows_after_empty_ticks() {
        let mut registry = SchedulerRegistry::new();
        registry.register(Box::new(AlwaysEmpty));
        let cache = ClusterCache::default();
        let schedule = ScheduleConfig::default();
        let repl = ReplicationConfig::default();
        let placement = PlacementRuleSet::flat(1);
        let view = ClusterView::new(&cache, &schedule, &repl, &placement, &[]);

        registry.tick(&view, 0);
        assert_eq!(registry.entries.get("always-empty").unwrap().consecutive_empty, 1);
        registry.tick(&view, 100);
        assert_eq!(registry.entries.get("always-empty").unwrap().consecutive_empty, 1);
        registry.tick(&view, 200);
        assert_eq!(registry.entries.get("always-empty").unwrap().consecutive_empty, 2);
    }
}
