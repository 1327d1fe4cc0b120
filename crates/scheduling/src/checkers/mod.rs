//! Checkers: pure `(&Region, &ClusterView) -> Option<Operator>` functions
//! run in priority order during a patrol pass. They never mutate cluster
//! state; they only produce candidate operators for the controller.

pub mod merge;
pub mod namespace;
pub mod replica;
pub mod split;

use crate::view::ClusterView;
use pd_core::config::NamespaceConfig;
use pd_core::{Operator, Region};

/// Runs checkers in priority order (replica > merge > split > namespace),
/// returning the first candidate operator. `merge_neighbor` is the
/// adjacent region to try merging with, if the patrol has one in hand;
/// `namespace` is the declared namespace this region belongs to, if any.
pub fn run(
    region: &Region,
    merge_neighbor: Option<&Region>,
    namespace: Option<&NamespaceConfig>,
    view: &ClusterView,
    now: i64,
) -> Option<Operator> {
    replica::check(region, view, now)
        .or_else(|| merge_neighbor.and_then(|n| merge::check(region, n, view, now)))
        .or_else(|| split::check(region, view, now))
        .or_else(|| namespace::check(region, namespace, view, now))
}
