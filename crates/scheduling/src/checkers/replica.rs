//! Replica checker: voter count, duplicate stores, offline-peer
//! replacement, and placement-rule satisfaction.

use crate::view::ClusterView;
use pd_core::{Operator, OperatorKind, Region, Step, StoreState};

pub fn check(region: &Region, view: &ClusterView, now: i64) -> Option<Operator> {
    if let Some(op) = check_duplicate_store(region, now) {
        return Some(op);
    }
    if let Some(op) = check_offline_peer(region, view, now) {
        return Some(op);
    }
    let max_replicas = view.replication.max_replicas;
    let voters = region.voter_count();
    if voters < max_replicas {
        if let Some(target) = pick_add_target(region, view) {
            return Some(region_op(region, now, vec![Step::AddPeer { store: target, is_learner: false }]));
        }
    } else if voters > max_replicas {
        if let Some(victim) = pick_remove_target(region, view) {
            return Some(region_op(region, now, vec![Step::RemovePeer { store: victim }]));
        }
    }
    check_placement(region, view, now)
}

fn region_op(region: &Region, now: i64, steps: Vec<Step>) -> Operator {
    Operator::new(
        region.id,
        region.epoch,
        OperatorKind::Region,
        steps,
        now,
        pd_core::operator::default_timeout_ms(OperatorKind::Region),
    )
}

fn check_duplicate_store(region: &Region, now: i64) -> Option<Operator> {
    let mut seen = std::collections::HashSet::new();
    for peer in &region.peers {
        if !seen.insert(peer.store_id) {
            return Some(region_op(region, now, vec![Step::RemovePeer { store: peer.store_id }]));
        }
    }
    None
}

fn check_offline_peer(region: &Region, view: &ClusterView, now: i64) -> Option<Operator> {
    for peer in &region.peers {
        let Some(store) = view.cache.get_store(peer.store_id) else {
            continue;
        };
        if store.state == StoreState::Offline {
            if let Some(target) = pick_add_target(region, view) {
                return Some(region_op(
                    region,
                    now,
                    vec![
                        Step::AddPeer { store: target, is_learner: true },
                        Step::PromoteLearner { store: target },
                        Step::RemovePeer { store: peer.store_id },
                    ],
                ));
            }
        }
    }
    None
}

fn check_placement(region: &Region, view: &ClusterView, now: i64) -> Option<Operator> {
    let stores = view.cache.all_stores();
    let violations = view.placement.violations(region, &stores);
    let (name, required, actual) = violations.first()?;
    let _ = name;
    if actual < required {
        pick_add_target(region, view).map(|target| {
            region_op(region, now, vec![Step::AddPeer { store: target, is_learner: false }])
        })
    } else {
        pick_remove_target(region, view).map(|victim| region_op(region, now, vec![Step::RemovePeer { store: victim }]))
    }
}

/// Lowest region-score store (per `ScheduleConfig`'s capacity-ratio
/// exclusion) not already hosting a peer of this region.
fn pick_add_target(region: &Region, view: &ClusterView) -> Option<pd_core::StoreId> {
    view.cache
        .all_stores()
        .into_iter()
        .filter(|s| s.state == StoreState::Up && region.peer_on_store(s.id).is_none())
        .filter_map(|s| view.region_score(&s).map(|score| (s.id, score)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

/// Highest region-score store currently hosting a voter peer.
fn pick_remove_target(region: &Region, view: &ClusterView) -> Option<pd_core::StoreId> {
    region
        .peers
        .iter()
        .filter(|p| !p.is_learner)
        .filter_map(|p| view.cache.get_store(p.store_id))
        .filter_map(|s| view.region_score(&s).map(|score| (s.id, score)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}
