//! Namespace/label checker: regions declared into a namespace must live
//! only on stores carrying the namespace's required label.

use crate::view::ClusterView;
use pd_core::config::NamespaceConfig;
use pd_core::{Operator, OperatorKind, Region, Step};

/// `owning_namespace` identifies which declared namespace (if any) this
/// region belongs to, by convention the first path segment of its start
/// key matching the namespace name.
pub fn check(region: &Region, owning_namespace: Option<&NamespaceConfig>, view: &ClusterView, now: i64) -> Option<Operator> {
    let ns = owning_namespace?;
    let (label_key, label_value) = &ns.required_label;
    for peer in &region.peers {
        let Some(store) = view.cache.get_store(peer.store_id) else {
            continue;
        };
        if store.label(label_key) != Some(label_value.as_str()) {
            return Some(Operator::new(
                region.id,
                region.epoch,
                OperatorKind::Region,
                vec![Step::RemovePeer { store: peer.store_id }],
                now,
                pd_core::operator::default_timeout_ms(OperatorKind::Region),
            ));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pd_core::config::{ReplicationConfig, ScheduleConfig};
    use pd_core::{Peer, PeerId, PlacementRuleSet, RegionId, Store, StoreId};
    use pd_cluster::ClusterCache;

    #[test]
    fn peer_on_wrong_label_store_is_removed() {
        let cache = ClusterCache::default();
        let mut store = Store::new(StoreId(1), "1:1");
        store.labels.insert("zone".into(), "b".into());
        cache.put_store(store);

        let region = Region::new(RegionId(1), vec![], vec![], vec![Peer::voter(PeerId(1), StoreId(1))]);
        let ns = NamespaceConfig {
            name: "tenant-a".into(),
            required_label: ("zone".into(), "a".into()),
        };
        let schedule = ScheduleConfig::default();
        let repl = ReplicationConfig::default();
        let placement = PlacementRuleSet::flat(1);
        let view = ClusterView::new(&cache, &schedule, &repl, &placement, &[]);
        let op = check(&region, Some(&ns), &view, 0).unwrap();
        assert!(matches!(op.steps.front(), Some(Step::RemovePeer { store: StoreId(1) })));
    }

    #[test]
    fn region_without_namespace_is_untouched() {
        let cache = ClusterCache::default();
        let region = Region::new(RegionId(1), vec![], vec![], vec![]);
        let schedule = ScheduleConfig::default();
        let repl = ReplicationConfig::default();
        let placement = PlacementRuleSet::flat(1);
        let view = ClusterView::new(&cache, &schedule, &repl, &placement, &[]);
        assert!(check(&region, None, &view, 0).is_none());
    }
}
