//! Placement rules: label-constrained replica counts, modeled as a
//! first-class type rather than left as an opaque JSON blob.

use crate::region::Region;
use crate::store::Store;
use serde::{Deserialize, Serialize};

/// A single constraint: regions matched by this rule must place exactly
/// `count` replicas on stores carrying all of `label_constraints`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRule {
    pub name: String,
    pub label_constraints: Vec<(String, String)>,
    pub count: usize,
    pub is_learner: bool,
}

impl PlacementRule {
    pub fn matches_store(&self, store: &Store) -> bool {
        self.label_constraints
            .iter()
            .all(|(k, v)| store.label(k) == Some(v.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementRuleSet {
    pub max_replicas: usize,
    pub rules: Vec<PlacementRule>,
}

impl PlacementRuleSet {
    pub fn flat(max_replicas: usize) -> Self {
        Self {
            max_replicas,
            rules: Vec::new(),
        }
    }

    /// Counts, for a region, how many of its voter peers satisfy each rule.
    /// Returns `(rule_name, required, actual)` for any rule that is under
    /// or over satisfied.
    pub fn violations(&self, region: &Region, stores: &[Store]) -> Vec<(String, usize, usize)> {
        let mut out = Vec::new();
        for rule in &self.rules {
            let actual = region
                .peers
                .iter()
                .filter(|p| p.is_learner == rule.is_learner)
                .filter(|p| {
                    stores
                        .iter()
                        .find(|s| s.id == p.store_id)
                        .map(|s| rule.matches_store(s))
                        .unwrap_or(false)
                })
                .count();
            if actual != rule.count {
                out.push((rule.name.clone(), rule.count, actual));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{PeerId, RegionId, StoreId};
    use crate::region::{Peer, Region};

    #[test]
    fn flat_rule_set_has_no_violations() {
        let rules = PlacementRuleSet::flat(3);
        let region = Region::new(RegionId(1), vec![], vec![], vec![]);
        assert!(rules.violations(&region, &[]).is_empty());
    }

    #[test]
    fn label_rule_counts_matching_stores() {
        let mut rules = PlacementRuleSet::flat(3);
        rules.rules.push(PlacementRule {
            name: "zone-a".into(),
            label_constraints: vec![("zone".into(), "a".into())],
            count: 1,
            is_learner: false,
        });
        let mut store_a = Store::new(StoreId(1), "a:1");
        store_a.labels.insert("zone".into(), "a".into());
        let store_b = Store::new(StoreId(2), "b:1");

        let region = Region::new(
            RegionId(1),
            vec![],
            vec![],
            vec![Peer::voter(PeerId(1), StoreId(1)), Peer::voter(PeerId(2), StoreId(2))],
        );
        assert!(rules.violations(&region, &[store_a, store_b]).is_empty());
    }
}
