//! Summary figures for a built hierarchy

use chrono::Datelike;
use serde::Serialize;
use std::collections::BTreeMap;

use super::graph::HierarchyGraph;

/// Key in [`HierarchyStats::type_breakdown`] for units without an object type
pub const UNTYPED: &str = "(none)";

/// Shape of the forest plus anomaly totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyStats {
    pub units: usize,
    pub inactive_units: usize,
    pub roots: usize,
    pub leaves: usize,
    /// Deepest depth reached (roots are 0)
    pub max_depth: usize,
    /// Node count per depth
    pub levels: BTreeMap<usize, usize>,
    pub avg_children: f64,
    /// Units per SAP object type
    pub type_breakdown: BTreeMap<String, usize>,
    /// Units per validity start year; open starts are not counted
    pub start_years: BTreeMap<i32, usize>,
    /// Relationship records loaded, before any filtering
    pub relationships: usize,
    pub cycles: usize,
    pub conflicts: usize,
    pub dangling: usize,
    pub duplicate_edges: usize,
}

impl HierarchyStats {
    pub fn compute(graph: &HierarchyGraph) -> Self {
        let mut levels = BTreeMap::new();
        let mut leaves = 0;
        let mut parents = 0;
        let mut children = 0;
        let mut type_breakdown = BTreeMap::new();
        let mut start_years = BTreeMap::new();

        for node in graph.nodes() {
            *levels.entry(node.depth).or_insert(0) += 1;
            let kind = node.unit.object_type.as_deref().unwrap_or(UNTYPED);
            *type_breakdown.entry(kind.to_string()).or_insert(0) += 1;
            if let Some(start) = node.unit.validity.start {
                *start_years.entry(start.year()).or_insert(0) += 1;
            }
            if node.is_leaf() {
                leaves += 1;
            } else {
                parents += 1;
                children += node.children.len();
            }
        }

        let avg_children = if parents == 0 {
            0.0
        } else {
            children as f64 / parents as f64
        };

        let anomalies = graph.anomalies();
        Self {
            units: graph.len(),
            inactive_units: graph.inactive().len(),
            roots: graph.roots().len(),
            leaves,
            max_depth: levels.keys().next_back().copied().unwrap_or(0),
            levels,
            avg_children,
            type_breakdown,
            start_years,
            relationships: graph.summary().relationships_loaded,
            cycles: anomalies.cycles.len(),
            conflicts: anomalies.conflicts.len(),
            dangling: anomalies.dangling.len(),
            duplicate_edges: anomalies.duplicate_edges,
        }
    }
}

/// Labels depths with configured level names (depth 0 is the first name)
pub fn level_label(names: &[String], depth: usize) -> String {
    names
        .get(depth)
        .cloned()
        .unwrap_or_else(|| format!("Level{}", depth + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{BuildOptions, HierarchyBuilder};
    use crate::domain::id::UnitId;
    use crate::domain::relationship::Relationship;
    use crate::domain::unit::{OrgUnit, Validity};
    use chrono::NaiveDate;

    fn id(s: &str) -> UnitId {
        UnitId::new(s).unwrap()
    }

    #[test]
    fn stats_for_small_forest() {
        let since = |y| Validity::new(NaiveDate::from_ymd_opt(y, 1, 1), None);
        let units = vec![
            OrgUnit::new(id("A"), "A").with_object_type("O").with_validity(since(2019)),
            OrgUnit::new(id("B"), "B").with_object_type("O").with_validity(since(2020)),
            OrgUnit::new(id("C"), "C").with_object_type("O").with_validity(since(2020)),
            OrgUnit::new(id("D"), "D").with_object_type("S"),
            OrgUnit::new(id("X"), "X"),
        ];
        let rels = vec![
            Relationship::new(id("B"), id("A"), "A002"),
            Relationship::new(id("C"), id("A"), "A002"),
            Relationship::new(id("D"), id("B"), "A002"),
            Relationship::new(id("D"), id("missing"), "A002"),
        ];
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let graph = HierarchyBuilder::new(BuildOptions::new(date)).build(&units, &rels);

        let stats = HierarchyStats::compute(&graph);

        assert_eq!(stats.units, 5);
        assert_eq!(stats.roots, 2);
        assert_eq!(stats.leaves, 3);
        assert_eq!(stats.max_depth, 2);
        assert_eq!(stats.levels.get(&0), Some(&2));
        assert_eq!(stats.levels.get(&1), Some(&2));
        assert_eq!(stats.levels.get(&2), Some(&1));
        assert!((stats.avg_children - 1.5).abs() < f64::EPSILON);
        assert_eq!(stats.dangling, 1);
        assert_eq!(stats.relationships, 4);

        let types: Vec<_> = stats
            .type_breakdown
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        assert_eq!(types, vec![(UNTYPED, 1), ("O", 3), ("S", 1)]);

        let years: Vec<_> = stats.start_years.into_iter().collect();
        assert_eq!(years, vec![(2019, 1), (2020, 2)]);
    }

    #[test]
    fn level_labels() {
        let names = vec!["Level1_LegalEntity".to_string()];
        assert_eq!(level_label(&names, 0), "Level1_LegalEntity");
        assert_eq!(level_label(&names, 3), "Level4");
    }
}
