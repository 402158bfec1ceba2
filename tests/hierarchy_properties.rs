//! Property-based tests for hierarchy construction
//!
//! Random parent assignments (self-loops, cycles, competing parents and
//! dangling targets included) must always produce a well-formed forest:
//! - Acyclic: no unit is its own ancestor
//! - Depth: roots are 0, children are one deeper than their parent
//! - Size: descendant count matches the subtree
//! - Membership: every active unit appears exactly once
//! - Determinism: input order does not change the result

use std::collections::HashSet;

use chrono::NaiveDate;
use orgtree::domain::{
    BuildOptions, HierarchyBuilder, HierarchyGraph, HierarchyIndex, OrgUnit, Relationship,
    UnitId, Validity,
};
use proptest::prelude::*;

fn id(n: usize) -> UnitId {
    UnitId::new(n.to_string()).unwrap()
}

fn evaluation_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// (unit count, edges as (child, parent, start year offset))
fn scenario() -> impl Strategy<Value = (usize, Vec<(usize, usize, u8)>)> {
    (1usize..40).prop_flat_map(|n| {
        // Parents range one past the units so some edges dangle
        let edge = (0..n, 0..n + 1, 0u8..4);
        (Just(n), prop::collection::vec(edge, 0..n * 2))
    })
}

fn build(n: usize, edges: &[(usize, usize, u8)]) -> HierarchyGraph {
    let units: Vec<_> = (0..n)
        .map(|i| OrgUnit::new(id(i), format!("Unit {}", i)))
        .collect();
    let relationships: Vec<_> = edges
        .iter()
        .enumerate()
        .map(|(row, (child, parent, offset))| {
            let start = NaiveDate::from_ymd_opt(2020 + i32::from(*offset), 1, 1).unwrap();
            Relationship::new(id(*child), id(*parent), "A002")
                .with_validity(Validity::from(start))
                .at_row(row + 1)
        })
        .collect();
    HierarchyBuilder::new(BuildOptions::new(evaluation_date())).build(&units, &relationships)
}

/// Parent ID of every unit, in arena order
fn shape(graph: &HierarchyGraph) -> Vec<(String, Option<String>, Vec<String>)> {
    graph
        .nodes()
        .iter()
        .map(|node| {
            (
                node.id().to_string(),
                node.parent.map(|p| graph.node(p).id().to_string()),
                node.children
                    .iter()
                    .map(|c| graph.node(*c).id().to_string())
                    .collect(),
            )
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_no_unit_is_its_own_ancestor((n, edges) in scenario()) {
        let graph = build(n, &edges);

        for node_id in graph.node_ids() {
            let mut seen = HashSet::new();
            for ancestor in graph.ancestors(node_id) {
                prop_assert_ne!(ancestor, node_id);
                prop_assert!(seen.insert(ancestor), "ancestor chain revisits a node");
                prop_assert!(seen.len() <= n);
            }
        }
    }

    #[test]
    fn prop_depth_follows_parent((n, edges) in scenario()) {
        let graph = build(n, &edges);

        for node in graph.nodes() {
            match node.parent {
                None => prop_assert_eq!(node.depth, 0),
                Some(parent) => prop_assert_eq!(node.depth, graph.node(parent).depth + 1),
            }
        }
        for root in graph.roots() {
            prop_assert!(graph.node(*root).is_root());
        }
    }

    #[test]
    fn prop_descendant_count_matches_subtree((n, edges) in scenario()) {
        let index = HierarchyIndex::new(build(n, &edges));

        for i in 0..n {
            let subtree = index.subtree(&id(i), None).unwrap();
            prop_assert_eq!(index.descendant_count(&id(i)).unwrap(), subtree.len() - 1);
            prop_assert_eq!(index.depth(&id(i)).unwrap() + 1, index.ancestor_path(&id(i)).unwrap().len());
        }
    }

    #[test]
    fn prop_every_unit_appears_once((n, edges) in scenario()) {
        let graph = build(n, &edges);
        let order = graph.preorder();

        prop_assert_eq!(order.len(), n);
        let unique: HashSet<_> = order.iter().collect();
        prop_assert_eq!(unique.len(), n);
    }

    #[test]
    fn prop_build_is_deterministic((n, edges) in scenario()) {
        let first = build(n, &edges);
        let again = build(n, &edges);
        prop_assert_eq!(&first, &again);

        let mut reversed = edges.clone();
        reversed.reverse();
        let reordered = build(n, &reversed);
        prop_assert_eq!(shape(&first), shape(&reordered));
    }
}
