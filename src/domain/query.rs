//! Query engine
//!
//! Stateless use-case queries on top of a [`HierarchyIndex`]. Holds nothing
//! but a borrow, so any number of engines can run against one shared index.

use serde::Serialize;

use super::graph::{HierarchyNode, NodeId};
use super::id::UnitId;
use super::index::{HierarchyIndex, QueryError};

/// The route between two units through their lowest common ancestor
#[derive(Debug, Clone, Serialize)]
pub struct UnitConnection<'a> {
    /// Lowest common ancestor, `None` when the units sit in different trees
    pub lca: Option<&'a UnitId>,
    /// From the first unit up to the LCA (both inclusive); the full root path
    /// when there is no LCA
    pub from_a: Vec<&'a UnitId>,
    /// From the LCA down to the second unit (both inclusive); the full root
    /// path when there is no LCA
    pub to_b: Vec<&'a UnitId>,
}

impl<'a> UnitConnection<'a> {
    /// Every unit to highlight, in path order without repeats
    pub fn highlighted(&self) -> Vec<&'a UnitId> {
        let mut units = self.from_a.clone();
        let skip = usize::from(self.lca.is_some());
        units.extend(self.to_b.iter().skip(skip).copied());
        units
    }

    pub fn is_connected(&self) -> bool {
        self.lca.is_some()
    }
}

/// Presentation-level queries over one index
#[derive(Clone, Copy)]
pub struct QueryEngine<'a> {
    index: &'a HierarchyIndex,
}

impl<'a> QueryEngine<'a> {
    pub fn new(index: &'a HierarchyIndex) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &'a HierarchyIndex {
        self.index
    }

    /// Every node at depth <= `max_level`, in forest pre-order
    pub fn visible_to_level(&self, max_level: usize) -> Vec<&'a HierarchyNode> {
        let graph = self.index.graph();
        graph
            .roots()
            .iter()
            .flat_map(|root| self.index.subtree_ids(*root, Some(max_level)))
            .map(|n| graph.node(n))
            .collect()
    }

    pub fn subtree(
        &self,
        id: &UnitId,
        max_depth: Option<usize>,
    ) -> Result<Vec<&'a HierarchyNode>, QueryError> {
        self.index.subtree(id, max_depth)
    }

    pub fn path_to_root(&self, id: &UnitId) -> Result<Vec<&'a HierarchyNode>, QueryError> {
        self.index.ancestor_path(id)
    }

    pub fn siblings(&self, id: &UnitId) -> Result<Vec<&'a HierarchyNode>, QueryError> {
        self.index.siblings(id)
    }

    pub fn search(&self, text: &str, limit: usize) -> Vec<&'a HierarchyNode> {
        self.index.search(text, limit)
    }

    /// Whole-word name matches, capped at `limit`
    pub fn search_words(&self, word: &str, limit: usize) -> Vec<&'a HierarchyNode> {
        let mut nodes = self.index.by_token(word);
        nodes.truncate(limit);
        nodes
    }

    /// Path between two units, merged at their lowest common ancestor
    pub fn connect(&self, a: &UnitId, b: &UnitId) -> Result<UnitConnection<'a>, QueryError> {
        let path_a = self.index.ancestor_path(a)?;
        let path_b = self.index.ancestor_path(b)?;

        let common = path_a
            .iter()
            .zip(path_b.iter())
            .take_while(|(x, y)| x.id() == y.id())
            .count();

        if common == 0 {
            return Ok(UnitConnection {
                lca: None,
                from_a: path_a.iter().rev().map(|n| n.id()).collect(),
                to_b: path_b.iter().map(|n| n.id()).collect(),
            });
        }

        let lca = common - 1;
        Ok(UnitConnection {
            lca: Some(path_a[lca].id()),
            from_a: path_a[lca..].iter().rev().map(|n| n.id()).collect(),
            to_b: path_b[lca..].iter().map(|n| n.id()).collect(),
        })
    }

    /// Subtree of `id` keeping only nodes that match or lead to a match
    pub fn filtered_subtree<F>(
        &self,
        id: &UnitId,
        predicate: F,
    ) -> Result<Vec<&'a HierarchyNode>, QueryError>
    where
        F: Fn(&HierarchyNode) -> bool,
    {
        let start = self.index.resolve(id)?;
        let order = self.index.subtree_ids(start, None);
        let graph = self.index.graph();

        // Post-order pass: a node is kept if it matches or any child is kept
        let position: std::collections::HashMap<NodeId, usize> =
            order.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let mut keep = vec![false; order.len()];
        for (i, node_id) in order.iter().enumerate().rev() {
            let node = graph.node(*node_id);
            keep[i] = predicate(node) || node.children.iter().any(|c| keep[position[c]]);
        }

        Ok(order
            .iter()
            .zip(keep)
            .filter(|(_, k)| *k)
            .map(|(n, _)| graph.node(*n))
            .collect())
    }
}

/// Case-insensitive name/ID substring predicate for [`QueryEngine::filtered_subtree`]
pub fn name_filter(text: &str) -> impl Fn(&HierarchyNode) -> bool {
    let needle = text.trim().to_lowercase();
    move |node: &HierarchyNode| {
        node.name().to_lowercase().contains(&needle)
            || node.id().as_str().to_lowercase().contains(&needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{BuildOptions, HierarchyBuilder};
    use crate::domain::relationship::Relationship;
    use crate::domain::unit::OrgUnit;
    use chrono::NaiveDate;

    fn id(s: &str) -> UnitId {
        UnitId::new(s).unwrap()
    }

    //        A            X
    //      /   \
    //     B     C
    //    / \     \
    //   D   E     F
    fn sample() -> HierarchyIndex {
        let units: Vec<_> = ["A", "B", "C", "D", "E", "F", "X"]
            .iter()
            .map(|u| OrgUnit::new(id(u), format!("Unit {}", u)))
            .collect();
        let rels: Vec<_> = [("B", "A"), ("C", "A"), ("D", "B"), ("E", "B"), ("F", "C")]
            .iter()
            .map(|(c, p)| Relationship::new(id(c), id(p), "A002"))
            .collect();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        HierarchyIndex::new(HierarchyBuilder::new(BuildOptions::new(date)).build(&units, &rels))
    }

    fn ids(nodes: &[&HierarchyNode]) -> Vec<String> {
        nodes.iter().map(|n| n.id().to_string()).collect()
    }

    fn strs(ids: &[&UnitId]) -> Vec<String> {
        ids.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn visible_to_level() {
        let index = sample();
        let engine = QueryEngine::new(&index);
        assert_eq!(ids(&engine.visible_to_level(0)), vec!["A", "X"]);
        assert_eq!(ids(&engine.visible_to_level(1)), vec!["A", "B", "C", "X"]);
        assert_eq!(engine.visible_to_level(10).len(), 7);
    }

    #[test]
    fn connect_through_common_ancestor() {
        let index = sample();
        let engine = QueryEngine::new(&index);

        let conn = engine.connect(&id("D"), &id("F")).unwrap();
        assert_eq!(conn.lca, Some(&id("A")));
        assert_eq!(strs(&conn.from_a), vec!["D", "B", "A"]);
        assert_eq!(strs(&conn.to_b), vec!["A", "C", "F"]);
        assert_eq!(strs(&conn.highlighted()), vec!["D", "B", "A", "C", "F"]);
    }

    #[test]
    fn connect_ancestor_and_descendant() {
        let index = sample();
        let engine = QueryEngine::new(&index);

        let conn = engine.connect(&id("B"), &id("E")).unwrap();
        assert_eq!(conn.lca, Some(&id("B")));
        assert_eq!(strs(&conn.highlighted()), vec!["B", "E"]);

        let same = engine.connect(&id("D"), &id("D")).unwrap();
        assert_eq!(strs(&same.highlighted()), vec!["D"]);
    }

    #[test]
    fn connect_across_trees() {
        let index = sample();
        let engine = QueryEngine::new(&index);

        let conn = engine.connect(&id("D"), &id("X")).unwrap();
        assert!(!conn.is_connected());
        assert_eq!(strs(&conn.from_a), vec!["D", "B", "A"]);
        assert_eq!(strs(&conn.to_b), vec!["X"]);
        assert_eq!(strs(&conn.highlighted()), vec!["D", "B", "A", "X"]);
    }

    #[test]
    fn connect_unknown_unit() {
        let index = sample();
        let engine = QueryEngine::new(&index);
        assert!(matches!(
            engine.connect(&id("A"), &id("nope")),
            Err(QueryError::NotFound(_))
        ));
    }

    #[test]
    fn filtered_subtree_keeps_ancestors_of_matches() {
        let index = sample();
        let engine = QueryEngine::new(&index);

        let kept = engine.filtered_subtree(&id("A"), name_filter("unit e")).unwrap();
        assert_eq!(ids(&kept), vec!["A", "B", "E"]);

        let kept = engine.filtered_subtree(&id("A"), |n| n.is_leaf()).unwrap();
        assert_eq!(ids(&kept), vec!["A", "B", "D", "E", "C", "F"]);

        let none = engine.filtered_subtree(&id("C"), name_filter("unit d")).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn pass_through_queries() {
        let index = sample();
        let engine = QueryEngine::new(&index);
        assert_eq!(ids(&engine.path_to_root(&id("E")).unwrap()), vec!["A", "B", "E"]);
        assert_eq!(ids(&engine.siblings(&id("D")).unwrap()), vec!["E"]);
        assert_eq!(ids(&engine.subtree(&id("C"), None).unwrap()), vec!["C", "F"]);
        assert_eq!(ids(&engine.search("unit x", 5)), vec!["X"]);
        assert_eq!(ids(&engine.search_words("UNIT", 3)), vec!["A", "B", "C"]);
        assert!(engine.search_words("uni", 3).is_empty());
    }
}
