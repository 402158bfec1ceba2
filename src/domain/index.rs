//! Read-only lookup structure over a built [`HierarchyGraph`]
//!
//! Built once in a single pass; every query afterwards is O(depth) or
//! O(result size). Substring search reads trigram postings and only scans
//! every key for needles shorter than three characters. The index owns its
//! graph and is `Send + Sync`, so it can be shared between threads behind an
//! `Arc` without locking.

use std::collections::HashMap;
use thiserror::Error;

use super::graph::{HierarchyGraph, HierarchyNode, NodeId};
use super::id::UnitId;

/// Length of the substrings kept in the search postings
const GRAM_LEN: usize = 3;

#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("Unit not found: {0}")]
    NotFound(UnitId),
}

struct SearchKey {
    id: String,
    name: String,
}

/// ID, name and token lookups for one hierarchy snapshot
pub struct HierarchyIndex {
    graph: HierarchyGraph,
    by_id: HashMap<UnitId, NodeId>,
    by_lower_id: HashMap<String, NodeId>,
    by_name: HashMap<String, Vec<NodeId>>,
    by_token: HashMap<String, Vec<NodeId>>,
    by_gram: HashMap<String, Vec<NodeId>>,
    /// All nodes in arena order, so `search_keys[node.index()]` is that node's key
    search_keys: Vec<SearchKey>,
}

impl HierarchyIndex {
    pub fn new(graph: HierarchyGraph) -> Self {
        let mut by_id = HashMap::with_capacity(graph.len());
        let mut by_lower_id = HashMap::with_capacity(graph.len());
        let mut by_name: HashMap<String, Vec<NodeId>> = HashMap::new();
        let mut by_token: HashMap<String, Vec<NodeId>> = HashMap::new();
        let mut by_gram: HashMap<String, Vec<NodeId>> = HashMap::new();
        let mut search_keys = Vec::with_capacity(graph.len());

        // Arena order is ascending unit ID, so every list below stays sorted
        for node_id in graph.node_ids() {
            let node = graph.node(node_id);
            let name = node.name().to_lowercase();
            let lower_id = node.id().as_str().to_lowercase();

            by_id.insert(node.id().clone(), node_id);
            by_lower_id.entry(lower_id.clone()).or_insert(node_id);
            by_name.entry(name.clone()).or_default().push(node_id);

            let mut tokens: Vec<&str> = name
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| !t.is_empty())
                .collect();
            tokens.sort_unstable();
            tokens.dedup();
            for token in tokens {
                by_token.entry(token.to_string()).or_default().push(node_id);
            }

            let mut grams = trigrams(&lower_id);
            grams.extend(trigrams(&name));
            grams.sort_unstable();
            grams.dedup();
            for gram in grams {
                by_gram.entry(gram).or_default().push(node_id);
            }

            search_keys.push(SearchKey {
                id: lower_id,
                name,
            });
        }

        Self {
            graph,
            by_id,
            by_lower_id,
            by_name,
            by_token,
            by_gram,
            search_keys,
        }
    }

    pub fn graph(&self) -> &HierarchyGraph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &HierarchyNode {
        self.graph.node(id)
    }

    pub fn roots(&self) -> Vec<&HierarchyNode> {
        self.nodes(self.graph.roots())
    }

    /// Looks up the arena index of a unit
    pub fn resolve(&self, id: &UnitId) -> Result<NodeId, QueryError> {
        self.by_id
            .get(id)
            .copied()
            .ok_or_else(|| QueryError::NotFound(id.clone()))
    }

    pub fn get(&self, id: &UnitId) -> Result<&HierarchyNode, QueryError> {
        Ok(self.graph.node(self.resolve(id)?))
    }

    pub fn contains(&self, id: &UnitId) -> bool {
        self.by_id.contains_key(id)
    }

    fn nodes(&self, ids: &[NodeId]) -> Vec<&HierarchyNode> {
        ids.iter().map(|n| self.graph.node(*n)).collect()
    }

    /// Nodes from the root down to `id`, inclusive
    pub fn ancestor_path(&self, id: &UnitId) -> Result<Vec<&HierarchyNode>, QueryError> {
        let start = self.resolve(id)?;
        let mut path: Vec<NodeId> = std::iter::once(start)
            .chain(self.graph.ancestors(start))
            .collect();
        path.reverse();
        Ok(self.nodes(&path))
    }

    /// Pre-order subtree rooted at `id`, optionally cut after `max_depth` levels
    pub fn subtree(
        &self,
        id: &UnitId,
        max_depth: Option<usize>,
    ) -> Result<Vec<&HierarchyNode>, QueryError> {
        let start = self.resolve(id)?;
        Ok(self.nodes(&self.subtree_ids(start, max_depth)))
    }

    pub(crate) fn subtree_ids(&self, start: NodeId, max_depth: Option<usize>) -> Vec<NodeId> {
        let base = self.graph.node(start).depth;
        let mut order = Vec::with_capacity(self.graph.node(start).subtree_size);
        let mut stack = vec![start];

        while let Some(current) = stack.pop() {
            order.push(current);
            let node = self.graph.node(current);
            if max_depth.is_some_and(|max| node.depth - base >= max) {
                continue;
            }
            stack.extend(node.children.iter().rev().copied());
        }

        order
    }

    pub fn descendant_count(&self, id: &UnitId) -> Result<usize, QueryError> {
        Ok(self.get(id)?.descendant_count())
    }

    pub fn depth(&self, id: &UnitId) -> Result<usize, QueryError> {
        Ok(self.get(id)?.depth)
    }

    /// Other children of the same parent; for a root, the other roots
    pub fn siblings(&self, id: &UnitId) -> Result<Vec<&HierarchyNode>, QueryError> {
        let node_id = self.resolve(id)?;
        let pool = match self.graph.node(node_id).parent {
            Some(parent) => &self.graph.node(parent).children,
            None => self.graph.roots(),
        };
        Ok(pool
            .iter()
            .filter(|n| **n != node_id)
            .map(|n| self.graph.node(*n))
            .collect())
    }

    /// Case-insensitive search over unit ID and name
    ///
    /// Exact ID match first, then exact name matches, then any other
    /// substring matches; each group in ascending ID order.
    pub fn search(&self, text: &str, limit: usize) -> Vec<&HierarchyNode> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut hits: Vec<NodeId> = Vec::new();

        let exact_id = UnitId::new(text)
            .ok()
            .and_then(|id| self.by_id.get(&id).copied())
            .or_else(|| self.by_lower_id.get(&needle).copied());
        hits.extend(exact_id);

        if let Some(named) = self.by_name.get(&needle) {
            hits.extend(named.iter().filter(|n| Some(**n) != exact_id));
        }

        let exact_count = hits.len();
        for node in self.substring_candidates(&needle) {
            if hits.len() >= limit {
                break;
            }
            let key = &self.search_keys[node.index()];
            if (key.id.contains(&needle) || key.name.contains(&needle))
                && !hits[..exact_count].contains(&node)
            {
                hits.push(node);
            }
        }

        hits.truncate(limit);
        self.nodes(&hits)
    }

    /// Nodes that may contain the lowercase `needle`, in ascending ID order
    ///
    /// Every trigram of the needle must occur in a match, so the shortest
    /// posting list bounds the candidates. Needles shorter than a trigram
    /// get every node.
    pub(crate) fn substring_candidates(&self, needle: &str) -> Vec<NodeId> {
        let grams = trigrams(needle);
        if grams.is_empty() {
            return self.graph.node_ids().collect();
        }
        grams
            .iter()
            .map(|g| self.by_gram.get(g).map_or(&[][..], Vec::as_slice))
            .min_by_key(|postings| postings.len())
            .map(<[NodeId]>::to_vec)
            .unwrap_or_default()
    }

    /// Units whose name contains `token` as a whole word
    pub fn by_token(&self, token: &str) -> Vec<&HierarchyNode> {
        self.by_token
            .get(&token.trim().to_lowercase())
            .map(|ids| self.nodes(ids))
            .unwrap_or_default()
    }
}

fn trigrams(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut grams: Vec<String> = chars
        .windows(GRAM_LEN)
        .map(|w| w.iter().collect())
        .collect();
    grams.sort_unstable();
    grams.dedup();
    grams
}
