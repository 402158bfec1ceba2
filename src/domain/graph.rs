//! Hierarchy builder
//!
//! Resolves loaded units and relationships into a forest for one evaluation
//! date. The build never fails: dangling edges, competing parents and cycles
//! are quarantined by fixed rules and recorded in the [`AnomalyReport`].
//!
//! Nodes live in an arena owned by [`HierarchyGraph`]; parent and child links
//! are [`NodeId`] indices into it. Cycle detection uses petgraph.

use chrono::NaiveDate;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use super::anomaly::{
    AnomalyReport, ConflictReason, CycleAnomaly, DanglingEdge, MissingEndpoint, ParentConflict,
    ResolvedEdge,
};
use super::id::UnitId;
use super::relationship::{RelationFilter, Relationship};
use super::unit::OrgUnit;

/// Index of a node in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Why a node was touched by quarantine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeAnomaly {
    /// Was on a cycle and got cut loose from its parent
    Cycle,
    /// Had competing parents; one was chosen
    ParentConflict,
}

/// How siblings (and roots) are ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiblingOrder {
    #[default]
    Id,
    Name,
    ShortText,
}

impl SiblingOrder {
    /// Compares two units; the unit ID always breaks ties
    pub fn compare(&self, a: &OrgUnit, b: &OrgUnit) -> Ordering {
        let primary = match self {
            SiblingOrder::Id => Ordering::Equal,
            SiblingOrder::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SiblingOrder::ShortText => {
                let key = |u: &OrgUnit| u.short_text.as_deref().unwrap_or(&u.name).to_lowercase();
                key(a).cmp(&key(b))
            }
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// One unit placed in the forest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    pub unit: OrgUnit,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Distance from the root; roots are 0
    pub depth: usize,
    /// Number of nodes in this subtree, including the node itself
    pub subtree_size: usize,
    pub anomaly: Option<NodeAnomaly>,
}

impl HierarchyNode {
    fn new(unit: OrgUnit) -> Self {
        Self {
            unit,
            parent: None,
            children: Vec::new(),
            depth: 0,
            subtree_size: 1,
            anomaly: None,
        }
    }

    pub fn id(&self) -> &UnitId {
        &self.unit.id
    }

    pub fn name(&self) -> &str {
        &self.unit.name
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn descendant_count(&self) -> usize {
        self.subtree_size - 1
    }
}

/// Counters describing what went into a build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSummary {
    pub units_loaded: usize,
    pub units_active: usize,
    pub relationships_loaded: usize,
    /// Relationships that passed the type, status and date filters
    pub relationships_active: usize,
    pub edges_assigned: usize,
}

/// Settings for one build
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    pub evaluation_date: NaiveDate,
    pub relation_types: RelationFilter,
    /// Accepted planning statuses; empty accepts all
    pub planning_statuses: Vec<String>,
    pub sibling_order: SiblingOrder,
}

impl BuildOptions {
    pub fn new(evaluation_date: NaiveDate) -> Self {
        Self {
            evaluation_date,
            relation_types: RelationFilter::default(),
            planning_statuses: vec!["1".to_string()],
            sibling_order: SiblingOrder::Id,
        }
    }

    fn status_allowed(&self, status: Option<&str>) -> bool {
        match status {
            Some(s) if !self.planning_statuses.is_empty() => {
                self.planning_statuses.iter().any(|p| p.trim() == s.trim())
            }
            _ => true,
        }
    }
}

/// The resolved forest plus its anomaly accounting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyGraph {
    nodes: Vec<HierarchyNode>,
    roots: Vec<NodeId>,
    anomalies: AnomalyReport,
    inactive: Vec<UnitId>,
    evaluation_date: NaiveDate,
    summary: BuildSummary,
}

impl HierarchyGraph {
    pub fn nodes(&self) -> &[HierarchyNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &HierarchyNode {
        &self.nodes[id.0]
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn anomalies(&self) -> &AnomalyReport {
        &self.anomalies
    }

    /// Units excluded because they had no record valid for the snapshot
    pub fn inactive(&self) -> &[UnitId] {
        &self.inactive
    }

    pub fn evaluation_date(&self) -> NaiveDate {
        self.evaluation_date
    }

    pub fn summary(&self) -> &BuildSummary {
        &self.summary
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates node IDs in arena order (ascending unit ID)
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Walks parent links from `id` (exclusive) up to its root
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            graph: self,
            next: self.nodes[id.0].parent,
        }
    }

    /// Forest pre-order, roots in sibling order
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        order
    }
}

pub struct Ancestors<'a> {
    graph: &'a HierarchyGraph,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.graph.nodes[current.0].parent;
        Some(current)
    }
}

struct Candidate<'a> {
    parent: NodeId,
    rel: &'a Relationship,
    edge: ResolvedEdge,
}

/// Builds a [`HierarchyGraph`] from loaded records
pub struct HierarchyBuilder {
    options: BuildOptions,
}

impl HierarchyBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn build(&self, units: &[OrgUnit], relationships: &[Relationship]) -> HierarchyGraph {
        let opts = &self.options;
        let date = opts.evaluation_date;
        let mut report = AnomalyReport::default();

        // Units valid for this snapshot, in ascending ID order
        let (mut active, inactive): (Vec<&OrgUnit>, Vec<&OrgUnit>) = units
            .iter()
            .partition(|u| u.is_valid_on(date) && opts.status_allowed(u.planning_status.as_deref()));
        active.sort_by(|a, b| a.id.cmp(&b.id));
        let mut inactive: Vec<UnitId> = inactive.into_iter().map(|u| u.id.clone()).collect();
        inactive.sort();

        let lookup: HashMap<&UnitId, NodeId> = active
            .iter()
            .enumerate()
            .map(|(i, u)| (&u.id, NodeId(i)))
            .collect();

        let mut nodes: Vec<HierarchyNode> =
            active.iter().map(|u| HierarchyNode::new((*u).clone())).collect();

        // Filter relationships and group parent candidates per child
        let mut relationships_active = 0;
        let mut candidates: BTreeMap<NodeId, Vec<Candidate>> = BTreeMap::new();

        for rel in relationships {
            let Some(direction) = opts.relation_types.direction(&rel.code) else {
                continue;
            };
            if !rel.is_active_on(date) || !opts.status_allowed(rel.planning_status.as_deref()) {
                continue;
            }
            relationships_active += 1;

            let source = lookup.get(&rel.source).copied();
            let target = lookup.get(&rel.target).copied();
            if let Some(missing) = MissingEndpoint::from_flags(source.is_none(), target.is_none()) {
                report.dangling.push(DanglingEdge {
                    relationship: rel.clone(),
                    missing,
                });
                continue;
            }

            let (parent_id, child_id) = rel.orient(direction);
            let parent = lookup[parent_id];
            let child = lookup[child_id];
            candidates.entry(child).or_default().push(Candidate {
                parent,
                rel,
                edge: ResolvedEdge::new(parent_id.clone(), child_id.clone(), rel),
            });
        }

        // Resolve one parent per child
        let mut parents: Vec<Option<NodeId>> = vec![None; nodes.len()];
        for (child, mut cands) in candidates {
            // Most recent start first, then lowest parent ID
            cands.sort_by(|a, b| {
                Reverse(a.rel.validity.start)
                    .cmp(&Reverse(b.rel.validity.start))
                    .then_with(|| nodes[a.parent.0].unit.id.cmp(&nodes[b.parent.0].unit.id))
                    .then_with(|| a.rel.row.cmp(&b.rel.row))
            });

            // Keep the strongest edge per distinct parent
            let before = cands.len();
            let mut distinct: Vec<Candidate> = Vec::with_capacity(before);
            for cand in cands {
                if !distinct.iter().any(|d| d.parent == cand.parent) {
                    distinct.push(cand);
                }
            }
            report.duplicate_edges += before - distinct.len();

            let mut distinct = distinct.into_iter();
            let Some(winner) = distinct.next() else {
                continue;
            };
            parents[child.0] = Some(winner.parent);

            let losers: Vec<Candidate> = distinct.collect();
            if losers.is_empty() {
                continue;
            }

            let reason = if losers[0].rel.validity.start == winner.rel.validity.start {
                ConflictReason::LowerParentId
            } else {
                ConflictReason::LaterStart
            };
            let mut losing: Vec<UnitId> = losers.iter().map(|c| c.edge.parent.clone()).collect();
            losing.sort();
            let mut all: Vec<UnitId> = losing.clone();
            all.push(winner.edge.parent.clone());
            all.sort();

            report.conflicts.push(ParentConflict {
                unit: nodes[child.0].unit.id.clone(),
                candidates: all,
                chosen: winner.edge.parent.clone(),
                losing,
                reason,
            });
            report.quarantined.extend(losers.into_iter().map(|c| c.edge));
            nodes[child.0].anomaly = Some(NodeAnomaly::ParentConflict);
        }

        report.cycles = break_cycles(&mut parents, &mut nodes);

        let edges_assigned = parents.iter().filter(|p| p.is_some()).count();
        for (i, parent) in parents.iter().enumerate() {
            nodes[i].parent = *parent;
            if let Some(p) = parent {
                nodes[p.0].children.push(NodeId(i));
            }
        }

        let order = opts.sibling_order;
        let mut roots: Vec<NodeId> = (0..nodes.len())
            .filter(|&i| nodes[i].parent.is_none())
            .map(NodeId)
            .collect();
        roots.sort_by(|a, b| order.compare(&nodes[a.0].unit, &nodes[b.0].unit));
        for i in 0..nodes.len() {
            let mut children = std::mem::take(&mut nodes[i].children);
            children.sort_by(|a, b| order.compare(&nodes[a.0].unit, &nodes[b.0].unit));
            nodes[i].children = children;
        }

        compute_depth_and_size(&mut nodes, &roots);

        let summary = BuildSummary {
            units_loaded: units.len(),
            units_active: nodes.len(),
            relationships_loaded: relationships.len(),
            relationships_active,
            edges_assigned,
        };

        debug!(
            date = %date,
            units = summary.units_active,
            inactive = inactive.len(),
            roots = roots.len(),
            edges = edges_assigned,
            "Built hierarchy"
        );
        if !report.is_clean() {
            warn!(
                cycles = report.cycles.len(),
                conflicts = report.conflicts.len(),
                dangling = report.dangling.len(),
                "Hierarchy has anomalies"
            );
        }

        inactive.dedup();
        HierarchyGraph {
            nodes,
            roots,
            anomalies: report,
            inactive,
            evaluation_date: date,
            summary,
        }
    }
}

/// Cuts every cycle in the child -> parent links and returns them
fn break_cycles(parents: &mut [Option<NodeId>], nodes: &mut [HierarchyNode]) -> Vec<CycleAnomaly> {
    let mut graph: DiGraph<(), ()> = DiGraph::with_capacity(parents.len(), parents.len());
    for _ in 0..parents.len() {
        graph.add_node(());
    }
    for (child, parent) in parents.iter().enumerate() {
        if let Some(p) = parent {
            graph.add_edge(NodeIndex::new(child), NodeIndex::new(p.0), ());
        }
    }

    let mut cycles = Vec::new();
    for component in tarjan_scc(&graph) {
        let is_cycle = component.len() > 1
            || component
                .first()
                .is_some_and(|n| parents[n.index()] == Some(NodeId(n.index())));
        if !is_cycle {
            continue;
        }

        // Start at the lowest ID and follow parent links round the loop
        let Some(start) = component
            .iter()
            .map(|n| NodeId(n.index()))
            .min_by(|a, b| nodes[a.0].unit.id.cmp(&nodes[b.0].unit.id))
        else {
            continue;
        };

        let mut units = Vec::with_capacity(component.len());
        let mut current = start;
        loop {
            units.push(nodes[current.0].unit.id.clone());
            match parents[current.0] {
                Some(next) if next != start => current = next,
                _ => break,
            }
        }

        for n in &component {
            parents[n.index()] = None;
            nodes[n.index()].anomaly = Some(NodeAnomaly::Cycle);
        }
        cycles.push(CycleAnomaly { units });
    }

    cycles.sort_by(|a, b| a.units.first().cmp(&b.units.first()));
    cycles
}

/// Depth top-down from the roots, subtree size bottom-up
fn compute_depth_and_size(nodes: &mut [HierarchyNode], roots: &[NodeId]) {
    let mut order = Vec::with_capacity(nodes.len());
    let mut stack: Vec<NodeId> = roots.to_vec();
    while let Some(id) = stack.pop() {
        order.push(id);
        let depth = nodes[id.0].depth + 1;
        for i in 0..nodes[id.0].children.len() {
            let child = nodes[id.0].children[i];
            nodes[child.0].depth = depth;
            stack.push(child);
        }
    }

    for id in order.into_iter().rev() {
        let size = 1 + nodes[id.0]
            .children
            .iter()
            .map(|c| nodes[c.0].subtree_size)
            .sum::<usize>();
        nodes[id.0].subtree_size = size;
    }
}
