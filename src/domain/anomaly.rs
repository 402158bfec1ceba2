//! Structural anomalies found while resolving the hierarchy
//!
//! Nothing here aborts a build. Every edge the builder refuses to use ends up
//! in the [`AnomalyReport`] so the breakage stays inspectable.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::id::UnitId;
use super::relationship::Relationship;
use super::unit::Validity;

/// A relationship resolved into a parent -> child edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEdge {
    pub parent: UnitId,
    pub child: UnitId,
    pub code: String,
    pub validity: Validity,
    /// Row of the originating relationship
    pub row: usize,
}

impl ResolvedEdge {
    pub fn new(parent: UnitId, child: UnitId, rel: &Relationship) -> Self {
        Self {
            parent,
            child,
            code: rel.code.clone(),
            validity: rel.validity,
            row: rel.row,
        }
    }
}

/// Units whose parent links formed a loop, in parent-walk order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleAnomaly {
    pub units: Vec<UnitId>,
}

impl fmt::Display for CycleAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<_> = self.units.iter().map(UnitId::as_str).collect();
        match self.units.first() {
            Some(first) => write!(f, "{} -> {}", ids.join(" -> "), first),
            None => Ok(()),
        }
    }
}

/// Why the winning parent was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// Its relationship has the most recent validity start
    LaterStart,
    /// Several relationships started on the same date; lowest parent ID won
    LowerParentId,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::LaterStart => f.write_str("most recent start date"),
            ConflictReason::LowerParentId => f.write_str("same start date, lowest parent ID"),
        }
    }
}

/// A unit with more than one active parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentConflict {
    pub unit: UnitId,
    /// Every distinct competing parent, ascending
    pub candidates: Vec<UnitId>,
    pub chosen: UnitId,
    pub losing: Vec<UnitId>,
    pub reason: ConflictReason,
}

/// Which end of a relationship did not resolve to a loaded unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingEndpoint {
    Source,
    Target,
    Both,
}

impl MissingEndpoint {
    pub fn from_flags(source_missing: bool, target_missing: bool) -> Option<Self> {
        match (source_missing, target_missing) {
            (true, true) => Some(MissingEndpoint::Both),
            (true, false) => Some(MissingEndpoint::Source),
            (false, true) => Some(MissingEndpoint::Target),
            (false, false) => None,
        }
    }
}

/// A relationship referencing a unit that is not in the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DanglingEdge {
    pub relationship: Relationship,
    pub missing: MissingEndpoint,
}

impl DanglingEdge {
    /// The IDs that failed to resolve
    pub fn missing_ids(&self) -> Vec<&UnitId> {
        let rel = &self.relationship;
        match self.missing {
            MissingEndpoint::Source => vec![&rel.source],
            MissingEndpoint::Target => vec![&rel.target],
            MissingEndpoint::Both => vec![&rel.source, &rel.target],
        }
    }
}

/// Everything the builder cut, dropped or had to decide
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub cycles: Vec<CycleAnomaly>,
    pub conflicts: Vec<ParentConflict>,
    pub dangling: Vec<DanglingEdge>,

    /// Losing edges of parent conflicts
    pub quarantined: Vec<ResolvedEdge>,

    /// Edges that restated an already known parent
    pub duplicate_edges: usize,
}

impl AnomalyReport {
    /// Number of reported anomalies (cycles, conflicts, dangling edges)
    pub fn total(&self) -> usize {
        self.cycles.len() + self.conflicts.len() + self.dangling.len()
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }
}
