//! Domain model for orgtree
//!
//! Loading, hierarchy construction, indexing and queries. No I/O happens
//! here; callers hand in parsed rows and get plain data structures back.

mod id;
mod unit;
mod relationship;
mod anomaly;
mod loader;
mod graph;
mod index;
mod query;
mod stats;

pub use id::{IdError, UnitId};
pub use unit::{OrgUnit, Validity};
pub use relationship::{EdgeDirection, RelationFilter, RelationType, Relationship};
pub use anomaly::{
    AnomalyReport, ConflictReason, CycleAnomaly, DanglingEdge, MissingEndpoint, ParentConflict,
    ResolvedEdge,
};
pub use loader::{
    default_date_formats, load, LoadError, LoadWarning, LoadedRecords, LoaderOptions,
    RelationshipColumns, Row, TableKind, UnitColumns, WarningKind,
};
pub use graph::{
    BuildOptions, BuildSummary, HierarchyBuilder, HierarchyGraph, HierarchyNode, NodeAnomaly,
    NodeId, SiblingOrder,
};
pub use index::{HierarchyIndex, QueryError};
pub use query::{name_filter, QueryEngine, UnitConnection};
pub use stats::{level_label, HierarchyStats};
