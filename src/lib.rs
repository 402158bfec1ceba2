//! orgtree - Organizational hierarchies from SAP HRP1000/HRP1001 extracts
//!
//! Loads unit and relationship tables, resolves them into a forest as of an
//! evaluation date, reports cycles, parent conflicts and dangling references,
//! and answers navigation queries over the result.

pub mod domain;
pub mod storage;
pub mod cli;

pub use domain::{HierarchyIndex, OrgUnit, QueryEngine, Relationship, UnitId};
