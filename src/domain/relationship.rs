//! Typed, time-bounded relationships between units (HRP1001)
//!
//! A relationship only says "source <code> target". Which end is the parent
//! depends on the code: `A002` ("reports to") points from child to parent,
//! `B002` ("is line supervisor of") from parent to child. [`RelationFilter`]
//! carries that knowledge and selects the codes that form the hierarchy.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::id::UnitId;
use super::unit::Validity;

/// Which end of a relationship is the parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeDirection {
    /// "source reports to target"
    TargetIsParent,
    /// "source is superior of target"
    SourceIsParent,
}

/// A directed, typed link between two units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: UnitId,
    pub target: UnitId,

    /// Relationship type code, e.g. `A002`
    pub code: String,

    pub validity: Validity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning_status: Option<String>,

    /// Row index in the input table
    pub row: usize,
}

impl Relationship {
    pub fn new(source: UnitId, target: UnitId, code: impl Into<String>) -> Self {
        Self {
            source,
            target,
            code: code.into(),
            validity: Validity::open(),
            planning_status: None,
            row: 0,
        }
    }

    pub fn with_validity(mut self, validity: Validity) -> Self {
        self.validity = validity;
        self
    }

    pub fn at_row(mut self, row: usize) -> Self {
        self.row = row;
        self
    }

    /// Returns true if the relationship is in force on `date`
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.validity.contains(date)
    }

    /// Orients the relationship as `(parent, child)`
    pub fn orient(&self, direction: EdgeDirection) -> (&UnitId, &UnitId) {
        match direction {
            EdgeDirection::TargetIsParent => (&self.target, &self.source),
            EdgeDirection::SourceIsParent => (&self.source, &self.target),
        }
    }
}

/// One relationship code that takes part in parent resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationType {
    pub code: String,
    pub direction: EdgeDirection,
}

/// The set of hierarchical relationship codes and their direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationFilter {
    codes: BTreeMap<String, EdgeDirection>,
}

impl RelationFilter {
    /// A filter that accepts nothing
    pub fn empty() -> Self {
        Self {
            codes: BTreeMap::new(),
        }
    }

    /// Builds a filter from configured relation types; later entries win
    pub fn from_types<'a>(types: impl IntoIterator<Item = &'a RelationType>) -> Self {
        let codes = types
            .into_iter()
            .map(|t| (t.code.trim().to_ascii_uppercase(), t.direction))
            .collect();
        Self { codes }
    }

    pub fn with(mut self, code: &str, direction: EdgeDirection) -> Self {
        self.codes.insert(code.trim().to_ascii_uppercase(), direction);
        self
    }

    /// Returns the parent direction for `code`, or `None` if not hierarchical
    pub fn direction(&self, code: &str) -> Option<EdgeDirection> {
        self.codes.get(&code.trim().to_ascii_uppercase()).copied()
    }

    pub fn codes(&self) -> impl Iterator<Item = (&str, EdgeDirection)> {
        self.codes.iter().map(|(c, d)| (c.as_str(), *d))
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl Default for RelationFilter {
    /// The SAP line-reporting pair: `A002` reports to, `B002` is superior of
    fn default() -> Self {
        Self::empty()
            .with("A002", EdgeDirection::TargetIsParent)
            .with("B002", EdgeDirection::SourceIsParent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> UnitId {
        UnitId::new(s).unwrap()
    }

    #[test]
    fn orient_reports_to() {
        let rel = Relationship::new(id("child"), id("parent"), "A002");
        let (parent, child) = rel.orient(EdgeDirection::TargetIsParent);
        assert_eq!(parent, &id("parent"));
        assert_eq!(child, &id("child"));
    }

    #[test]
    fn orient_supervisor_of() {
        let rel = Relationship::new(id("boss"), id("team"), "B002");
        let (parent, child) = rel.orient(EdgeDirection::SourceIsParent);
        assert_eq!(parent, &id("boss"));
        assert_eq!(child, &id("team"));
    }

    #[test]
    fn default_filter_has_line_pair() {
        let filter = RelationFilter::default();
        assert_eq!(filter.direction("A002"), Some(EdgeDirection::TargetIsParent));
        assert_eq!(filter.direction("b002"), Some(EdgeDirection::SourceIsParent));
        assert_eq!(filter.direction("A003"), None);
        assert_eq!(filter.direction(""), None);
    }

    #[test]
    fn filter_from_config_types() {
        let types = vec![RelationType {
            code: " a003 ".to_string(),
            direction: EdgeDirection::TargetIsParent,
        }];
        let filter = RelationFilter::from_types(&types);
        assert_eq!(filter.direction("A003"), Some(EdgeDirection::TargetIsParent));
        assert_eq!(filter.direction("A002"), None);
        assert!(!filter.is_empty());
        assert!(RelationFilter::empty().is_empty());
    }

    #[test]
    fn relation_type_parses_from_toml() {
        let t: RelationType =
            toml::from_str("code = \"A002\"\ndirection = \"target_is_parent\"").unwrap();
        assert_eq!(t.direction, EdgeDirection::TargetIsParent);
    }
}
