//! Organizational units and validity windows
//!
//! An [`OrgUnit`] is one HRP1000 record. Both units and relationships carry a
//! [`Validity`] window that decides whether they take part in a snapshot.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::id::UnitId;

/// Inclusive validity window; `None` bounds are open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Validity {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl Validity {
    /// A window open on both ends
    pub fn open() -> Self {
        Self::default()
    }

    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// Window starting at `start` with no end
    pub fn from(start: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Returns true if `date` lies inside the window (both ends inclusive)
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| s <= date) && self.end.map_or(true, |e| date <= e)
    }

    /// Returns true if the start date is after the end date
    pub fn is_inverted(&self) -> bool {
        matches!((self.start, self.end), (Some(s), Some(e)) if s > e)
    }
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.start {
            Some(s) => write!(f, "{}", s)?,
            None => f.write_str("-inf")?,
        }
        f.write_str(" .. ")?;
        match self.end {
            Some(e) => write!(f, "{}", e),
            None => f.write_str("+inf"),
        }
    }
}

/// An organizational unit (department, position, team)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgUnit {
    pub id: UnitId,

    /// Display name
    pub name: String,

    /// Short text, e.g. the object abbreviation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_text: Option<String>,

    pub validity: Validity,

    /// SAP planning status (`1` = active)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning_status: Option<String>,

    /// SAP object type (`O` = organizational unit, `S` = position)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
}

impl OrgUnit {
    /// Creates a unit with an open validity window
    pub fn new(id: UnitId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            short_text: None,
            long_text: None,
            validity: Validity::open(),
            planning_status: None,
            object_type: None,
        }
    }

    pub fn with_validity(mut self, validity: Validity) -> Self {
        self.validity = validity;
        self
    }

    pub fn with_object_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = Some(object_type.into());
        self
    }

    /// Returns true if the unit has a record valid on `date`
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.validity.contains(date)
    }
}
