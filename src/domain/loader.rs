//! Record loader
//!
//! Turns generic table rows into typed [`OrgUnit`] and [`Relationship`]
//! records. Bad rows are skipped and reported as [`LoadWarning`]s; only a
//! table that lacks a required column altogether is fatal.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

use super::id::UnitId;
use super::relationship::Relationship;
use super::unit::{OrgUnit, Validity};

/// SAP's "no date" placeholders
const NULL_DATES: &[&str] = &["00.00.0000", "00000000", "0000-00-00"];

/// Which input table a row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Units,
    Relationships,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::Units => f.write_str("units"),
            TableKind::Relationships => f.write_str("relationships"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum LoadError {
    #[error("The {table} table has no '{column}' column in any row")]
    MissingColumn { table: TableKind, column: String },
}

/// One row of a tabular extract, keyed by column header
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// Position in the input (1-based line or element number)
    pub index: usize,
    fields: HashMap<String, String>,
}

impl Row {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            fields: HashMap::new(),
        }
    }

    /// Builder-style insert, mostly for tests
    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(column.into(), value.into());
    }

    /// Returns the trimmed value of `column`, or `None` if absent or blank
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Returns true if the row has the column at all, even if blank
    pub fn has_column(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }
}

/// Column names of the units table (HRP1000)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitColumns {
    pub id: String,
    pub name: String,
    pub short_text: String,
    pub long_text: String,
    pub start: String,
    pub end: String,
    pub planning_status: String,
    pub object_type: String,
}

impl Default for UnitColumns {
    fn default() -> Self {
        Self {
            id: "Object ID".to_string(),
            name: "Name".to_string(),
            short_text: "Object abbr.".to_string(),
            long_text: "Long text".to_string(),
            start: "Start date".to_string(),
            end: "End Date".to_string(),
            planning_status: "Planning status".to_string(),
            object_type: "Object type".to_string(),
        }
    }
}

/// Column names of the relationships table (HRP1001)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipColumns {
    pub source: String,
    pub target: String,

    /// Full relationship code, e.g. `A002`
    pub code: String,

    /// Fallback when `code` is blank: direction letter (`A`/`B`) ...
    pub direction: String,

    /// ... followed by the relationship number (`002`)
    pub kind: String,

    pub start: String,
    pub end: String,
    pub planning_status: String,
}

impl Default for RelationshipColumns {
    fn default() -> Self {
        Self {
            source: "Source ID".to_string(),
            target: "Target object ID".to_string(),
            code: "Subtype".to_string(),
            direction: "Relationship".to_string(),
            kind: "Relnship".to_string(),
            start: "Start date".to_string(),
            end: "End Date".to_string(),
            planning_status: "Planning status".to_string(),
        }
    }
}

/// Settings for [`load`]
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderOptions {
    pub units: UnitColumns,
    pub relationships: RelationshipColumns,

    /// `chrono` format strings tried in order
    pub date_formats: Vec<String>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            units: UnitColumns::default(),
            relationships: RelationshipColumns::default(),
            date_formats: default_date_formats(),
        }
    }
}

pub fn default_date_formats() -> Vec<String> {
    vec![
        "%d.%m.%Y".to_string(),
        "%Y-%m-%d".to_string(),
        "%Y%m%d".to_string(),
    ]
}

/// What went wrong with a single row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningKind {
    /// The row could not be read as a record at all
    MalformedRow { reason: String },
    /// A required field is blank or absent; the row was skipped
    MissingField { column: String },
    /// A later row with the same unit ID replaced this one
    DuplicateUnit { id: UnitId, kept_row: usize },
    /// The unit has no name; its ID is used instead
    MissingName { id: UnitId },
    /// A date could not be parsed; the whole validity window was left open
    UnparsableDate { column: String, value: String },
    /// Start date lies after end date; the record is never active
    InvertedValidity { start: NaiveDate, end: NaiveDate },
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningKind::MalformedRow { reason } => write!(f, "malformed row: {}", reason),
            WarningKind::MissingField { column } => {
                write!(f, "missing required field '{}', row skipped", column)
            }
            WarningKind::DuplicateUnit { id, kept_row } => {
                write!(f, "duplicate unit {} discarded, row {} kept", id, kept_row)
            }
            WarningKind::MissingName { id } => write!(f, "unit {} has no name", id),
            WarningKind::UnparsableDate { column, value } => {
                write!(
                    f,
                    "unparsable date '{}' in '{}', validity left open",
                    value, column
                )
            }
            WarningKind::InvertedValidity { start, end } => {
                write!(f, "start date {} is after end date {}", start, end)
            }
        }
    }
}

/// A recoverable problem with one input row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadWarning {
    pub table: TableKind,
    pub row: usize,
    #[serde(flatten)]
    pub kind: WarningKind,
}

impl LoadWarning {
    pub fn new(table: TableKind, row: usize, kind: WarningKind) -> Self {
        Self { table, row, kind }
    }
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} row {}: {}", self.table, self.row, self.kind)
    }
}

/// Validated records plus everything that was skipped or patched
#[derive(Debug, Clone, Default)]
pub struct LoadedRecords {
    pub units: Vec<OrgUnit>,
    pub relationships: Vec<Relationship>,
    pub warnings: Vec<LoadWarning>,
}

impl LoadedRecords {
    /// The latest validity start seen in either table
    pub fn latest_date(&self) -> Option<NaiveDate> {
        let unit_starts = self.units.iter().filter_map(|u| u.validity.start);
        let rel_starts = self.relationships.iter().filter_map(|r| r.validity.start);
        unit_starts.chain(rel_starts).max()
    }
}

enum ParsedDate {
    Missing,
    Date(NaiveDate),
    Invalid,
}

fn parse_date(raw: Option<&str>, formats: &[String]) -> ParsedDate {
    let value = match raw {
        Some(v) if !NULL_DATES.contains(&v) => v,
        _ => return ParsedDate::Missing,
    };

    let try_all = |s: &str| {
        formats
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    };

    // Spreadsheet exports often append a time part
    let parsed = try_all(value).or_else(|| value.get(..10).and_then(try_all));

    match parsed {
        Some(date) => ParsedDate::Date(date),
        None => ParsedDate::Invalid,
    }
}

struct RowContext<'a> {
    table: TableKind,
    formats: &'a [String],
    warnings: &'a mut Vec<LoadWarning>,
}

impl ParsedDate {
    fn date(self) -> Option<NaiveDate> {
        match self {
            ParsedDate::Date(date) => Some(date),
            ParsedDate::Missing | ParsedDate::Invalid => None,
        }
    }
}

impl RowContext<'_> {
    fn date(&mut self, row: &Row, column: &str) -> ParsedDate {
        let parsed = parse_date(row.get(column), self.formats);
        if let ParsedDate::Invalid = parsed {
            self.warnings.push(LoadWarning::new(
                self.table,
                row.index,
                WarningKind::UnparsableDate {
                    column: column.to_string(),
                    value: row.get(column).unwrap_or_default().to_string(),
                },
            ));
        }
        parsed
    }

    /// An unreadable bound opens the whole window, not just that bound
    fn validity(&mut self, row: &Row, start: &str, end: &str) -> Validity {
        let validity = match (self.date(row, start), self.date(row, end)) {
            (ParsedDate::Invalid, _) | (_, ParsedDate::Invalid) => return Validity::open(),
            (start, end) => Validity::new(start.date(), end.date()),
        };
        if let (true, Some(s), Some(e)) = (validity.is_inverted(), validity.start, validity.end) {
            self.warnings.push(LoadWarning::new(
                self.table,
                row.index,
                WarningKind::InvertedValidity { start: s, end: e },
            ));
        }
        validity
    }

    fn required_id(&mut self, row: &Row, column: &str) -> Option<UnitId> {
        let id = row.get(column).and_then(|v| UnitId::new(v).ok());
        if id.is_none() {
            self.warnings.push(LoadWarning::new(
                self.table,
                row.index,
                WarningKind::MissingField {
                    column: column.to_string(),
                },
            ));
        }
        id
    }
}

fn require_column(rows: &[Row], table: TableKind, column: &str) -> Result<(), LoadError> {
    if rows.is_empty() || rows.iter().any(|r| r.has_column(column)) {
        Ok(())
    } else {
        Err(LoadError::MissingColumn {
            table,
            column: column.to_string(),
        })
    }
}

fn optional(row: &Row, column: &str) -> Option<String> {
    row.get(column).map(str::to_string)
}

/// Parses both tables into validated records
pub fn load(
    unit_rows: &[Row],
    relationship_rows: &[Row],
    options: &LoaderOptions,
) -> Result<LoadedRecords, LoadError> {
    let ucols = &options.units;
    let rcols = &options.relationships;

    require_column(unit_rows, TableKind::Units, &ucols.id)?;
    require_column(relationship_rows, TableKind::Relationships, &rcols.source)?;
    require_column(relationship_rows, TableKind::Relationships, &rcols.target)?;

    let mut warnings = Vec::new();
    let units = load_units(unit_rows, options, &mut warnings);
    let relationships = load_relationships(relationship_rows, options, &mut warnings);

    debug!(
        units = units.len(),
        relationships = relationships.len(),
        warnings = warnings.len(),
        "Loaded records"
    );

    Ok(LoadedRecords {
        units,
        relationships,
        warnings,
    })
}

fn load_units(rows: &[Row], options: &LoaderOptions, warnings: &mut Vec<LoadWarning>) -> Vec<OrgUnit> {
    let cols = &options.units;
    let mut ctx = RowContext {
        table: TableKind::Units,
        formats: &options.date_formats,
        warnings,
    };

    let mut units: Vec<OrgUnit> = Vec::new();
    let mut rows_of: Vec<usize> = Vec::new();
    let mut position: HashMap<UnitId, usize> = HashMap::new();

    for row in rows {
        let Some(id) = ctx.required_id(row, &cols.id) else {
            continue;
        };

        let name = match row.get(&cols.name) {
            Some(name) => name.to_string(),
            None => {
                ctx.warnings.push(LoadWarning::new(
                    TableKind::Units,
                    row.index,
                    WarningKind::MissingName { id: id.clone() },
                ));
                id.to_string()
            }
        };

        let unit = OrgUnit {
            id: id.clone(),
            name,
            short_text: optional(row, &cols.short_text),
            long_text: optional(row, &cols.long_text),
            validity: ctx.validity(row, &cols.start, &cols.end),
            planning_status: optional(row, &cols.planning_status),
            object_type: optional(row, &cols.object_type),
        };

        match position.get(&id) {
            Some(&pos) => {
                ctx.warnings.push(LoadWarning::new(
                    TableKind::Units,
                    rows_of[pos],
                    WarningKind::DuplicateUnit {
                        id,
                        kept_row: row.index,
                    },
                ));
                units[pos] = unit;
                rows_of[pos] = row.index;
            }
            None => {
                position.insert(id, units.len());
                units.push(unit);
                rows_of.push(row.index);
            }
        }
    }

    units
}

fn load_relationships(
    rows: &[Row],
    options: &LoaderOptions,
    warnings: &mut Vec<LoadWarning>,
) -> Vec<Relationship> {
    let cols = &options.relationships;
    let mut ctx = RowContext {
        table: TableKind::Relationships,
        formats: &options.date_formats,
        warnings,
    };

    let mut relationships = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(source) = ctx.required_id(row, &cols.source) else {
            continue;
        };
        let Some(target) = ctx.required_id(row, &cols.target) else {
            continue;
        };

        let code = match row.get(&cols.code) {
            Some(code) => code.to_string(),
            None => format!(
                "{}{}",
                row.get(&cols.direction).unwrap_or_default(),
                row.get(&cols.kind).unwrap_or_default()
            ),
        };

        relationships.push(Relationship {
            source,
            target,
            code,
            validity: ctx.validity(row, &cols.start, &cols.end),
            planning_status: optional(row, &cols.planning_status),
            row: row.index,
        });
    }

    relationships
}
