//! Table files
//!
//! Input tables are JSON: either one object per line (JSONL) or a single
//! array of objects, keyed by column header. Lines that are not objects are
//! rejected individually; a file where nothing parses is not tabular at all.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde_json::Value;
use thiserror::Error;

use crate::domain::Row;

#[derive(Debug, Error)]
pub enum RowsError {
    #[error("Failed to read table {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} is not a table: {reason}", .path.display())]
    NotTabular { path: PathBuf, reason: String },
}

/// A line or element that could not be read as a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    pub index: usize,
    pub reason: String,
}

/// Rows read from one table file
#[derive(Debug, Clone)]
pub struct RowSet {
    pub rows: Vec<Row>,
    pub rejected: Vec<RejectedRow>,
    /// blake3 digest of the raw file contents
    pub digest: blake3::Hash,
}

/// Reads a table file under a shared lock
pub struct TableReader {
    path: PathBuf,
}

impl TableReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<RowSet, RowsError> {
        let io_err = |source| RowsError::Io {
            path: self.path.clone(),
            source,
        };

        let mut file = File::open(&self.path).map_err(io_err)?;
        file.lock_shared().map_err(io_err)?;

        let mut content = String::new();
        file.read_to_string(&mut content).map_err(io_err)?;

        // Lock is released when file is dropped
        parse_rows(&content).map_err(|reason| RowsError::NotTabular {
            path: self.path.clone(),
            reason,
        })
    }
}

/// Parses JSONL or a JSON array into rows
pub fn parse_rows(content: &str) -> Result<RowSet, String> {
    let digest = blake3::hash(content.as_bytes());
    let trimmed = content.trim_start();

    let mut rows = Vec::new();
    let mut rejected = Vec::new();

    if trimmed.starts_with('[') {
        let values: Vec<Value> =
            serde_json::from_str(trimmed).map_err(|e| format!("invalid JSON array: {}", e))?;
        for (i, value) in values.into_iter().enumerate() {
            match value_to_row(i + 1, value) {
                Ok(row) => rows.push(row),
                Err(reason) => rejected.push(RejectedRow { index: i + 1, reason }),
            }
        }
    } else {
        for (line_num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let parsed = serde_json::from_str::<Value>(line)
                .map_err(|e| e.to_string())
                .and_then(|v| value_to_row(line_num + 1, v));
            match parsed {
                Ok(row) => rows.push(row),
                Err(reason) => rejected.push(RejectedRow {
                    index: line_num + 1,
                    reason,
                }),
            }
        }
    }

    if rows.is_empty() && !rejected.is_empty() {
        return Err(format!(
            "none of {} rows could be parsed (first error at row {}: {})",
            rejected.len(),
            rejected[0].index,
            rejected[0].reason
        ));
    }

    Ok(RowSet {
        rows,
        rejected,
        digest,
    })
}

fn value_to_row(index: usize, value: Value) -> Result<Row, String> {
    let Value::Object(map) = value else {
        return Err("expected a JSON object".to_string());
    };

    let mut row = Row::new(index);
    for (column, value) in map {
        row.insert(column, cell_text(value));
    }
    Ok(row)
}

/// Renders a JSON cell the way it would appear in the source sheet
fn cell_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                match n.as_f64() {
                    // Spreadsheet exports turn integer IDs into floats
                    Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
                        format!("{}", f as i64)
                    }
                    _ => n.to_string(),
                }
            }
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn parses_jsonl() {
        let content = r#"{"Object ID": "100", "Name": "HQ"}

{"Object ID": 200, "Name": "Sales", "Delimit date": null}
"#;
        let set = parse_rows(content).unwrap();

        assert_eq!(set.rows.len(), 2);
        assert!(set.rejected.is_empty());
        assert_eq!(set.rows[0].index, 1);
        assert_eq!(set.rows[1].index, 3);
        assert_eq!(set.rows[1].get("Object ID"), Some("200"));
        assert!(set.rows[1].has_column("Delimit date"));
        assert_eq!(set.rows[1].get("Delimit date"), None);
    }

    #[test]
    fn parses_json_array() {
        let content = r#"[{"Object ID": 51002422.0}, {"Object ID": "X", "Active": true}]"#;
        let set = parse_rows(content).unwrap();

        assert_eq!(set.rows.len(), 2);
        assert_eq!(set.rows[0].get("Object ID"), Some("51002422"));
        assert_eq!(set.rows[1].get("Active"), Some("true"));
    }

    #[test]
    fn bad_lines_are_rejected_individually() {
        let content = "{\"Object ID\": \"1\"}\nnot json\n[1, 2]\n";
        let set = parse_rows(content).unwrap();

        assert_eq!(set.rows.len(), 1);
        assert_eq!(set.rejected.len(), 2);
        assert_eq!(set.rejected[0].index, 2);
        assert_eq!(set.rejected[1].reason, "expected a JSON object");
    }

    #[test]
    fn nothing_parseable_is_not_tabular() {
        assert!(parse_rows("Object ID;Name\n1;HQ\n").is_err());
        assert!(parse_rows("[1, 2").is_err());
    }

    #[test]
    fn empty_file_is_an_empty_table() {
        let set = parse_rows("").unwrap();
        assert!(set.rows.is_empty());
        assert!(set.rejected.is_empty());
    }

    #[test]
    fn digest_tracks_content() {
        let a = parse_rows("{\"a\": 1}").unwrap();
        let b = parse_rows("{\"a\": 1}").unwrap();
        let c = parse_rows("{\"a\": 2}").unwrap();
        assert_eq!(a.digest, b.digest);
        assert_ne!(a.digest, c.digest);
    }

    #[test]
    fn reader_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let reader = TableReader::new(dir.path().join("missing.jsonl"));
        assert!(matches!(reader.read(), Err(RowsError::Io { .. })));
    }

    #[test]
    fn reader_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("units.jsonl");
        fs::write(&path, "{\"Object ID\": \"1\"}\n").unwrap();

        let set = TableReader::new(&path).read().unwrap();
        assert_eq!(set.rows.len(), 1);

        fs::write(&path, "garbage\n").unwrap();
        assert!(matches!(
            TableReader::new(&path).read(),
            Err(RowsError::NotTabular { .. })
        ));
    }
}
