//! Project management
//!
//! Ties configuration, table files and the build pipeline together:
//! read both tables, load records, pick the evaluation date, build and index.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use thiserror::Error;
use tracing::debug;

use super::config::{Config, CONFIG_FILE};
use super::rows::{RowSet, TableReader};
use super::snapshot::{Snapshot, SnapshotKey, SnapshotStore};
use crate::domain::{
    load, HierarchyBuilder, HierarchyIndex, LoadWarning, TableKind, WarningKind,
};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("No {0} table given. Pass --{0} or set input.{0} in orgtree.toml.")]
    MissingInput(TableKind),

    #[error("Failed to create project: {0}")]
    CreateFailed(String),
}

const DEFAULT_CONFIG: &str = r#"# orgtree configuration

[input]
# units = "hrp1000.jsonl"
# relationships = "hrp1001.jsonl"
date_formats = ["%d.%m.%Y", "%Y-%m-%d", "%Y%m%d"]

[hierarchy]
# Defaults to the latest start date found in the data
# evaluation_date = "2024-01-01"

# Empty list accepts every status
planning_statuses = ["1"]

# id | name | short_text
sibling_order = "id"
max_search_results = 50

[[hierarchy.relation_types]]
code = "A002"
direction = "target_is_parent"

[[hierarchy.relation_types]]
code = "B002"
direction = "source_is_parent"

[columns.units]
id = "Object ID"
name = "Name"
short_text = "Object abbr."
long_text = "Long text"
start = "Start date"
end = "End Date"
planning_status = "Planning status"
object_type = "Object type"

[columns.relationships]
source = "Source ID"
target = "Target object ID"
code = "Subtype"
direction = "Relationship"
kind = "Relnship"
start = "Start date"
end = "End Date"
planning_status = "Planning status"

[levels]
names = [
    "Level1_LegalEntity",
    "Level2_BusinessUnit",
    "Level3_Division",
    "Level4_SubDivision",
    "Level5_Department",
    "Level6_SubDepartment",
    "Level7_Team",
]

[watch]
debounce_ms = 500
"#;

/// Resolved locations of both input tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPaths {
    pub units: PathBuf,
    pub relationships: PathBuf,
}

impl InputPaths {
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        [self.units.as_path(), self.relationships.as_path()].into_iter()
    }
}

/// Both tables read from disk, before loading
pub struct Tables {
    pub units: RowSet,
    pub relationships: RowSet,
}

/// An orgtree project: configuration plus the build pipeline
pub struct Project {
    config: Config,
}

impl Project {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Uses the given config file, or searches upward for `orgtree.toml`
    pub fn discover(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => Config::from_file(path)?,
            None => Config::load()?,
        };
        if let Some(root) = &config.project_root {
            debug!(root = %root.display(), "using project config");
        }
        Ok(Self::new(config))
    }

    /// Writes a default `orgtree.toml` into `root`; returns false if one exists
    pub fn init(root: &Path) -> Result<bool> {
        fs::create_dir_all(root)
            .map_err(|e| ProjectError::CreateFailed(e.to_string()))
            .with_context(|| format!("Failed to create directory: {}", root.display()))?;

        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            return Ok(false);
        }

        fs::write(&config_path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        Ok(true)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Command-line paths win over the configured ones
    pub fn input_paths(
        &self,
        units: Option<&Path>,
        relationships: Option<&Path>,
    ) -> Result<InputPaths, ProjectError> {
        let input = &self.config.project.input;
        let pick = |flag: Option<&Path>, configured: &Option<PathBuf>, table| match flag {
            Some(path) => Ok(path.to_path_buf()),
            None => configured
                .as_deref()
                .map(|path| self.config.resolve(path))
                .ok_or(ProjectError::MissingInput(table)),
        };

        Ok(InputPaths {
            units: pick(units, &input.units, TableKind::Units)?,
            relationships: pick(relationships, &input.relationships, TableKind::Relationships)?,
        })
    }

    pub fn read_tables(&self, paths: &InputPaths) -> Result<Tables> {
        let units = TableReader::new(&paths.units).read()?;
        let relationships = TableReader::new(&paths.relationships).read()?;
        debug!(
            units = units.rows.len(),
            relationships = relationships.rows.len(),
            "read input tables"
        );
        Ok(Tables {
            units,
            relationships,
        })
    }

    /// Requested date from the command line, else the configured one
    pub fn requested_date(&self, flag: Option<NaiveDate>) -> Option<NaiveDate> {
        flag.or(self.config.project.hierarchy.evaluation_date)
    }

    pub fn snapshot_key(&self, tables: &Tables, date: Option<NaiveDate>) -> SnapshotKey {
        SnapshotKey::new(
            &tables.units.digest,
            &tables.relationships.digest,
            self.requested_date(date),
            &self.config.project,
        )
    }

    /// Loads, builds and indexes one hierarchy
    pub fn build_snapshot(&self, tables: &Tables, date: Option<NaiveDate>) -> Result<Snapshot> {
        let project = &self.config.project;
        let records = load(
            &tables.units.rows,
            &tables.relationships.rows,
            &project.loader_options(),
        )
        .context("Failed to load records")?;

        let evaluation_date = self
            .requested_date(date)
            .or_else(|| records.latest_date())
            .unwrap_or_else(|| Local::now().date_naive());
        debug!(%evaluation_date, "evaluating hierarchy");

        let graph = HierarchyBuilder::new(project.build_options(evaluation_date))
            .build(&records.units, &records.relationships);

        let mut warnings = rejected_warnings(tables);
        warnings.extend(records.warnings);

        Ok(Snapshot::new(
            self.snapshot_key(tables, date),
            HierarchyIndex::new(graph),
            warnings,
        ))
    }

    /// Reads the tables and returns the store's snapshot, rebuilding only on change
    pub fn load_snapshot(
        &self,
        store: &SnapshotStore,
        paths: &InputPaths,
        date: Option<NaiveDate>,
    ) -> Result<Arc<Snapshot>> {
        let tables = self.read_tables(paths)?;
        let key = self.snapshot_key(&tables, date);
        store.get_or_build(key, || self.build_snapshot(&tables, date))
    }
}

/// Rows the reader could not parse, as loader warnings
fn rejected_warnings(tables: &Tables) -> Vec<LoadWarning> {
    let tagged = [
        (TableKind::Units, &tables.units),
        (TableKind::Relationships, &tables.relationships),
    ];
    tagged
        .into_iter()
        .flat_map(|(table, set)| {
            set.rejected.iter().map(move |r| {
                LoadWarning::new(
                    table,
                    r.index,
                    WarningKind::MalformedRow {
                        reason: r.reason.clone(),
                    },
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UnitId;
    use tempfile::TempDir;

    fn write_tables(dir: &Path) -> InputPaths {
        let units = dir.join("units.jsonl");
        let relationships = dir.join("rels.jsonl");
        fs::write(
            &units,
            r#"{"Object ID": "A", "Name": "Alpha", "Start date": "01.01.2020", "End Date": "31.12.9999"}
{"Object ID": "B", "Name": "Beta", "Start date": "01.03.2023", "End Date": "31.12.9999"}
not a row
"#,
        )
        .unwrap();
        fs::write(
            &relationships,
            r#"{"Source ID": "B", "Target object ID": "A", "Subtype": "A002"}
"#,
        )
        .unwrap();
        InputPaths {
            units,
            relationships,
        }
    }

    fn id(s: &str) -> UnitId {
        UnitId::new(s).unwrap()
    }

    #[test]
    fn init_writes_loadable_config() {
        let dir = TempDir::new().unwrap();

        assert!(Project::init(dir.path()).unwrap());
        assert!(!Project::init(dir.path()).unwrap());

        let project = Project::discover(Some(&dir.path().join(CONFIG_FILE))).unwrap();
        let config = &project.config().project;
        assert_eq!(config.hierarchy.relation_types.len(), 2);
        assert_eq!(config.levels.names.len(), 7);
        assert_eq!(config.columns.relationships.kind, "Relnship");
    }

    #[test]
    fn flags_override_configured_inputs() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join(CONFIG_FILE);
        fs::write(
            &config_path,
            "[input]\nunits = \"u.jsonl\"\nrelationships = \"r.jsonl\"\n",
        )
        .unwrap();
        let project = Project::discover(Some(&config_path)).unwrap();

        let paths = project.input_paths(None, None).unwrap();
        assert_eq!(paths.units, dir.path().join("u.jsonl"));
        assert_eq!(paths.relationships, dir.path().join("r.jsonl"));

        let paths = project
            .input_paths(Some(Path::new("/tmp/other.jsonl")), None)
            .unwrap();
        assert_eq!(paths.units, PathBuf::from("/tmp/other.jsonl"));
        assert_eq!(paths.iter().count(), 2);
    }

    #[test]
    fn missing_input_is_reported() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join(CONFIG_FILE);
        fs::write(&config_path, "").unwrap();
        let project = Project::discover(Some(&config_path)).unwrap();

        assert!(matches!(
            project.input_paths(None, None),
            Err(ProjectError::MissingInput(TableKind::Units))
        ));
    }

    #[test]
    fn builds_snapshot_from_files() {
        let dir = TempDir::new().unwrap();
        let paths = write_tables(dir.path());
        let project = Project::new(Config {
            project: Default::default(),
            global: Default::default(),
            project_root: None,
        });

        let tables = project.read_tables(&paths).unwrap();
        let snapshot = project.build_snapshot(&tables, None).unwrap();

        // Latest start date in the data
        assert_eq!(
            snapshot.index.graph().evaluation_date(),
            NaiveDate::from_ymd_opt(2023, 3, 1).unwrap()
        );
        assert_eq!(snapshot.index.depth(&id("B")).unwrap(), 1);
        assert_eq!(snapshot.warnings.len(), 1);
        assert!(matches!(
            snapshot.warnings[0].kind,
            WarningKind::MalformedRow { .. }
        ));

        // Before B existed
        let early = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let snapshot = project.build_snapshot(&tables, Some(early)).unwrap();
        assert!(!snapshot.index.contains(&id("B")));
    }

    #[test]
    fn load_snapshot_reuses_unchanged_build() {
        let dir = TempDir::new().unwrap();
        let paths = write_tables(dir.path());
        let project = Project::new(Config {
            project: Default::default(),
            global: Default::default(),
            project_root: None,
        });
        let store = SnapshotStore::new();

        let first = project.load_snapshot(&store, &paths, None).unwrap();
        let second = project.load_snapshot(&store, &paths, None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        fs::write(
            &paths.relationships,
            "{\"Source ID\": \"A\", \"Target object ID\": \"B\", \"Subtype\": \"A002\"}\n",
        )
        .unwrap();
        let third = project.load_snapshot(&store, &paths, None).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.index.depth(&id("A")).unwrap(), 1);
    }
}
