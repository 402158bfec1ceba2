//! Configuration handling for orgtree
//!
//! Configuration is stored in `orgtree.toml` (project, found by walking up
//! from the current directory) and `~/.config/orgtree/config.toml` (global).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    default_date_formats, BuildOptions, EdgeDirection, LoaderOptions, RelationFilter,
    RelationType, RelationshipColumns, SiblingOrder, UnitColumns,
};

/// File name of the project configuration
pub const CONFIG_FILE: &str = "orgtree.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Where the input tables live and how to read their dates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Units table (HRP1000), relative to the config file
    pub units: Option<PathBuf>,

    /// Relationships table (HRP1001), relative to the config file
    pub relationships: Option<PathBuf>,

    /// `chrono` format strings tried in order
    pub date_formats: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            units: None,
            relationships: None,
            date_formats: default_date_formats(),
        }
    }
}

/// How the hierarchy is resolved and queried
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Fixed evaluation date; defaults to the latest date in the data
    pub evaluation_date: Option<NaiveDate>,

    /// Accepted planning statuses; empty accepts all
    pub planning_statuses: Vec<String>,

    pub sibling_order: SiblingOrder,

    pub max_search_results: usize,

    /// Relationship codes that form the hierarchy
    pub relation_types: Vec<RelationType>,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            evaluation_date: None,
            planning_statuses: vec!["1".to_string()],
            sibling_order: SiblingOrder::Id,
            max_search_results: 50,
            relation_types: vec![
                RelationType {
                    code: "A002".to_string(),
                    direction: EdgeDirection::TargetIsParent,
                },
                RelationType {
                    code: "B002".to_string(),
                    direction: EdgeDirection::SourceIsParent,
                },
            ],
        }
    }
}

/// Column headers of both tables
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ColumnsConfig {
    pub units: UnitColumns,
    pub relationships: RelationshipColumns,
}

/// Display names for hierarchy levels, root level first
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelsConfig {
    pub names: Vec<String>,
}

impl Default for LevelsConfig {
    fn default() -> Self {
        let names = [
            "Level1_LegalEntity",
            "Level2_BusinessUnit",
            "Level3_Division",
            "Level4_SubDivision",
            "Level5_Department",
            "Level6_SubDepartment",
            "Level7_Team",
        ];
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }
}

/// Settings for `orgtree watch`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds before rebuilding
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 500 }
    }
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProjectConfig {
    pub input: InputConfig,
    pub hierarchy: HierarchyConfig,
    pub columns: ColumnsConfig,
    pub levels: LevelsConfig,
    pub watch: WatchConfig,
}

impl ProjectConfig {
    /// Checks values serde cannot check on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.date_formats.is_empty() {
            return Err(ConfigError::Invalid(
                "input.date_formats must list at least one format".to_string(),
            ));
        }
        if self.hierarchy.relation_types.is_empty() {
            return Err(ConfigError::Invalid(
                "hierarchy.relation_types must list at least one code".to_string(),
            ));
        }
        if self.hierarchy.max_search_results == 0 {
            return Err(ConfigError::Invalid(
                "hierarchy.max_search_results must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            units: self.columns.units.clone(),
            relationships: self.columns.relationships.clone(),
            date_formats: self.input.date_formats.clone(),
        }
    }

    pub fn build_options(&self, evaluation_date: NaiveDate) -> BuildOptions {
        BuildOptions {
            evaluation_date,
            relation_types: RelationFilter::from_types(&self.hierarchy.relation_types),
            planning_statuses: self.hierarchy.planning_statuses.clone(),
            sibling_order: self.hierarchy.sibling_order,
        }
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    /// Directory relative input paths are resolved against
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from default locations
    pub fn load() -> Result<Self> {
        let global = Self::load_global()?;
        match Self::find_project_root() {
            Some(root) => {
                let project = Self::load_project_config(&root.join(CONFIG_FILE))?;
                Ok(Self {
                    project,
                    global,
                    project_root: Some(root),
                })
            }
            None => Ok(Self {
                project: ProjectConfig::default(),
                global,
                project_root: None,
            }),
        }
    }

    /// Loads configuration from an explicit project config file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let global = Self::load_global()?;
        let project = Self::load_project_config(path)?;

        Ok(Self {
            project,
            global,
            project_root: path.parent().map(Path::to_path_buf),
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "orgtree", "orgtree").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Loads and validates project configuration from a file
    fn load_project_config(config_path: &Path) -> Result<ProjectConfig> {
        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read project config: {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse project config")?;

        config
            .validate()
            .with_context(|| format!("Invalid project config: {}", config_path.display()))?;

        Ok(config)
    }

    /// Finds the project root by looking for `orgtree.toml`
    pub fn find_project_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::find_project_root_from(current)
    }

    pub fn find_project_root_from(mut current: PathBuf) -> Option<PathBuf> {
        loop {
            if current.join(CONFIG_FILE).is_file() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Returns true if a project config was found
    pub fn is_in_project(&self) -> bool {
        self.project_root.is_some()
    }

    /// Resolves a configured path against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.project_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = ProjectConfig::default();

        assert_eq!(config.hierarchy.max_search_results, 50);
        assert_eq!(config.hierarchy.planning_statuses, vec!["1"]);
        assert_eq!(config.columns.units.id, "Object ID");
        assert_eq!(config.levels.names[0], "Level1_LegalEntity");
        assert!(config.validate().is_ok());

        let filter = RelationFilter::from_types(&config.hierarchy.relation_types);
        assert_eq!(filter, RelationFilter::default());
    }

    #[test]
    fn parse_project_config() {
        let toml = r#"
[input]
units = "hrp1000.jsonl"
date_formats = ["%Y-%m-%d"]

[hierarchy]
evaluation_date = "2024-03-01"
planning_statuses = []
sibling_order = "name"
max_search_results = 5

[[hierarchy.relation_types]]
code = "A003"
direction = "target_is_parent"

[columns.units]
id = "OBJID"
"#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.input.units, Some(PathBuf::from("hrp1000.jsonl")));
        assert_eq!(config.input.relationships, None);
        assert_eq!(
            config.hierarchy.evaluation_date,
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert!(config.hierarchy.planning_statuses.is_empty());
        assert_eq!(config.hierarchy.sibling_order, SiblingOrder::Name);
        assert_eq!(config.hierarchy.relation_types.len(), 1);
        assert_eq!(config.columns.units.id, "OBJID");
        assert_eq!(config.columns.units.name, "Name");

        let options = config.build_options(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(
            options.relation_types.direction("A003"),
            Some(EdgeDirection::TargetIsParent)
        );
        assert_eq!(config.loader_options().date_formats, vec!["%Y-%m-%d"]);
    }

    #[test]
    fn validation_rejects_empty_lists() {
        let mut config = ProjectConfig::default();
        config.hierarchy.relation_types.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ProjectConfig::default();
        config.input.date_formats.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_global_config() {
        let config: GlobalConfig = toml::from_str("default_format = \"json\"").unwrap();
        assert_eq!(config.default_format, OutputFormat::Json);
    }

    #[test]
    fn find_project_root_walks_up() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "").unwrap();

        let sub_dir = dir.path().join("sub").join("dir");
        fs::create_dir_all(&sub_dir).unwrap();

        let root = Config::find_project_root_from(sub_dir);
        assert_eq!(root.as_deref(), Some(dir.path()));
    }

    #[test]
    fn from_file_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[input]\nunits = \"units.jsonl\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(config.is_in_project());

        let units = config.project.input.units.clone().unwrap();
        assert_eq!(config.resolve(&units), dir.path().join("units.jsonl"));
        assert_eq!(
            config.resolve(Path::new("/abs/rel.jsonl")),
            PathBuf::from("/abs/rel.jsonl")
        );
    }

    #[test]
    fn from_file_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[hierarchy]\nmax_search_results = 0\n").unwrap();

        assert!(Config::from_file(&path).is_err());
        assert!(Config::from_file(&dir.path().join("nope.toml")).is_err());
    }
}
