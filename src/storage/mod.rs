//! # Storage Layer
//!
//! Everything that touches the filesystem: table files, configuration and the
//! pipeline that turns them into a shareable hierarchy snapshot.
//!
//! ## Files
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Units (HRP1000) | JSONL or JSON array | `input.units` or `--units` |
//! | Relationships (HRP1001) | JSONL or JSON array | `input.relationships` or `--relationships` |
//! | Project config | TOML | `orgtree.toml` (searched upward) |
//! | Global config | TOML | `~/.config/orgtree/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - [`TableReader`] takes a shared `fs2` lock while reading
//! - [`SnapshotStore`] swaps whole snapshots; readers keep their `Arc`
//!
//! ## Key Types
//!
//! - [`Project`] - Entry point: config plus the build pipeline
//! - [`SnapshotStore`] - Current hierarchy, replaced wholesale on rebuild
//! - [`Config`] - Project and global configuration

mod config;
mod project;
mod rows;
mod snapshot;

pub use config::{
    ColumnsConfig, Config, ConfigError, GlobalConfig, HierarchyConfig, InputConfig, LevelsConfig,
    OutputFormat, ProjectConfig, WatchConfig, CONFIG_FILE,
};
pub use project::{InputPaths, Project, ProjectError, Tables};
pub use rows::{parse_rows, RejectedRow, RowSet, RowsError, TableReader};
pub use snapshot::{Snapshot, SnapshotKey, SnapshotStore};
