//! # Command-Line Interface
//!
//! User-facing commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project setup | `init` |
//! | Reports | Inspect a build | `check`, `anomalies`, `warnings`, `stats` |
//! | Queries | Navigate the hierarchy | `tree`, `show`, `path`, `siblings`, `search` |
//! | Use cases | Views built on queries | `levels`, `between`, `filter` |
//! | Live | Rebuild on change | `watch` |
//!
//! ## Inputs
//!
//! Every command except `init` reads the units and relationships tables,
//! given by `--units`/`--relationships` or `[input]` in `orgtree.toml`.
//! `--date` fixes the evaluation date; otherwise the latest date in the data
//! is used.
//!
//! ## Output Formats
//!
//! All commands support the `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output and pipeline logging:
//! ```bash
//! orgtree --verbose check
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod query;
mod report;
mod watch;

pub use app::{run, Cli, Commands, Session};
pub use output::{Output, OutputFormat};
