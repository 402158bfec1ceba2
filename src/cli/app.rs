//! Main CLI application structure

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::Level;

use super::output::{Output, OutputFormat};
use super::{query, report, watch};
use crate::domain::UnitId;
use crate::storage::{InputPaths, Project, Snapshot, SnapshotStore};

#[derive(Parser)]
#[command(name = "orgtree")]
#[command(author, version, about = "Rebuild and query organizational hierarchies from SAP HRP1000/HRP1001 extracts")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, else text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Units table (HRP1000), overrides input.units
    #[arg(long, global = true, value_name = "FILE")]
    pub units: Option<PathBuf>,

    /// Relationships table (HRP1001), overrides input.relationships
    #[arg(long, global = true, value_name = "FILE")]
    pub relationships: Option<PathBuf>,

    /// Evaluation date (YYYY-MM-DD); defaults to the latest date in the data
    #[arg(long, global = true, value_name = "DATE")]
    pub date: Option<NaiveDate>,

    /// Project config file instead of searching for orgtree.toml
    #[arg(long, short = 'c', global = true, value_name = "FILE", env = "ORGTREE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default orgtree.toml
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Build the hierarchy and summarize what happened
    Check,

    /// List cycles, parent conflicts and dangling relationships
    Anomalies,

    /// List rows the loader skipped or patched
    Warnings,

    /// Print the forest, or the subtree under one unit
    Tree {
        /// Start unit (defaults to every root)
        id: Option<UnitId>,

        /// Maximum depth below the start unit
        #[arg(long, short)]
        depth: Option<usize>,
    },

    /// Show one unit in detail
    Show { id: UnitId },

    /// Show the path from the root down to a unit
    Path { id: UnitId },

    /// List units sharing a parent with a unit
    Siblings { id: UnitId },

    /// Search units by ID or name
    Search {
        text: String,

        /// Maximum number of results (defaults to hierarchy.max_search_results)
        #[arg(long, short = 'n')]
        limit: Option<usize>,

        /// Only match whole words of unit names
        #[arg(long, short)]
        word: bool,
    },

    /// Print every unit down to a level (roots are level 0)
    Levels { max: usize },

    /// Connect two units through their lowest common ancestor
    Between { a: UnitId, b: UnitId },

    /// Print the subtree of a unit, keeping only branches that match a text
    Filter { id: UnitId, text: String },

    /// Show hierarchy statistics
    Stats,

    /// Rebuild whenever the input tables change
    Watch,
}

/// Everything a command needs to get at the current hierarchy
pub struct Session {
    pub project: Project,
    pub paths: InputPaths,
    pub date: Option<NaiveDate>,
    pub store: SnapshotStore,
}

impl Session {
    pub fn open(project: Project, cli: &Cli) -> Result<Self> {
        let paths = project.input_paths(cli.units.as_deref(), cli.relationships.as_deref())?;
        Ok(Self {
            project,
            paths,
            date: cli.date,
            store: SnapshotStore::new(),
        })
    }

    /// Current snapshot, rebuilt if an input changed since the last call
    pub fn snapshot(&self) -> Result<Arc<Snapshot>> {
        self.project
            .load_snapshot(&self.store, &self.paths, self.date)
    }

    pub fn level_names(&self) -> &[String] {
        &self.project.config().project.levels.names
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    // A second init (e.g. in tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Init { path } = &cli.command {
        let output = Output::new(cli.format.unwrap_or_default(), cli.verbose);
        output.verbose_ctx("init", &format!("Initializing project at: {}", path.display()));
        if Project::init(path)? {
            output.success(&format!("Initialized orgtree project at {}", path.display()));
        } else {
            output.success(&format!("orgtree.toml already exists in {}", path.display()));
        }
        return Ok(());
    }

    let project = Project::discover(cli.config.as_deref())?;
    let format = cli
        .format
        .unwrap_or(project.config().global.default_format);
    let output = Output::new(format, cli.verbose);

    output.verbose("orgtree starting");
    if let Some(root) = &project.config().project_root {
        output.verbose_ctx("config", &format!("Project root: {}", root.display()));
    }

    let session = Session::open(project, &cli)?;
    output.verbose_ctx(
        "input",
        &format!(
            "units: {}, relationships: {}",
            session.paths.units.display(),
            session.paths.relationships.display()
        ),
    );

    if let Commands::Watch = cli.command {
        return watch::run(&session, &output);
    }

    let snapshot = session.snapshot()?;
    output.verbose_ctx(
        "build",
        &format!(
            "Built {} units as of {}",
            snapshot.index.len(),
            snapshot.index.graph().evaluation_date()
        ),
    );
    let view = query::View::new(&snapshot.index, session.level_names(), &output);

    match cli.command {
        Commands::Init { .. } | Commands::Watch => {}

        Commands::Check => report::check(&output, &snapshot)?,
        Commands::Anomalies => report::anomalies(&output, &snapshot)?,
        Commands::Warnings => report::warnings(&output, &snapshot)?,
        Commands::Stats => report::stats(&output, &snapshot, session.level_names())?,

        Commands::Tree { id, depth } => {
            output.verbose_ctx("tree", &format!("start={:?}, depth={:?}", id, depth));
            query::tree(&view, id.as_ref(), depth)?
        }
        Commands::Show { id } => query::show(&view, &id)?,
        Commands::Path { id } => query::path(&view, &id)?,
        Commands::Siblings { id } => query::siblings(&view, &id)?,
        Commands::Search { text, limit, word } => {
            let limit =
                limit.unwrap_or(session.project.config().project.hierarchy.max_search_results);
            output.verbose_ctx("search", &format!("Searching for '{}' (limit {})", text, limit));
            query::search(&view, &text, limit, word)?
        }
        Commands::Levels { max } => query::levels(&view, max)?,
        Commands::Between { a, b } => query::between(&view, &a, &b)?,
        Commands::Filter { id, text } => query::filter(&view, &id, &text)?,
    }

    output.verbose("Command completed successfully");
    Ok(())
}
