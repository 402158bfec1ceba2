//! Watch mode
//!
//! Watches both input tables and rebuilds the hierarchy when either changes.
//! Each rebuild is swapped into the session's snapshot store; an unchanged
//! fingerprint reuses the current snapshot.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::Result;
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::new_debouncer;

use super::app::Session;
use super::output::Output;
use crate::storage::{InputPaths, Snapshot};

pub fn run(session: &Session, output: &Output) -> Result<()> {
    let debounce_ms = session.project.config().project.watch.debounce_ms;
    let mut current = rebuild(session, output, None);

    let (tx, rx) = mpsc::channel();
    let mut debouncer = new_debouncer(Duration::from_millis(debounce_ms), tx)?;

    for dir in watch_dirs(&session.paths) {
        output.verbose_ctx("watch", &format!("Watching directory: {}", dir.display()));
        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)?;
    }

    if output.is_text() {
        println!(
            "Watching {} and {} (debounce: {}ms, Ctrl-C to stop)",
            session.paths.units.display(),
            session.paths.relationships.display(),
            debounce_ms
        );
    }

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let relevant = events
                    .iter()
                    .filter(|e| is_input(&session.paths, &e.path))
                    .count();
                if relevant == 0 {
                    continue;
                }

                output.verbose_ctx("watch", &format!("Detected {} change(s)", relevant));
                current = rebuild(session, output, current);
            }
            Ok(Err(error)) => {
                output.error(&format!("Watch error: {:?}", error));
            }
            Err(e) => {
                output.error(&format!("Channel error: {}", e));
                break;
            }
        }
    }

    Ok(())
}

/// Rebuilds and reports; a failed rebuild keeps the previous snapshot
fn rebuild(
    session: &Session,
    output: &Output,
    previous: Option<Arc<Snapshot>>,
) -> Option<Arc<Snapshot>> {
    match session.snapshot() {
        Ok(snapshot) => {
            let unchanged = previous
                .as_ref()
                .is_some_and(|p| Arc::ptr_eq(p, &snapshot));
            if unchanged {
                output.verbose_ctx("watch", "Inputs unchanged, snapshot kept");
            } else {
                report(output, &snapshot);
            }
            Some(snapshot)
        }
        Err(e) => {
            output.error(&format!("Rebuild failed: {:#}", e));
            previous
        }
    }
}

fn report(output: &Output, snapshot: &Snapshot) {
    let graph = snapshot.index.graph();
    let anomalies = graph.anomalies();
    if output.is_json() {
        output.data(&serde_json::json!({
            "built_at": snapshot.built_at,
            "evaluation_date": graph.evaluation_date(),
            "units": graph.len(),
            "roots": graph.roots().len(),
            "warnings": snapshot.warnings.len(),
            "anomalies": anomalies.total(),
        }));
    } else {
        println!(
            "[{}] {} units, {} roots as of {} ({} warnings, {} anomalies)",
            snapshot.built_at.format("%H:%M:%S"),
            graph.len(),
            graph.roots().len(),
            graph.evaluation_date(),
            snapshot.warnings.len(),
            anomalies.total()
        );
    }
}

/// Directories holding the input files, without repeats
fn watch_dirs(paths: &InputPaths) -> BTreeSet<PathBuf> {
    paths
        .iter()
        .map(|path| match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        })
        .collect()
}

/// Returns true if an event path refers to one of the input files
fn is_input(paths: &InputPaths, event: &Path) -> bool {
    paths.iter().any(|input| {
        event == input
            || match (event.canonicalize(), input.canonicalize()) {
                (Ok(a), Ok(b)) => a == b,
                _ => event.file_name().is_some() && event.file_name() == input.file_name(),
            }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn paths(units: &str, relationships: &str) -> InputPaths {
        InputPaths {
            units: PathBuf::from(units),
            relationships: PathBuf::from(relationships),
        }
    }

    #[test]
    fn watch_dirs_are_deduplicated() {
        let dirs = watch_dirs(&paths("/data/u.jsonl", "/data/r.jsonl"));
        assert_eq!(dirs.len(), 1);
        assert!(dirs.contains(Path::new("/data")));

        let dirs = watch_dirs(&paths("u.jsonl", "/other/r.jsonl"));
        assert!(dirs.contains(Path::new(".")));
        assert!(dirs.contains(Path::new("/other")));
    }

    #[test]
    fn only_input_files_are_relevant() {
        let dir = TempDir::new().unwrap();
        let units = dir.path().join("u.jsonl");
        let rels = dir.path().join("r.jsonl");
        let other = dir.path().join("notes.txt");
        for p in [&units, &rels, &other] {
            fs::write(p, "").unwrap();
        }
        let inputs = InputPaths {
            units: units.clone(),
            relationships: rels.clone(),
        };

        assert!(is_input(&inputs, &units));
        assert!(is_input(&inputs, &rels));
        assert!(!is_input(&inputs, &other));
        assert!(!is_input(&inputs, dir.path()));
    }
}
