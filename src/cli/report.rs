//! Build reports (check, anomalies, warnings, stats)

use anyhow::Result;

use super::output::Output;
use crate::domain::{level_label, HierarchyStats, MissingEndpoint};
use crate::storage::Snapshot;

/// Summarize one build
pub fn check(output: &Output, snapshot: &Snapshot) -> Result<()> {
    let graph = snapshot.index.graph();
    let summary = graph.summary();
    let anomalies = graph.anomalies();

    if output.is_json() {
        output.data(&serde_json::json!({
            "evaluation_date": graph.evaluation_date(),
            "summary": summary,
            "roots": graph.roots().len(),
            "warnings": snapshot.warnings.len(),
            "anomalies": anomalies.total(),
            "cycles": anomalies.cycles.len(),
            "conflicts": anomalies.conflicts.len(),
            "dangling": anomalies.dangling.len(),
            "duplicate_edges": anomalies.duplicate_edges,
        }));
        return Ok(());
    }

    output.field("Evaluation date", graph.evaluation_date());
    output.field(
        "Units",
        format!(
            "{} loaded, {} active",
            summary.units_loaded, summary.units_active
        ),
    );
    output.field(
        "Relationships",
        format!(
            "{} loaded, {} active",
            summary.relationships_loaded, summary.relationships_active
        ),
    );
    output.field("Edges assigned", summary.edges_assigned);
    output.field("Roots", graph.roots().len());
    output.field("Warnings", snapshot.warnings.len());
    output.field(
        "Anomalies",
        format!(
            "{} ({} cycles, {} conflicts, {} dangling)",
            anomalies.total(),
            anomalies.cycles.len(),
            anomalies.conflicts.len(),
            anomalies.dangling.len()
        ),
    );
    Ok(())
}

pub fn anomalies(output: &Output, snapshot: &Snapshot) -> Result<()> {
    let report = snapshot.index.graph().anomalies();

    if output.is_json() {
        output.data(report);
        return Ok(());
    }

    if report.is_clean() {
        println!("No anomalies.");
        return Ok(());
    }

    if !report.cycles.is_empty() {
        println!("Cycles ({}):", report.cycles.len());
        for cycle in &report.cycles {
            println!("  {}", cycle);
        }
        output.blank();
    }

    if !report.conflicts.is_empty() {
        println!("Parent conflicts ({}):", report.conflicts.len());
        for conflict in &report.conflicts {
            let losing: Vec<_> = conflict.losing.iter().map(|u| u.as_str()).collect();
            println!(
                "  {}: kept {}, dropped {} ({})",
                conflict.unit,
                conflict.chosen,
                losing.join(", "),
                conflict.reason
            );
        }
        output.blank();
    }

    if !report.dangling.is_empty() {
        println!("Dangling relationships ({}):", report.dangling.len());
        for edge in &report.dangling {
            let rel = &edge.relationship;
            let missing = match edge.missing {
                MissingEndpoint::Source => "source",
                MissingEndpoint::Target => "target",
                MissingEndpoint::Both => "source and target",
            };
            println!(
                "  row {}: {} {} -> {} (missing {})",
                rel.row, rel.code, rel.source, rel.target, missing
            );
        }
        output.blank();
    }

    if report.duplicate_edges > 0 {
        println!("Duplicate edges ignored: {}", report.duplicate_edges);
    }
    Ok(())
}

pub fn warnings(output: &Output, snapshot: &Snapshot) -> Result<()> {
    if output.is_json() {
        output.data(&snapshot.warnings);
    } else if snapshot.warnings.is_empty() {
        println!("No warnings.");
    } else {
        for warning in &snapshot.warnings {
            println!("{}", warning);
        }
        output.blank();
        println!("{} warning(s)", snapshot.warnings.len());
    }
    Ok(())
}

pub fn stats(output: &Output, snapshot: &Snapshot, level_names: &[String]) -> Result<()> {
    let stats = HierarchyStats::compute(snapshot.index.graph());

    if output.is_json() {
        let levels: Vec<_> = stats
            .levels
            .iter()
            .map(|(depth, count)| {
                serde_json::json!({
                    "depth": depth,
                    "label": level_label(level_names, *depth),
                    "units": count,
                })
            })
            .collect();
        output.data(&serde_json::json!({
            "stats": stats,
            "levels": levels,
        }));
        return Ok(());
    }

    output.field("Units", stats.units);
    output.field("Inactive units", stats.inactive_units);
    output.field("Relationships", stats.relationships);
    output.field("Roots", stats.roots);
    output.field("Leaves", stats.leaves);
    output.field("Max depth", stats.max_depth);
    output.field("Avg children", format!("{:.2}", stats.avg_children));
    output.field(
        "Anomalies",
        format!(
            "{} cycles, {} conflicts, {} dangling, {} duplicate edges",
            stats.cycles, stats.conflicts, stats.dangling, stats.duplicate_edges
        ),
    );
    output.blank();
    output.header(&format!("{:<6} {:<24} UNITS", "DEPTH", "LEVEL"), 40);
    for (depth, count) in &stats.levels {
        println!("{:<6} {:<24} {}", depth, level_label(level_names, *depth), count);
    }

    output.blank();
    output.header(&format!("{:<31} UNITS", "OBJECT TYPE"), 40);
    for (kind, count) in &stats.type_breakdown {
        println!("{:<31} {}", kind, count);
    }

    if !stats.start_years.is_empty() {
        output.blank();
        output.header(&format!("{:<31} UNITS", "START YEAR"), 40);
        for (year, count) in &stats.start_years {
            println!("{:<31} {}", year, count);
        }
    }
    Ok(())
}
