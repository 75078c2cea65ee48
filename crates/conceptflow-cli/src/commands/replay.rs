//! The `conceptflow replay` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use conceptflow_core::config::load_config_from;
use conceptflow_core::report::{self, GraphSummary, ReplayReport};
use conceptflow_core::KnowledgeEngine;

pub fn execute(
    graph_path: PathBuf,
    events_path: PathBuf,
    config_path: Option<PathBuf>,
    output: Option<PathBuf>,
    format: String,
) -> Result<()> {
    anyhow::ensure!(
        matches!(format.as_str(), "text" | "json"),
        "unknown format '{format}', expected text or json"
    );

    let config = load_config_from(config_path.as_deref())?;
    let file = super::read_graph_file(&graph_path)?;
    let (id, name) = (file.id.clone(), file.name.clone());
    let graph = Arc::new(file.into_graph()?);
    let events = report::parse_event_log(&events_path)?;

    let summary = GraphSummary::new(id, name, &graph);
    let engine = KnowledgeEngine::new(graph, config)?;
    let report = report::replay(&engine, summary, &events)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    if let Some(dir) = output {
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
        let path = dir.join(format!("replay-{timestamp}.json"));
        report.save_json(&path)?;
        eprintln!("Report saved to: {}", path.display());
    }

    Ok(())
}

fn print_summary(report: &ReplayReport) {
    use comfy_table::{Cell, Table};

    println!(
        "Replayed {} event(s) on {}: {} applied, {} rejected, {} propagated update(s)",
        report.events_applied + report.events_rejected,
        report.graph.name,
        report.events_applied,
        report.events_rejected,
        report.propagated_total
    );
    for r in &report.rejections {
        println!("  event {}: {}", r.index, r.reason);
    }

    let mut table = Table::new();
    table.set_header(vec!["Rank", "User", "Known", "Partial", "Avg Level"]);

    for (rank, entry) in report.leaderboard.iter().enumerate() {
        let partial = report
            .users
            .get(&entry.user_id)
            .map_or(0, |stats| stats.overall.partial);
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(&entry.user_id),
            Cell::new(entry.known_count),
            Cell::new(partial),
            Cell::new(format!("{:.1}%", entry.avg_level_score * 100.0)),
        ]);
    }

    println!("\n{table}");
}
