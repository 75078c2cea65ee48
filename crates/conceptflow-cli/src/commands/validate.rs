//! The `conceptflow validate` command.

use std::path::PathBuf;

use anyhow::Result;

use conceptflow_core::parser::validate_graph_file;

pub fn execute(graph_path: PathBuf) -> Result<()> {
    let file = super::read_graph_file(&graph_path)?;
    let warnings = validate_graph_file(&file);
    let name = file.name.clone();
    let graph = file.into_graph()?;

    println!(
        "Graph: {} ({} nodes, {} edges, {} domains)",
        name,
        graph.len(),
        graph.edges().len(),
        graph.domains().len()
    );

    for w in &warnings {
        let prefix = w
            .node_id
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("Graph valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
