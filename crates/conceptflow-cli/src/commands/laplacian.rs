//! The `conceptflow laplacian` command.

use std::path::PathBuf;

use anyhow::Result;

use conceptflow_core::diffusion::compute_laplacian;

pub fn execute(graph_path: PathBuf, format: String) -> Result<()> {
    let graph = super::read_graph_file(&graph_path)?.into_graph()?;
    let lap = compute_laplacian(graph.nodes(), graph.edges());

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&lap)?);
        }
        "text" => {
            use comfy_table::{Cell, Table};

            let mut table = Table::new();
            let mut header = vec![Cell::new("L"), Cell::new("deg")];
            header.extend(lap.node_ids.iter().map(Cell::new));
            table.set_header(header);

            for (i, id) in lap.node_ids.iter().enumerate() {
                let mut row = vec![Cell::new(id), Cell::new(format!("{:.2}", lap.degree[i]))];
                row.extend(lap.laplacian[i].iter().map(|v| Cell::new(format!("{v:.2}"))));
                table.add_row(row);
            }

            println!("{table}");
        }
        other => anyhow::bail!("unknown format '{other}', expected text or json"),
    }

    Ok(())
}
