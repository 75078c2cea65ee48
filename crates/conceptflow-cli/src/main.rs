//! conceptflow CLI: load concept graphs, replay assessment logs, inspect
//! the results.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "conceptflow", version, about = "Knowledge diffusion over concept graphs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a concept graph and report lint warnings
    Validate {
        /// Path to a graph .toml file or a directory of them
        #[arg(long)]
        graph: PathBuf,
    },

    /// Replay an assessment event log against a graph
    Replay {
        /// Path to a graph .toml file or a directory of them
        #[arg(long)]
        graph: PathBuf,

        /// Event log .toml
        #[arg(long)]
        events: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory to save the JSON report in
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Print the weighted adjacency and Laplacian of a graph
    Laplacian {
        /// Path to a graph .toml file or a directory of them
        #[arg(long)]
        graph: PathBuf,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create starter config and example graph
    Init,
}

fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("conceptflow=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { graph } => commands::validate::execute(graph),
        Commands::Replay {
            graph,
            events,
            config,
            output,
            format,
        } => commands::replay::execute(graph, events, config, output, format),
        Commands::Laplacian { graph, format } => commands::laplacian::execute(graph, format),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
