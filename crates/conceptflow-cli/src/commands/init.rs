//! The `conceptflow init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("conceptflow.toml").exists() {
        println!("conceptflow.toml already exists, skipping.");
    } else {
        std::fs::write("conceptflow.toml", SAMPLE_CONFIG)?;
        println!("Created conceptflow.toml");
    }

    std::fs::create_dir_all("graphs")?;
    let example_path = std::path::Path::new("graphs/example.toml");
    if example_path.exists() {
        println!("graphs/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_GRAPH)?;
        println!("Created graphs/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit graphs/example.toml or add your own graph files");
    println!("  2. Run: conceptflow validate --graph graphs");
    println!("  3. Run: conceptflow replay --graph graphs --events events.toml");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# conceptflow configuration

# Self-weight of a node in a diffusion pass (0.0 - 1.0)
alpha = 0.3

# Per-hop decay of assessment propagation (0.0 - 1.0)
decay_factor = 0.3

# How many hops an assessment propagates
propagation_depth = 2

# Run one diffusion pass after every assessment
diffuse_after_assessment = false
"#;

const EXAMPLE_GRAPH: &str = r#"[graph]
id = "example"
name = "Example Graph"
description = "A small graph to get started"

[[nodes]]
id = "vectors"
label = "Vectors"
domain = "linear_algebra"
level = 1
difficulty = 1

[[nodes]]
id = "dot_product"
label = "Dot Product"
domain = "linear_algebra"
level = 2
difficulty = 2

[[nodes]]
id = "cosine_similarity"
label = "Cosine Similarity"
domain = "machine_learning"
level = 2
difficulty = 2

[[edges]]
source = "vectors"
target = "dot_product"
type = "prerequisite"
weight = 0.9

[[edges]]
source = "dot_product"
target = "cosine_similarity"
type = "prerequisite"
weight = 0.8
"#;
