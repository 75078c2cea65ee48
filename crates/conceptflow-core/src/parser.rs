//! TOML concept graph parser.
//!
//! Loads graph files and directories of graph files, and lints them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::graph::ConceptGraph;
use crate::model::{ConceptEdge, ConceptNode, EdgeType, NodeType};

/// A parsed graph file, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphFile {
    pub id: String,
    pub name: String,
    pub description: String,
    pub nodes: Vec<ConceptNode>,
    pub edges: Vec<ConceptEdge>,
}

impl GraphFile {
    /// Validate and index the file's contents.
    pub fn into_graph(self) -> Result<ConceptGraph> {
        let id = self.id;
        ConceptGraph::load(self.nodes, self.edges)
            .with_context(|| format!("invalid concept graph '{id}'"))
    }
}

/// Intermediate TOML structure for graph files.
#[derive(Debug, Deserialize)]
struct TomlGraphFile {
    graph: TomlGraphHeader,
    #[serde(default)]
    nodes: Vec<TomlNode>,
    #[serde(default)]
    edges: Vec<TomlEdge>,
}

#[derive(Debug, Deserialize)]
struct TomlGraphHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlNode {
    id: String,
    #[serde(default)]
    label: String,
    domain: String,
    #[serde(default)]
    level: u32,
    #[serde(default = "default_difficulty")]
    difficulty: u8,
    #[serde(rename = "type", default)]
    node_type: Option<String>,
}

fn default_difficulty() -> u8 {
    1
}

#[derive(Debug, Deserialize)]
struct TomlEdge {
    source: String,
    target: String,
    #[serde(rename = "type")]
    edge_type: String,
    #[serde(default = "default_weight")]
    weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Parse a single TOML graph file.
pub fn parse_graph_file(path: &Path) -> Result<GraphFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read graph file: {}", path.display()))?;

    parse_graph_str(&content, path)
}

/// Parse a TOML string into a [`GraphFile`] (useful for testing).
pub fn parse_graph_str(content: &str, source_path: &Path) -> Result<GraphFile> {
    let parsed: TomlGraphFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let nodes = parsed
        .nodes
        .into_iter()
        .map(|n| {
            let node_type = n
                .node_type
                .map(|t| t.parse::<NodeType>().map_err(|e| anyhow::anyhow!("{}", e)))
                .transpose()
                .with_context(|| format!("node '{}'", n.id))?
                .unwrap_or_default();

            Ok(ConceptNode {
                id: n.id,
                label: n.label,
                domain: n.domain,
                level: n.level,
                difficulty: n.difficulty,
                node_type,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let edges = parsed
        .edges
        .into_iter()
        .map(|e| {
            let edge_type: EdgeType = e
                .edge_type
                .parse()
                .map_err(|err: String| anyhow::anyhow!("{}", err))
                .with_context(|| format!("edge {} -> {}", e.source, e.target))?;

            Ok(ConceptEdge {
                source: e.source,
                target: e.target,
                edge_type,
                weight: e.weight,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(GraphFile {
        id: parsed.graph.id,
        name: parsed.graph.name,
        description: parsed.graph.description,
        nodes,
        edges,
    })
}

/// Recursively load every `.toml` graph file under `dir` and merge them.
///
/// Files that fail to parse are skipped with a warning. The merged file takes
/// its id and name from the directory.
pub fn load_graph_directory(dir: &Path) -> Result<GraphFile> {
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "graph".to_string());
    let mut merged = GraphFile {
        id: name.clone(),
        name,
        description: String::new(),
        nodes: Vec::new(),
        edges: Vec::new(),
    };

    for file in collect_graph_files(dir)? {
        merged.nodes.extend(file.nodes);
        merged.edges.extend(file.edges);
    }

    Ok(merged)
}

fn collect_graph_files(dir: &Path) -> Result<Vec<GraphFile>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    paths.sort();

    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(collect_graph_files(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_graph_file(&path) {
                Ok(file) => files.push(file),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }
    Ok(files)
}

/// Load a graph from a single file or a directory of files.
pub fn load_graph(path: &Path) -> Result<ConceptGraph> {
    let file = if path.is_dir() {
        load_graph_directory(path)?
    } else {
        parse_graph_file(path)?
    };
    file.into_graph()
}

/// A warning from graph linting.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    /// The node the warning is about, if any.
    pub node_id: Option<String>,
    pub message: String,
}

/// Lint a graph file for issues that do not block loading.
pub fn validate_graph_file(file: &GraphFile) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for node in &file.nodes {
        if node.label.trim().is_empty() {
            warnings.push(ValidationWarning {
                node_id: Some(node.id.clone()),
                message: "label is empty".into(),
            });
        }
        if node.level > 2 {
            warnings.push(ValidationWarning {
                node_id: Some(node.id.clone()),
                message: format!("level {} is outside 0-2", node.level),
            });
        }
        if !(1..=5).contains(&node.difficulty) {
            warnings.push(ValidationWarning {
                node_id: Some(node.id.clone()),
                message: format!("difficulty {} is outside 1-5", node.difficulty),
            });
        }
    }

    let mut seen = HashSet::new();
    for edge in &file.edges {
        if !seen.insert((edge.source.as_str(), edge.target.as_str(), edge.edge_type)) {
            warnings.push(ValidationWarning {
                node_id: Some(edge.source.clone()),
                message: format!(
                    "duplicate {} edge {} -> {}",
                    edge.edge_type, edge.source, edge.target
                ),
            });
        }
    }

    let connected: HashSet<&str> = file
        .edges
        .iter()
        .flat_map(|e| [e.source.as_str(), e.target.as_str()])
        .collect();
    for node in &file.nodes {
        if !connected.contains(node.id.as_str()) {
            warnings.push(ValidationWarning {
                node_id: Some(node.id.clone()),
                message: "node has no edges".into(),
            });
        }
    }

    warnings
}
