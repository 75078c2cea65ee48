//! conceptflow-core: knowledge diffusion over a concept graph.
//!
//! Tracks what each learner knows about every concept in a static graph,
//! spreads the evidence of each assessment to related concepts, and smooths
//! estimates with a graph diffusion pass.

pub mod assessment;
pub mod config;
pub mod diffusion;
pub mod engine;
pub mod error;
pub mod graph;
pub mod model;
pub mod parser;
pub mod report;
pub mod statistics;
pub mod store;
pub mod traits;

pub use config::EngineConfig;
pub use engine::KnowledgeEngine;
pub use error::{KnowledgeError, KnowledgeResult};
pub use graph::ConceptGraph;
pub use model::{ConceptEdge, ConceptNode, EdgeType, KnowledgeLevel, NodeType, UserKnowledgeState};
