//! Core data model types for conceptflow.
//!
//! Concept nodes and edges are static and loaded once; user knowledge states
//! are the strongly-typed rows the store keeps per (user, node) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::KnowledgeError;

/// Continuous values at or above this quantize to [`KnowledgeLevel::Known`].
pub const KNOWN_THRESHOLD: f64 = 0.75;
/// Continuous values at or above this (and below known) quantize to partial.
pub const PARTIAL_THRESHOLD: f64 = 0.25;

/// A single learnable unit in the concept graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptNode {
    /// Unique identifier.
    pub id: String,
    /// Human-readable label.
    pub label: String,
    /// Category the node belongs to (e.g. "linear_algebra").
    pub domain: String,
    /// Depth in the curriculum hierarchy, 0 (root) to 2.
    #[serde(default)]
    pub level: u32,
    /// Difficulty from 1 (easy) to 5 (hard).
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
    /// What kind of concept this is.
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
}

fn default_difficulty() -> u8 {
    1
}

/// Kinds of concept nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    #[default]
    Concept,
    Theorem,
    Algorithm,
    Model,
    Advertisement,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Concept => write!(f, "concept"),
            NodeType::Theorem => write!(f, "theorem"),
            NodeType::Algorithm => write!(f, "algorithm"),
            NodeType::Model => write!(f, "model"),
            NodeType::Advertisement => write!(f, "advertisement"),
        }
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "concept" => Ok(NodeType::Concept),
            "theorem" => Ok(NodeType::Theorem),
            "algorithm" => Ok(NodeType::Algorithm),
            "model" => Ok(NodeType::Model),
            "advertisement" | "ad" => Ok(NodeType::Advertisement),
            other => Err(format!("unknown node type: {other}")),
        }
    }
}

/// A typed, weighted relationship between two concepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptEdge {
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    /// Relationship kind.
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    /// Strength of the relationship in [0, 1].
    pub weight: f64,
}

/// Kinds of concept relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// Source should generally be learned before target.
    Prerequisite,
    Related,
    /// Source is the general form of target.
    Generalizes,
    DerivedFrom,
    EquivalentTo,
}

impl EdgeType {
    /// Whether knowledge flows both ways along edges of this type.
    pub fn is_bidirectional(self) -> bool {
        matches!(self, EdgeType::Related | EdgeType::EquivalentTo)
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeType::Prerequisite => write!(f, "prerequisite"),
            EdgeType::Related => write!(f, "related"),
            EdgeType::Generalizes => write!(f, "generalizes"),
            EdgeType::DerivedFrom => write!(f, "derived_from"),
            EdgeType::EquivalentTo => write!(f, "equivalent_to"),
        }
    }
}

impl FromStr for EdgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prerequisite" => Ok(EdgeType::Prerequisite),
            "related" => Ok(EdgeType::Related),
            "generalizes" => Ok(EdgeType::Generalizes),
            "derived_from" => Ok(EdgeType::DerivedFrom),
            "equivalent_to" => Ok(EdgeType::EquivalentTo),
            other => Err(format!("unknown edge type: {other}")),
        }
    }
}

/// Discrete knowledge level, persisted as 0, 0.5 or 1.
///
/// Also used as the outcome of a single assessment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum KnowledgeLevel {
    #[default]
    Unknown,
    Partial,
    Known,
}

impl KnowledgeLevel {
    /// Map a continuous `[0, 1]` estimate onto a discrete level.
    ///
    /// Lower bounds are inclusive: 0.25 is partial, 0.75 is known.
    pub fn quantize(value: f64) -> Self {
        if value >= KNOWN_THRESHOLD {
            KnowledgeLevel::Known
        } else if value >= PARTIAL_THRESHOLD {
            KnowledgeLevel::Partial
        } else {
            KnowledgeLevel::Unknown
        }
    }

    /// Numeric value of the level.
    pub fn value(self) -> f64 {
        match self {
            KnowledgeLevel::Unknown => 0.0,
            KnowledgeLevel::Partial => 0.5,
            KnowledgeLevel::Known => 1.0,
        }
    }
}

impl TryFrom<f64> for KnowledgeLevel {
    type Error = KnowledgeError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value == 0.0 {
            Ok(KnowledgeLevel::Unknown)
        } else if value == 0.5 {
            Ok(KnowledgeLevel::Partial)
        } else if value == 1.0 {
            Ok(KnowledgeLevel::Known)
        } else {
            Err(KnowledgeError::InvalidResult(value))
        }
    }
}

impl From<KnowledgeLevel> for f64 {
    fn from(level: KnowledgeLevel) -> Self {
        level.value()
    }
}

impl fmt::Display for KnowledgeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnowledgeLevel::Unknown => write!(f, "unknown"),
            KnowledgeLevel::Partial => write!(f, "partial"),
            KnowledgeLevel::Known => write!(f, "known"),
        }
    }
}

/// One learner's estimate for one concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserKnowledgeState {
    pub user_id: String,
    pub node_id: String,
    /// Quantized knowledge level.
    pub knowledge_state: KnowledgeLevel,
    /// Reliability of the estimate in [0, 1].
    pub confidence: f64,
    pub last_updated: DateTime<Utc>,
    /// Set the first time the level reaches known; never cleared.
    #[serde(default)]
    pub first_known_at: Option<DateTime<Utc>>,
}

impl UserKnowledgeState {
    /// Confidence-blended value used by propagation and diffusion.
    pub fn continuous(&self) -> f64 {
        (self.knowledge_state.value() * 0.8 + self.confidence * 0.2).clamp(0.0, 1.0)
    }

    /// Display score for coloring and growth badges.
    ///
    /// Deliberately a different mapping from [`continuous`](Self::continuous);
    /// it never feeds back into the diffusion math.
    pub fn render_knowledge(&self) -> f64 {
        match self.knowledge_state {
            KnowledgeLevel::Known => (0.85 + self.confidence * 0.15).min(1.0),
            KnowledgeLevel::Partial => 0.35 + self.confidence * 0.3,
            KnowledgeLevel::Unknown => self.confidence * 0.15,
        }
    }
}

/// Continuous value of an optional row; missing rows count as 0.
pub fn continuous_knowledge(state: Option<&UserKnowledgeState>) -> f64 {
    state.map_or(0.0, UserKnowledgeState::continuous)
}
