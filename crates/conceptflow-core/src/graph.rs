//! The static concept graph.
//!
//! Loaded once, validated fail-fast, then shared read-only across users.
//! Influence adjacency is precomputed at load time in both directions:
//! `incoming` feeds the diffusion neighbor mean, `outgoing` drives
//! assessment propagation.

use std::collections::{HashMap, HashSet};

use crate::error::{KnowledgeError, KnowledgeResult};
use crate::model::{ConceptEdge, ConceptNode, EdgeType};

/// One entry of an influence list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Influence {
    /// Index of the neighboring node in [`ConceptGraph::nodes`].
    pub neighbor: usize,
    pub weight: f64,
}

/// Validated, immutable concept graph.
#[derive(Debug, Clone)]
pub struct ConceptGraph {
    nodes: Vec<ConceptNode>,
    edges: Vec<ConceptEdge>,
    index: HashMap<String, usize>,
    /// Per node: the neighbors whose knowledge flows into it.
    incoming: Vec<Vec<Influence>>,
    /// Per node: the neighbors its knowledge flows into.
    outgoing: Vec<Vec<Influence>>,
}

impl ConceptGraph {
    /// Validate and index a node/edge list.
    ///
    /// Any dangling edge, self-loop, duplicate node id or out-of-range weight
    /// rejects the whole load.
    pub fn load(nodes: Vec<ConceptNode>, edges: Vec<ConceptEdge>) -> KnowledgeResult<Self> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), i).is_some() {
                return Err(KnowledgeError::DuplicateNode(node.id.clone()));
            }
        }

        let mut incoming = vec![Vec::new(); nodes.len()];
        let mut outgoing = vec![Vec::new(); nodes.len()];

        for edge in &edges {
            if edge.source == edge.target {
                return Err(KnowledgeError::SelfLoop(edge.source.clone()));
            }
            let lookup = |id: &str| {
                index
                    .get(id)
                    .copied()
                    .ok_or_else(|| KnowledgeError::DanglingEdge {
                        source_id: edge.source.clone(),
                        target_id: edge.target.clone(),
                        missing: id.to_string(),
                    })
            };
            let s = lookup(&edge.source)?;
            let t = lookup(&edge.target)?;
            if !edge.weight.is_finite() || !(0.0..=1.0).contains(&edge.weight) {
                return Err(KnowledgeError::InvalidWeight {
                    source_id: edge.source.clone(),
                    target_id: edge.target.clone(),
                    weight: edge.weight,
                });
            }

            let w = edge.weight;
            incoming[t].push(Influence { neighbor: s, weight: w });
            outgoing[s].push(Influence { neighbor: t, weight: w });
            if edge.edge_type.is_bidirectional() {
                incoming[s].push(Influence { neighbor: t, weight: w });
                outgoing[t].push(Influence { neighbor: s, weight: w });
            }
        }

        tracing::info!(
            nodes = nodes.len(),
            edges = edges.len(),
            "concept graph loaded"
        );

        Ok(Self {
            nodes,
            edges,
            index,
            incoming,
            outgoing,
        })
    }

    /// All nodes, in load order.
    pub fn nodes(&self) -> &[ConceptNode] {
        &self.nodes
    }

    /// All edges, in load order.
    pub fn edges(&self) -> &[ConceptEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Position of a node id in [`nodes`](Self::nodes).
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&ConceptNode> {
        self.index_of(id).map(|i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Like [`index_of`](Self::index_of), but unknown ids are an error.
    pub fn require(&self, id: &str) -> KnowledgeResult<usize> {
        self.index_of(id)
            .ok_or_else(|| KnowledgeError::NoSuchNode(id.to_string()))
    }

    /// Neighbors whose knowledge flows into node `idx`.
    pub fn incoming(&self, idx: usize) -> &[Influence] {
        &self.incoming[idx]
    }

    /// Neighbors that node `idx`'s knowledge flows into.
    pub fn outgoing(&self, idx: usize) -> &[Influence] {
        &self.outgoing[idx]
    }

    /// Prerequisite edges pointing into `node_id`.
    pub fn prerequisites(&self, node_id: &str) -> Vec<&ConceptEdge> {
        self.edges
            .iter()
            .filter(|e| e.target == node_id && e.edge_type == EdgeType::Prerequisite)
            .collect()
    }

    /// Prerequisite edges leaving `node_id`.
    pub fn dependents(&self, node_id: &str) -> Vec<&ConceptEdge> {
        self.edges
            .iter()
            .filter(|e| e.source == node_id && e.edge_type == EdgeType::Prerequisite)
            .collect()
    }

    /// Every edge touching `node_id` in either direction.
    pub fn edges_for_node(&self, node_id: &str) -> Vec<&ConceptEdge> {
        self.edges
            .iter()
            .filter(|e| e.source == node_id || e.target == node_id)
            .collect()
    }

    pub fn nodes_in_domain(&self, domain: &str) -> Vec<&ConceptNode> {
        self.nodes.iter().filter(|n| n.domain == domain).collect()
    }

    pub fn nodes_at_level(&self, level: u32) -> Vec<&ConceptNode> {
        self.nodes.iter().filter(|n| n.level == level).collect()
    }

    /// Unique domains in first-seen order.
    pub fn domains(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.nodes
            .iter()
            .map(|n| n.domain.as_str())
            .filter(|d| seen.insert(*d))
            .collect()
    }
}
