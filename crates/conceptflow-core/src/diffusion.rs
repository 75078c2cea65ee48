//! Global knowledge diffusion.
//!
//! One pass smooths every node toward the weighted mean of the nodes that
//! influence it:
//!
//! ```text
//! K'(v) = alpha * K(v) + (1 - alpha) * sum(w_i * K(n_i)) / sum(w_i)
//! ```
//!
//! The pass is synchronous (Jacobi-style): all neighbor means read the
//! pre-pass snapshot. A pass only raises or holds a node, never lowers it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assessment::INFERRED_CONFIDENCE_FLOOR;
use crate::error::{KnowledgeError, KnowledgeResult};
use crate::graph::ConceptGraph;
use crate::model::{ConceptEdge, ConceptNode, KnowledgeLevel};
use crate::store::UserStates;

/// Default self-weight of a node in a diffusion pass.
pub const DEFAULT_ALPHA: f64 = 0.3;

/// Runs diffusion passes at a fixed alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffusionEngine {
    alpha: f64,
}

impl Default for DiffusionEngine {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
        }
    }
}

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffusionSummary {
    /// Nodes with at least one incoming influence.
    pub nodes_examined: usize,
    /// Nodes whose row was written back, in graph order.
    pub written: Vec<String>,
    /// Nodes whose discrete level went up.
    pub raised: Vec<String>,
}

impl DiffusionEngine {
    /// Build an engine, rejecting alpha outside [0, 1].
    pub fn new(alpha: f64) -> KnowledgeResult<Self> {
        validate_alpha(alpha)?;
        Ok(Self { alpha })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Run one pass over the whole graph for one user's map.
    ///
    /// Rows that already exist are rewritten (refreshing `last_updated`).
    /// Nodes without a row only get one when the pass lifts them above
    /// unknown, so an empty map stays empty.
    pub fn run_pass(
        &self,
        graph: &ConceptGraph,
        states: &mut UserStates,
        now: DateTime<Utc>,
    ) -> DiffusionSummary {
        let nodes = graph.nodes();
        let snapshot: Vec<f64> = nodes.iter().map(|n| states.continuous(&n.id)).collect();
        let mut summary = DiffusionSummary::default();

        for (idx, node) in nodes.iter().enumerate() {
            let influences = graph.incoming(idx);
            if influences.is_empty() {
                continue;
            }
            summary.nodes_examined += 1;

            let (weighted_sum, total_weight) = influences
                .iter()
                .fold((0.0, 0.0), |(sum, total), inf| {
                    (sum + inf.weight * snapshot[inf.neighbor], total + inf.weight)
                });
            let neighbor_mean = if total_weight > 0.0 {
                weighted_sum / total_weight
            } else {
                0.0
            };

            let current = snapshot[idx];
            let new_k = (self.alpha * current + (1.0 - self.alpha) * neighbor_mean)
                .clamp(current, 1.0);

            let before = states.level(&node.id);
            let confidence = match states.get(&node.id) {
                Some(existing) => existing.confidence,
                None if KnowledgeLevel::quantize(new_k) > KnowledgeLevel::Unknown => {
                    INFERRED_CONFIDENCE_FLOOR
                }
                None => continue,
            };

            let after = states.upsert(&node.id, new_k, confidence, now).knowledge_state;
            summary.written.push(node.id.clone());
            if after > before {
                summary.raised.push(node.id.clone());
            }
        }

        tracing::debug!(
            user_id = states.user_id(),
            alpha = self.alpha,
            examined = summary.nodes_examined,
            written = summary.written.len(),
            raised = summary.raised.len(),
            "diffusion pass complete"
        );

        summary
    }
}

/// Reject an alpha outside [0, 1] (NaN included).
pub fn validate_alpha(alpha: f64) -> KnowledgeResult<()> {
    if (0.0..=1.0).contains(&alpha) {
        Ok(())
    } else {
        Err(KnowledgeError::InvalidAlpha(alpha))
    }
}

/// Dense graph Laplacian `L = D - A`.
///
/// Analytical artifact only; nothing in the diffusion loop reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Laplacian {
    /// Row/column order of the matrices.
    pub node_ids: Vec<String>,
    pub adjacency: Vec<Vec<f64>>,
    /// Weighted out-degree (row sums of `adjacency`).
    pub degree: Vec<f64>,
    pub laplacian: Vec<Vec<f64>>,
}

/// Build the weighted adjacency, degree vector and Laplacian.
///
/// Related and equivalent edges are symmetric, every other type is directed
/// source -> target. Edges naming unknown nodes are skipped.
pub fn compute_laplacian(nodes: &[ConceptNode], edges: &[ConceptEdge]) -> Laplacian {
    let node_ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
    let index: std::collections::HashMap<&str, usize> = node_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let n = node_ids.len();

    let mut adjacency = vec![vec![0.0; n]; n];
    let mut degree = vec![0.0; n];

    for edge in edges {
        let (Some(&i), Some(&j)) = (
            index.get(edge.source.as_str()),
            index.get(edge.target.as_str()),
        ) else {
            continue;
        };

        adjacency[i][j] = edge.weight;
        degree[i] += edge.weight;

        if edge.edge_type.is_bidirectional() {
            adjacency[j][i] = edge.weight;
            degree[j] += edge.weight;
        }
    }

    let laplacian = (0..n)
        .map(|i| {
            (0..n)
                .map(|j| {
                    if i == j {
                        degree[i] - adjacency[i][j]
                    } else {
                        -adjacency[i][j]
                    }
                })
                .collect()
        })
        .collect();

    Laplacian {
        node_ids,
        adjacency,
        degree,
        laplacian,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{edge, node};
    use crate::model::EdgeType;

    fn chain() -> ConceptGraph {
        ConceptGraph::load(
            vec![node("a", "m"), node("b", "m"), node("c", "m")],
            vec![
                edge("a", "b", EdgeType::Prerequisite, 0.8),
                edge("b", "c", EdgeType::Prerequisite, 0.5),
            ],
        )
        .unwrap()
    }

    #[test]
    fn alpha_is_validated() {
        assert!(DiffusionEngine::new(0.0).is_ok());
        assert!(DiffusionEngine::new(1.0).is_ok());
        assert_eq!(
            DiffusionEngine::new(1.2).unwrap_err(),
            KnowledgeError::InvalidAlpha(1.2)
        );
        assert!(DiffusionEngine::new(-0.1).is_err());
        assert!(DiffusionEngine::new(f64::NAN).is_err());
    }

    #[test]
    fn empty_state_stays_empty() {
        let graph = chain();
        let mut states = UserStates::new("u1");
        let summary = DiffusionEngine::default().run_pass(&graph, &mut states, Utc::now());
        assert!(states.is_empty());
        assert!(summary.written.is_empty());
        assert_eq!(summary.nodes_examined, 2);
        for n in graph.nodes() {
            assert_eq!(states.level(&n.id), KnowledgeLevel::Unknown);
        }
    }

    #[test]
    fn pass_reads_only_the_snapshot() {
        let graph = chain();
        let mut states = UserStates::new("u1");
        let now = Utc::now();
        states.upsert("a", 1.0, 1.0, now);

        let summary = DiffusionEngine::default().run_pass(&graph, &mut states, now);

        // b = 0.3*0 + 0.7*1.0 = 0.7 -> partial
        assert_eq!(states.level("b"), KnowledgeLevel::Partial);
        // c saw b's pre-pass value (0), not the freshly raised one
        assert!(states.get("c").is_none());
        assert_eq!(summary.raised, vec!["b".to_string()]);
    }

    #[test]
    fn existing_rows_never_drop() {
        let graph = chain();
        let mut states = UserStates::new("u1");
        let now = Utc::now();
        states.upsert("b", 0.5, 0.3, now);
        states.upsert("c", 0.0, 0.0, now);
        let before = states.continuous("b");

        DiffusionEngine::new(0.3)
            .unwrap()
            .run_pass(&graph, &mut states, now);

        assert!(states.continuous("b") >= before);
        assert_eq!(states.level("b"), KnowledgeLevel::Partial);
        assert_eq!(states.get("b").unwrap().confidence, 0.3);
    }

    #[test]
    fn nodes_without_influences_are_untouched() {
        let graph = chain();
        let mut states = UserStates::new("u1");
        let t0 = Utc::now();
        states.upsert("a", 0.5, 0.5, t0);
        let later = t0 + chrono::Duration::minutes(5);

        DiffusionEngine::default().run_pass(&graph, &mut states, later);
        assert_eq!(states.get("a").unwrap().last_updated, t0);
    }

    #[test]
    fn pass_stamps_first_known_at() {
        let graph = ConceptGraph::load(
            vec![node("a", "m"), node("b", "m")],
            vec![edge("a", "b", EdgeType::Related, 1.0)],
        )
        .unwrap();
        let mut states = UserStates::new("u1");
        let now = Utc::now();
        states.upsert("a", 1.0, 1.0, now);
        states.upsert("b", 0.5, 1.0, now);

        // b = 0.3*0.6 + 0.7*1.0 = 0.88 -> known
        DiffusionEngine::default().run_pass(&graph, &mut states, now);
        let b = states.get("b").unwrap();
        assert_eq!(b.knowledge_state, KnowledgeLevel::Known);
        assert_eq!(b.first_known_at, Some(now));
    }

    #[test]
    fn laplacian_follows_edge_direction() {
        let nodes = vec![node("a", "m"), node("b", "m"), node("c", "m")];
        let edges = vec![
            edge("a", "b", EdgeType::Prerequisite, 0.8),
            edge("b", "c", EdgeType::Related, 0.5),
            edge("a", "ghost", EdgeType::Related, 0.5),
        ];
        let lap = compute_laplacian(&nodes, &edges);

        assert_eq!(lap.node_ids, vec!["a", "b", "c"]);
        assert_eq!(lap.adjacency[0][1], 0.8);
        assert_eq!(lap.adjacency[1][0], 0.0);
        assert_eq!(lap.adjacency[1][2], 0.5);
        assert_eq!(lap.adjacency[2][1], 0.5);
        assert_eq!(lap.degree, vec![0.8, 0.5, 0.5]);
        assert_eq!(lap.laplacian[0][0], 0.8);
        assert_eq!(lap.laplacian[0][1], -0.8);
        assert_eq!(lap.laplacian[2][1], -0.5);
    }
}
