//! Applying a single assessment result.
//!
//! The directly tested node takes the assessed level; evidence then spreads
//! outward layer by layer along outgoing influence edges, decaying with
//! depth. Each node is visited at most once, at the shallowest depth it is
//! reached.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diffusion::DiffusionSummary;
use crate::error::{KnowledgeError, KnowledgeResult};
use crate::graph::ConceptGraph;
use crate::model::{KnowledgeLevel, UserKnowledgeState};
use crate::store::UserStates;

/// Default per-hop decay applied to propagated influence.
pub const DEFAULT_DECAY_FACTOR: f64 = 0.3;
/// Default number of hops propagation reaches.
pub const DEFAULT_PROPAGATION_DEPTH: u32 = 2;
/// Confidence floor for nodes updated only by inference.
pub const INFERRED_CONFIDENCE_FLOOR: f64 = 0.2;

/// Propagation tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssessmentProcessor {
    pub decay_factor: f64,
    pub propagation_depth: u32,
}

impl Default for AssessmentProcessor {
    fn default() -> Self {
        Self {
            decay_factor: DEFAULT_DECAY_FACTOR,
            propagation_depth: DEFAULT_PROPAGATION_DEPTH,
        }
    }
}

/// A node touched by propagation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagatedUpdate {
    pub node_id: String,
    /// Hop count at which the node was first reached.
    pub depth: u32,
    /// Continuous value computed for the node before quantization.
    pub value: f64,
    /// Level stored after quantization.
    pub level: KnowledgeLevel,
}

/// What one assessment changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentOutcome {
    /// The directly tested node's new row.
    pub updated_state: UserKnowledgeState,
    /// Every other node propagation touched, in visit order.
    pub propagated: Vec<PropagatedUpdate>,
    /// Follow-up diffusion pass, when the caller ran one.
    #[serde(default)]
    pub diffusion: Option<DiffusionSummary>,
}

impl AssessmentOutcome {
    /// Ids of the propagated nodes, followed by any other node the
    /// follow-up pass raised. The tested node itself is never listed.
    pub fn affected_node_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.propagated.iter().map(|p| p.node_id.as_str()).collect();
        if let Some(summary) = &self.diffusion {
            for id in &summary.raised {
                if id != &self.updated_state.node_id && !ids.contains(&id.as_str()) {
                    ids.push(id.as_str());
                }
            }
        }
        ids
    }
}

/// Reject a decay factor outside [0, 1] (NaN included).
pub fn validate_decay_factor(decay_factor: f64) -> KnowledgeResult<()> {
    if (0.0..=1.0).contains(&decay_factor) {
        Ok(())
    } else {
        Err(KnowledgeError::InvalidDecayFactor(decay_factor))
    }
}

/// Next confidence for the directly tested node.
///
/// Rises faster on correct answers than it falls on incorrect ones.
pub fn next_confidence(previous: f64, result: KnowledgeLevel) -> f64 {
    match result {
        KnowledgeLevel::Known => (previous + 0.15).min(1.0),
        KnowledgeLevel::Partial => previous.max(0.3),
        KnowledgeLevel::Unknown => (previous - 0.1).max(0.0),
    }
}

impl AssessmentProcessor {
    pub fn new(decay_factor: f64, propagation_depth: u32) -> Self {
        Self {
            decay_factor,
            propagation_depth,
        }
    }

    /// Apply `result` for `node_id` to one user's map.
    ///
    /// Fails without writing anything when the node is unknown.
    pub fn process(
        &self,
        graph: &ConceptGraph,
        states: &mut UserStates,
        node_id: &str,
        result: KnowledgeLevel,
        now: DateTime<Utc>,
    ) -> KnowledgeResult<AssessmentOutcome> {
        let origin = graph.require(node_id)?;

        let previous_confidence = states.get(node_id).map_or(0.0, |s| s.confidence);
        let confidence = next_confidence(previous_confidence, result);
        let updated_state = states
            .upsert(node_id, result.value(), confidence, now)
            .clone();

        let propagated = self.propagate(graph, states, origin, result.value(), now);

        tracing::debug!(
            user_id = states.user_id(),
            node_id,
            result = result.value(),
            propagated = propagated.len(),
            "assessment applied"
        );

        Ok(AssessmentOutcome {
            updated_state,
            propagated,
            diffusion: None,
        })
    }

    /// Breadth-first propagation from `origin`, one frontier per depth.
    fn propagate(
        &self,
        graph: &ConceptGraph,
        states: &mut UserStates,
        origin: usize,
        result: f64,
        now: DateTime<Utc>,
    ) -> Vec<PropagatedUpdate> {
        let nodes = graph.nodes();
        let mut visited = HashSet::from([origin]);
        let mut frontier = vec![origin];
        let mut updates = Vec::new();

        for depth in 1..=self.propagation_depth {
            if frontier.is_empty() {
                break;
            }
            let decay = self.decay_factor.powi(depth as i32);
            let mut next = Vec::new();

            for &current in &frontier {
                for influence in graph.outgoing(current) {
                    if !visited.insert(influence.neighbor) {
                        continue;
                    }
                    let neighbor_id = nodes[influence.neighbor].id.as_str();
                    let existing = states.get(neighbor_id);
                    let current_k = existing.map_or(0.0, UserKnowledgeState::continuous);
                    let confidence = existing
                        .map_or(0.0, |s| s.confidence)
                        .max(INFERRED_CONFIDENCE_FLOOR);

                    let influence_value = result * influence.weight * decay;
                    let new_k = (current_k + influence_value * (1.0 - current_k))
                        .clamp(current_k, 1.0);

                    let level = states.upsert(neighbor_id, new_k, confidence, now).knowledge_state;
                    updates.push(PropagatedUpdate {
                        node_id: neighbor_id.to_string(),
                        depth,
                        value: new_k,
                        level,
                    });
                    next.push(influence.neighbor);
                }
            }
            frontier = next;
        }

        updates
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
    fn confidence_is_asymmetric() {
        assert!((next_confidence(0.0, KnowledgeLevel::Known) - 0.15).abs() < 1e-9);
        assert_eq!(next_confidence(0.95, KnowledgeLevel::Known), 1.0);
        assert_eq!(next_confidence(0.1, KnowledgeLevel::Partial), 0.3);
        assert_eq!(next_confidence(0.6, KnowledgeLevel::Partial), 0.6);
        assert!((next_confidence(0.5, KnowledgeLevel::Unknown) - 0.4).abs() < 1e-9);
        assert_eq!(next_confidence(0.05, KnowledgeLevel::Unknown), 0.0);
    }

    #[test]
    fn chain_scenario_decays_by_depth() {
        let graph = chain();
        let mut states = UserStates::new("u1");
        let outcome = AssessmentProcessor::default()
            .process(&graph, &mut states, "a", KnowledgeLevel::Known, Utc::now())
            .unwrap();

        assert_eq!(outcome.updated_state.knowledge_state, KnowledgeLevel::Known);
        assert!((outcome.updated_state.confidence - 0.15).abs() < 1e-9);
        assert_eq!(outcome.affected_node_ids(), vec!["b", "c"]);

        let b = &outcome.propagated[0];
        assert_eq!(b.depth, 1);
        assert!((b.value - 0.24).abs() < 1e-9);
        assert_eq!(b.level, KnowledgeLevel::Unknown);

        let c = &outcome.propagated[1];
        assert_eq!(c.depth, 2);
        assert!((c.value - 0.045).abs() < 1e-9);
        assert_eq!(c.level, KnowledgeLevel::Unknown);

        assert_eq!(states.get("b").unwrap().confidence, INFERRED_CONFIDENCE_FLOOR);
    }

    #[test]
    fn depth_limit_is_respected() {
        let graph = chain();
        let mut states = UserStates::new("u1");
        let outcome = AssessmentProcessor::new(0.3, 1)
            .process(&graph, &mut states, "a", KnowledgeLevel::Known, Utc::now())
            .unwrap();
        assert_eq!(outcome.affected_node_ids(), vec!["b"]);
        assert!(states.get("c").is_none());
    }

    #[test]
    fn propagation_never_lowers_a_neighbor() {
        let graph = chain();
        let mut states = UserStates::new("u1");
        let now = Utc::now();
        states.upsert("b", 1.0, 0.9, now);
        let before = states.continuous("b");

        AssessmentProcessor::default()
            .process(&graph, &mut states, "a", KnowledgeLevel::Unknown, now)
            .unwrap();
        assert!(states.continuous("b") >= before);
        assert_eq!(states.level("b"), KnowledgeLevel::Known);
    }

    #[test]
    fn influence_diminishes_near_full_knowledge() {
        let graph = chain();
        let mut states = UserStates::new("u1");
        let now = Utc::now();
        states.upsert("b", 0.5, 1.0, now);
        let current = states.continuous("b");

        let outcome = AssessmentProcessor::default()
            .process(&graph, &mut states, "a", KnowledgeLevel::Known, now)
            .unwrap();
        let expected = current + 0.24 * (1.0 - current);
        assert!((outcome.propagated[0].value - expected).abs() < 1e-9);
    }

    #[test]
    fn cycles_terminate() {
        let graph = ConceptGraph::load(
            vec![node("a", "m"), node("b", "m"), node("c", "m")],
            vec![
                edge("a", "b", EdgeType::Related, 0.9),
                edge("b", "c", EdgeType::Related, 0.9),
                edge("c", "a", EdgeType::Related, 0.9),
            ],
        )
        .unwrap();
        let mut states = UserStates::new("u1");
        let outcome = AssessmentProcessor::new(0.3, 10)
            .process(&graph, &mut states, "a", KnowledgeLevel::Known, Utc::now())
            .unwrap();
        assert_eq!(outcome.propagated.len(), 2);
    }

    #[test]
    fn unknown_node_writes_nothing() {
        let graph = chain();
        let mut states = UserStates::new("u1");
        let err = AssessmentProcessor::default()
            .process(&graph, &mut states, "ghost", KnowledgeLevel::Known, Utc::now())
            .unwrap_err();
        assert_eq!(err, crate::error::KnowledgeError::NoSuchNode("ghost".into()));
        assert!(states.is_empty());
    }
}
