//! Read-only rollups over the knowledge-state store.
//!
//! Averages here are over the quantized levels (0, 0.5, 1), not the
//! confidence-blended continuous values the diffusion math uses.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::KnowledgeResult;
use crate::graph::ConceptGraph;
use crate::model::{ConceptNode, KnowledgeLevel};
use crate::store::{KnowledgeStateStore, UserStates};

/// Level breakdown for a set of nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelBreakdown {
    pub total: usize,
    pub known: usize,
    pub partial: usize,
    pub unknown: usize,
    /// Mean of the quantized levels.
    pub avg_level: f64,
}

impl LevelBreakdown {
    fn record(&mut self, level: KnowledgeLevel) {
        self.total += 1;
        match level {
            KnowledgeLevel::Known => self.known += 1,
            KnowledgeLevel::Partial => self.partial += 1,
            KnowledgeLevel::Unknown => self.unknown += 1,
        }
    }

    fn finish(&mut self) {
        self.avg_level = if self.total == 0 {
            0.0
        } else {
            (self.known as f64 + self.partial as f64 * 0.5) / self.total as f64
        };
    }
}

/// Per-user rollup over every node in the graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub overall: LevelBreakdown,
    /// Same breakdown grouped by node domain.
    pub domains: BTreeMap<String, LevelBreakdown>,
}

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub known_count: usize,
    pub avg_level_score: f64,
}

/// A graph node annotated with one user's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
    #[serde(flatten)]
    pub node: ConceptNode,
    pub knowledge_state: KnowledgeLevel,
    pub confidence: f64,
    /// Display score; distinct from the continuous diffusion value.
    pub knowledge: f64,
    pub growth_daily: f64,
    pub growth_weekly: f64,
    pub growth_monthly: f64,
}

/// Everything a caller needs to render one user's map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub user_id: String,
    pub nodes: Vec<NodeView>,
    pub stats: UserStats,
}

/// Roll up one user's levels. Nodes without a row count as unknown.
pub fn compute_user_stats(graph: &ConceptGraph, states: Option<&UserStates>) -> UserStats {
    let mut stats = UserStats::default();

    for node in graph.nodes() {
        let level = states.map(|s| s.level(&node.id)).unwrap_or_default();
        stats.overall.record(level);
        stats
            .domains
            .entry(node.domain.clone())
            .or_default()
            .record(level);
    }

    stats.overall.finish();
    for domain in stats.domains.values_mut() {
        domain.finish();
    }
    stats
}

/// Annotate every node with the user's state and growth badges.
pub fn build_user_view(
    graph: &ConceptGraph,
    user_id: &str,
    states: Option<&UserStates>,
    now: DateTime<Utc>,
) -> UserView {
    let nodes = graph
        .nodes()
        .iter()
        .map(|node| {
            let state = states.and_then(|s| s.get(&node.id));
            let knowledge = state.map_or(0.0, |s| s.render_knowledge());

            let age = state.and_then(|s| s.first_known_at).map(|at| now - at);
            let badge = |window: Duration| match age {
                Some(age) if age < window => knowledge,
                _ => 0.0,
            };

            NodeView {
                node: node.clone(),
                knowledge_state: state.map(|s| s.knowledge_state).unwrap_or_default(),
                confidence: state.map_or(0.0, |s| s.confidence),
                knowledge,
                growth_daily: badge(Duration::days(1)),
                growth_weekly: badge(Duration::days(7)),
                growth_monthly: badge(Duration::days(30)),
            }
        })
        .collect();

    UserView {
        user_id: user_id.to_string(),
        nodes,
        stats: compute_user_stats(graph, states),
    }
}

/// Order by known count, then average level, then user id.
pub fn rank_leaderboard(mut entries: Vec<LeaderboardEntry>) -> Vec<LeaderboardEntry> {
    entries.sort_by(|a, b| {
        b.known_count
            .cmp(&a.known_count)
            .then_with(|| b.avg_level_score.total_cmp(&a.avg_level_score))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    entries
}

/// Rank every user in the store.
///
/// Full scan over users x nodes; fine for hundreds of nodes and a modest
/// number of users, not beyond that.
pub fn leaderboard(store: &KnowledgeStateStore) -> KnowledgeResult<Vec<LeaderboardEntry>> {
    let graph = store.graph();
    let mut entries = Vec::new();

    for user_id in store.user_ids()? {
        let stats = store.inspect_user(&user_id, |states| compute_user_stats(graph, states))?;
        entries.push(LeaderboardEntry {
            user_id,
            known_count: stats.overall.known,
            avg_level_score: stats.overall.avg_level,
        });
    }

    Ok(rank_leaderboard(entries))
}
