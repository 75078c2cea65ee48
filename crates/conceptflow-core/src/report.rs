//! Event log replay with JSON report persistence.
//!
//! An event log is an ordered list of assessments and explicit diffusion
//! passes. Replaying it through a [`KnowledgeEngine`] produces a
//! [`ReplayReport`] holding the final leaderboard and per-user rollups.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::KnowledgeEngine;
use crate::graph::ConceptGraph;
use crate::statistics::{LeaderboardEntry, UserStats};

/// One entry of an event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// A single assessment result.
    Assess {
        user_id: String,
        node_id: String,
        result: f64,
    },
    /// An explicit diffusion pass; `None` uses the configured alpha.
    Diffuse {
        user_id: String,
        alpha: Option<f64>,
    },
}

impl Event {
    pub fn user_id(&self) -> &str {
        match self {
            Event::Assess { user_id, .. } | Event::Diffuse { user_id, .. } => user_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TomlEventLog {
    #[serde(default)]
    events: Vec<TomlEvent>,
}

#[derive(Debug, Deserialize)]
struct TomlEvent {
    #[serde(default)]
    kind: Option<String>,
    user: String,
    #[serde(default)]
    node: Option<String>,
    #[serde(default)]
    result: Option<f64>,
    #[serde(default)]
    alpha: Option<f64>,
}

/// Parse an event log file.
pub fn parse_event_log(path: &Path) -> Result<Vec<Event>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read event log: {}", path.display()))?;

    parse_event_log_str(&content, path)
}

/// Parse an event log from a TOML string.
///
/// Events without a `kind` are assessments. Malformed entries (a missing
/// node or result, an unknown kind) fail the whole parse; values the engine
/// rejects are only discovered on replay.
pub fn parse_event_log_str(content: &str, source_path: &Path) -> Result<Vec<Event>> {
    let parsed: TomlEventLog = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    parsed
        .events
        .into_iter()
        .enumerate()
        .map(|(i, e)| match e.kind.as_deref().unwrap_or("assess") {
            "assess" => Ok(Event::Assess {
                node_id: e
                    .node
                    .with_context(|| format!("event {i}: assessment is missing 'node'"))?,
                result: e
                    .result
                    .with_context(|| format!("event {i}: assessment is missing 'result'"))?,
                user_id: e.user,
            }),
            "diffuse" => Ok(Event::Diffuse {
                user_id: e.user,
                alpha: e.alpha,
            }),
            other => anyhow::bail!("event {i}: unknown kind '{other}'"),
        })
        .collect()
}

/// Identity and size of the replayed graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub id: String,
    pub name: String,
    pub node_count: usize,
    pub edge_count: usize,
}

impl GraphSummary {
    pub fn new(id: impl Into<String>, name: impl Into<String>, graph: &ConceptGraph) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_count: graph.len(),
            edge_count: graph.edges().len(),
        }
    }
}

/// An event the engine refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedEvent {
    /// Position in the log.
    pub index: usize,
    pub reason: String,
}

/// A complete replay report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    pub graph: GraphSummary,
    pub events_applied: usize,
    pub events_rejected: usize,
    pub rejections: Vec<RejectedEvent>,
    /// Nodes touched by propagation, summed over all assessments.
    pub propagated_total: usize,
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Final rollup for every user that appears in the store.
    pub users: BTreeMap<String, UserStats>,
}

impl ReplayReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: ReplayReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }
}

/// Apply `events` in order and report the final state.
///
/// Events the engine rejects are counted and logged, not fatal.
pub fn replay(
    engine: &KnowledgeEngine,
    graph: GraphSummary,
    events: &[Event],
) -> Result<ReplayReport> {
    let mut events_applied = 0;
    let mut rejections = Vec::new();
    let mut propagated_total = 0;

    for (index, event) in events.iter().enumerate() {
        let applied = match event {
            Event::Assess {
                user_id,
                node_id,
                result,
            } => engine
                .process_assessment(user_id, node_id, *result)
                .map(|outcome| propagated_total += outcome.propagated.len()),
            Event::Diffuse { user_id, alpha } => engine
                .run_diffusion_pass(user_id, alpha.unwrap_or(engine.config().alpha))
                .map(|_| ()),
        };

        match applied {
            Ok(()) => events_applied += 1,
            Err(e) => {
                tracing::warn!(index, user_id = event.user_id(), "event rejected: {}", e);
                rejections.push(RejectedEvent {
                    index,
                    reason: e.to_string(),
                });
            }
        }
    }

    let leaderboard = engine.leaderboard()?;
    let mut users = BTreeMap::new();
    for user_id in engine.store().user_ids()? {
        let stats = engine.user_stats(&user_id)?;
        users.insert(user_id, stats);
    }

    tracing::info!(
        graph = %graph.id,
        applied = events_applied,
        rejected = rejections.len(),
        users = users.len(),
        "replay complete"
    );

    Ok(ReplayReport {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        graph,
        events_applied,
        events_rejected: rejections.len(),
        rejections,
        propagated_total,
        leaderboard,
        users,
    })
}
