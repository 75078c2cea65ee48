//! Central knowledge engine.
//!
//! Owns the shared graph, the per-user store and the tuning, and exposes the
//! operations request handlers call. Every mutating operation for a user runs
//! inside that user's lock from validation-passed to last row written.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::assessment::{validate_decay_factor, AssessmentOutcome, AssessmentProcessor};
use crate::config::EngineConfig;
use crate::diffusion::{compute_laplacian, DiffusionEngine, DiffusionSummary, Laplacian};
use crate::error::KnowledgeResult;
use crate::graph::ConceptGraph;
use crate::model::{KnowledgeLevel, UserKnowledgeState};
use crate::statistics::{self, LeaderboardEntry, UserStats, UserView};
use crate::store::{KnowledgeStateStore, UserStates};
use crate::traits::{NoopSink, StateSink};

/// The knowledge diffusion engine.
pub struct KnowledgeEngine {
    store: KnowledgeStateStore,
    processor: AssessmentProcessor,
    diffusion: DiffusionEngine,
    config: EngineConfig,
    sink: Arc<dyn StateSink>,
}

impl KnowledgeEngine {
    /// Build an engine over `graph`, rejecting an out-of-range alpha or
    /// decay factor.
    pub fn new(graph: Arc<ConceptGraph>, config: EngineConfig) -> KnowledgeResult<Self> {
        validate_decay_factor(config.decay_factor)?;
        let diffusion = DiffusionEngine::new(config.alpha)?;
        let processor = AssessmentProcessor::new(config.decay_factor, config.propagation_depth);
        Ok(Self {
            store: KnowledgeStateStore::new(graph),
            processor,
            diffusion,
            config,
            sink: Arc::new(NoopSink),
        })
    }

    /// Mirror every written row into `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn StateSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn graph(&self) -> &Arc<ConceptGraph> {
        self.store.graph()
    }

    pub fn store(&self) -> &KnowledgeStateStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply one assessment result (0, 0.5 or 1) for a user.
    pub fn process_assessment(
        &self,
        user_id: &str,
        node_id: &str,
        result: f64,
    ) -> KnowledgeResult<AssessmentOutcome> {
        self.process_assessment_at(user_id, node_id, result, Utc::now())
    }

    /// [`process_assessment`](Self::process_assessment) with an explicit clock.
    ///
    /// The result and node are validated before the user's map is touched.
    /// When `diffuse_after_assessment` is set, one pass at the configured
    /// alpha follows under the same lock, and `updated_state` reflects the
    /// row as it stands after that pass.
    pub fn process_assessment_at(
        &self,
        user_id: &str,
        node_id: &str,
        result: f64,
        now: DateTime<Utc>,
    ) -> KnowledgeResult<AssessmentOutcome> {
        let result = KnowledgeLevel::try_from(result)?;
        let graph = Arc::clone(self.graph());
        graph.require(node_id)?;

        self.store.with_user(user_id, |states| {
            let mut outcome = self.processor.process(&graph, states, node_id, result, now)?;
            self.emit(states, std::iter::once(node_id));
            self.emit(states, outcome.propagated.iter().map(|p| p.node_id.as_str()));

            if self.config.diffuse_after_assessment {
                let summary = self.diffusion.run_pass(&graph, states, now);
                self.emit(states, summary.written.iter().map(String::as_str));
                if let Some(state) = states.get(node_id) {
                    outcome.updated_state = state.clone();
                }
                outcome.diffusion = Some(summary);
            }
            Ok(outcome)
        })?
    }

    /// Run one global diffusion pass for a user.
    pub fn run_diffusion_pass(&self, user_id: &str, alpha: f64) -> KnowledgeResult<DiffusionSummary> {
        self.run_diffusion_pass_at(user_id, alpha, Utc::now())
    }

    /// [`run_diffusion_pass`](Self::run_diffusion_pass) with an explicit clock.
    ///
    /// A user with no map gets a pass over an empty one, which writes
    /// nothing, so the user is not created.
    pub fn run_diffusion_pass_at(
        &self,
        user_id: &str,
        alpha: f64,
        now: DateTime<Utc>,
    ) -> KnowledgeResult<DiffusionSummary> {
        let engine = DiffusionEngine::new(alpha)?;
        let graph = Arc::clone(self.graph());

        let summary = self.store.with_existing_user(user_id, |states| {
            let summary = engine.run_pass(&graph, states, now);
            self.emit(states, summary.written.iter().map(String::as_str));
            summary
        })?;
        Ok(summary.unwrap_or_else(|| engine.run_pass(&graph, &mut UserStates::new(user_id), now)))
    }

    /// Current row for one (user, node) pair.
    pub fn state(&self, user_id: &str, node_id: &str) -> KnowledgeResult<Option<UserKnowledgeState>> {
        self.store.get(user_id, node_id)
    }

    /// Annotated node list and rollup for one user.
    pub fn user_view(&self, user_id: &str) -> KnowledgeResult<UserView> {
        self.user_view_at(user_id, Utc::now())
    }

    pub fn user_view_at(&self, user_id: &str, now: DateTime<Utc>) -> KnowledgeResult<UserView> {
        let graph = self.graph();
        self.store.inspect_user(user_id, |states| {
            statistics::build_user_view(graph, user_id, states, now)
        })
    }

    pub fn user_stats(&self, user_id: &str) -> KnowledgeResult<UserStats> {
        let graph = self.graph();
        self.store
            .inspect_user(user_id, |states| statistics::compute_user_stats(graph, states))
    }

    pub fn leaderboard(&self) -> KnowledgeResult<Vec<LeaderboardEntry>> {
        statistics::leaderboard(&self.store)
    }

    /// Laplacian of the loaded graph.
    pub fn laplacian(&self) -> Laplacian {
        let graph = self.graph();
        compute_laplacian(graph.nodes(), graph.edges())
    }

    fn emit<'a>(&self, states: &UserStates, node_ids: impl Iterator<Item = &'a str>) {
        for node_id in node_ids {
            if let Some(state) = states.get(node_id) {
                self.sink.on_row_written(state);
            }
        }
    }
}
