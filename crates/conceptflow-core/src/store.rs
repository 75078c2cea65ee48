//! Per-user knowledge-state store.
//!
//! Each user owns an independent [`UserStates`] map behind its own mutex.
//! All mutation for one user goes through [`KnowledgeStateStore::with_user`],
//! which holds that user's lock for the whole closure; disjoint users only
//! share the brief registry lookup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};

use crate::error::{KnowledgeError, KnowledgeResult};
use crate::graph::ConceptGraph;
use crate::model::{continuous_knowledge, KnowledgeLevel, UserKnowledgeState};

/// One user's node id -> state map.
#[derive(Debug, Clone, Default)]
pub struct UserStates {
    user_id: String,
    states: HashMap<String, UserKnowledgeState>,
}

impl UserStates {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            states: HashMap::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn get(&self, node_id: &str) -> Option<&UserKnowledgeState> {
        self.states.get(node_id)
    }

    /// Stored level, or unknown when the node has no row yet.
    pub fn level(&self, node_id: &str) -> KnowledgeLevel {
        self.get(node_id)
            .map(|s| s.knowledge_state)
            .unwrap_or_default()
    }

    /// Confidence-blended value; 0 when the node has no row yet.
    pub fn continuous(&self, node_id: &str) -> f64 {
        continuous_knowledge(self.get(node_id))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserKnowledgeState> {
        self.states.values()
    }

    /// Quantize `value`, clamp `confidence`, and upsert the row.
    ///
    /// `first_known_at` is stamped the first time the row becomes known and
    /// is carried over unchanged by every later write.
    pub fn upsert(
        &mut self,
        node_id: &str,
        value: f64,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> &UserKnowledgeState {
        let level = KnowledgeLevel::quantize(value);
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let previous_first_known = self.states.get(node_id).and_then(|s| s.first_known_at);
        let first_known_at = match previous_first_known {
            Some(at) => Some(at),
            None if level == KnowledgeLevel::Known => Some(now),
            None => None,
        };

        let state = UserKnowledgeState {
            user_id: self.user_id.clone(),
            node_id: node_id.to_string(),
            knowledge_state: level,
            confidence,
            last_updated: now,
            first_known_at,
        };
        self.states.insert(node_id.to_string(), state);
        &self.states[node_id]
    }
}

/// Registry of every user's knowledge states for one concept graph.
#[derive(Debug)]
pub struct KnowledgeStateStore {
    graph: Arc<ConceptGraph>,
    users: RwLock<HashMap<String, Arc<Mutex<UserStates>>>>,
}

impl KnowledgeStateStore {
    pub fn new(graph: Arc<ConceptGraph>) -> Self {
        Self {
            graph,
            users: RwLock::new(HashMap::new()),
        }
    }

    pub fn graph(&self) -> &Arc<ConceptGraph> {
        &self.graph
    }

    /// Current state of one (user, node) pair.
    pub fn get(&self, user_id: &str, node_id: &str) -> KnowledgeResult<Option<UserKnowledgeState>> {
        self.graph.require(node_id)?;
        self.inspect_user(user_id, |states| {
            states.and_then(|s| s.get(node_id).cloned())
        })
    }

    /// Quantize and upsert one row, stamped with the current time.
    pub fn set(
        &self,
        user_id: &str,
        node_id: &str,
        value: f64,
        confidence: f64,
    ) -> KnowledgeResult<UserKnowledgeState> {
        self.set_at(user_id, node_id, value, confidence, Utc::now())
    }

    /// [`set`](Self::set) with an explicit timestamp.
    pub fn set_at(
        &self,
        user_id: &str,
        node_id: &str,
        value: f64,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> KnowledgeResult<UserKnowledgeState> {
        self.graph.require(node_id)?;
        self.with_user(user_id, |states| {
            states.upsert(node_id, value, confidence, now).clone()
        })
    }

    /// Run `f` with exclusive access to one user's map, creating it lazily.
    pub fn with_user<R>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut UserStates) -> R,
    ) -> KnowledgeResult<R> {
        let handle = self.handle(user_id)?;
        let mut states = handle
            .lock()
            .map_err(|_| KnowledgeError::StateLockPoisoned(user_id.to_string()))?;
        Ok(f(&mut states))
    }

    /// Run `f` with exclusive access to one user's map, if it exists.
    ///
    /// Returns `None` without calling `f` when the user has never been
    /// written.
    pub fn with_existing_user<R>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut UserStates) -> R,
    ) -> KnowledgeResult<Option<R>> {
        let handle = {
            let users = self
                .users
                .read()
                .map_err(|_| KnowledgeError::StateLockPoisoned(user_id.to_string()))?;
            users.get(user_id).cloned()
        };
        let Some(handle) = handle else {
            return Ok(None);
        };
        let mut states = handle
            .lock()
            .map_err(|_| KnowledgeError::StateLockPoisoned(user_id.to_string()))?;
        Ok(Some(f(&mut states)))
    }

    /// Run `f` against one user's map without creating it.
    ///
    /// `f` receives `None` when the user has never been written.
    pub fn inspect_user<R>(
        &self,
        user_id: &str,
        f: impl FnOnce(Option<&UserStates>) -> R,
    ) -> KnowledgeResult<R> {
        let handle = {
            let users = self
                .users
                .read()
                .map_err(|_| KnowledgeError::StateLockPoisoned(user_id.to_string()))?;
            users.get(user_id).cloned()
        };
        match handle {
            Some(handle) => {
                let states = handle
                    .lock()
                    .map_err(|_| KnowledgeError::StateLockPoisoned(user_id.to_string()))?;
                Ok(f(Some(&states)))
            }
            None => Ok(f(None)),
        }
    }

    /// Clone of one user's map, if the user exists.
    pub fn snapshot(&self, user_id: &str) -> KnowledgeResult<Option<UserStates>> {
        self.inspect_user(user_id, |states| states.cloned())
    }

    /// Every user with a map, sorted.
    pub fn user_ids(&self) -> KnowledgeResult<Vec<String>> {
        let users = self
            .users
            .read()
            .map_err(|_| KnowledgeError::StateLockPoisoned("*".to_string()))?;
        let mut ids: Vec<String> = users.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn handle(&self, user_id: &str) -> KnowledgeResult<Arc<Mutex<UserStates>>> {
        {
            let users = self
                .users
                .read()
                .map_err(|_| KnowledgeError::StateLockPoisoned(user_id.to_string()))?;
            if let Some(handle) = users.get(user_id) {
                return Ok(Arc::clone(handle));
            }
        }
        let mut users = self
            .users
            .write()
            .map_err(|_| KnowledgeError::StateLockPoisoned(user_id.to_string()))?;
        let handle = users
            .entry(user_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(user_id, "creating knowledge state map");
                Arc::new(Mutex::new(UserStates::new(user_id)))
            });
        Ok(Arc::clone(handle))
    }
}
