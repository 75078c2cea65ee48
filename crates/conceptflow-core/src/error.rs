//! Knowledge engine error types.
//!
//! These represent caller or input errors surfaced synchronously by graph
//! loading and by state operations. Nothing here is transient, so nothing is
//! retried.

use thiserror::Error;

/// Errors produced by the concept graph and the knowledge-state operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KnowledgeError {
    /// An edge references a node id that is not part of the graph.
    #[error("edge {source_id} -> {target_id} references unknown node: {missing}")]
    DanglingEdge {
        source_id: String,
        target_id: String,
        missing: String,
    },

    /// An edge points from a node to itself.
    #[error("self-loop on node: {0}")]
    SelfLoop(String),

    /// Two nodes share the same id.
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    /// An edge weight is not a finite value in [0, 1].
    #[error("edge {source_id} -> {target_id} has invalid weight {weight}")]
    InvalidWeight {
        source_id: String,
        target_id: String,
        weight: f64,
    },

    /// A state operation referenced a node the graph does not contain.
    #[error("no such node: {0}")]
    NoSuchNode(String),

    /// An assessment result outside {0, 0.5, 1}.
    #[error("invalid assessment result {0}, expected 0, 0.5 or 1")]
    InvalidResult(f64),

    /// A diffusion rate outside [0, 1].
    #[error("invalid diffusion alpha {0}, expected a value in [0, 1]")]
    InvalidAlpha(f64),

    /// A per-hop propagation decay outside [0, 1].
    #[error("invalid decay factor {0}, expected a value in [0, 1]")]
    InvalidDecayFactor(f64),

    /// Another operation panicked while holding this user's state lock.
    #[error("state lock poisoned for user: {0}")]
    StateLockPoisoned(String),
}

impl KnowledgeError {
    /// Returns `true` if the error was raised while loading the graph.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            KnowledgeError::DanglingEdge { .. }
                | KnowledgeError::SelfLoop(_)
                | KnowledgeError::DuplicateNode(_)
                | KnowledgeError::InvalidWeight { .. }
        )
    }
}

/// Result alias for knowledge engine operations.
pub type KnowledgeResult<T> = Result<T, KnowledgeError>;
