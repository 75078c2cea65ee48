//! Seams to collaborators outside the engine.

use std::sync::Mutex;

use crate::model::UserKnowledgeState;

/// Receives every row the engine writes, one row at a time.
///
/// Rows are delivered while the owning user's lock is held, so a durable
/// mirror sees a diffusion pass row by row but never interleaved with another
/// operation for the same user.
pub trait StateSink: Send + Sync {
    fn on_row_written(&self, state: &UserKnowledgeState);
}

/// Discards every row.
pub struct NoopSink;

impl StateSink for NoopSink {
    fn on_row_written(&self, _: &UserKnowledgeState) {}
}

/// Keeps every written row in memory, in write order.
#[derive(Default)]
pub struct RecordingSink {
    rows: Mutex<Vec<UserKnowledgeState>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows received so far.
    pub fn rows(&self) -> Vec<UserKnowledgeState> {
        self.rows
            .lock()
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }
}

impl StateSink for RecordingSink {
    fn on_row_written(&self, state: &UserKnowledgeState) {
        if let Ok(mut rows) = self.rows.lock() {
            rows.push(state.clone());
        }
    }
}
