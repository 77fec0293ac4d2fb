//! Correlation identifier lifecycle
//!
//! `task_id` and `context_id` are created lazily on the first dispatch of an
//! orchestration task and reused by every later dispatch that shares the same
//! state. A `message_id` is minted fresh for every outbound message.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The three identifiers attached to one outbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationTriple {
    pub task_id: String,
    pub context_id: String,
    pub message_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StableIds {
    task_id: Option<String>,
    context_id: Option<String>,
}

/// Session-scoped correlation state.
///
/// Internally synchronized so concurrent dispatches issued within one turn
/// agree on a single task/context pair.
#[derive(Debug, Default)]
pub struct CorrelationState {
    ids: Mutex<StableIds>,
}

impl CorrelationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the state with existing identifiers
    pub fn with_ids(task_id: impl Into<String>, context_id: impl Into<String>) -> Self {
        Self {
            ids: Mutex::new(StableIds {
                task_id: Some(task_id.into()),
                context_id: Some(context_id.into()),
            }),
        }
    }

    pub fn task_id(&self) -> Option<String> {
        self.ids.lock().task_id.clone()
    }

    pub fn context_id(&self) -> Option<String> {
        self.ids.lock().context_id.clone()
    }

    /// Get-or-create the stable ids and mint a fresh message id
    pub fn next(&self) -> CorrelationTriple {
        let mut ids = self.ids.lock();
        let task_id = ids.task_id.get_or_insert_with(new_id).clone();
        let context_id = ids.context_id.get_or_insert_with(new_id).clone();

        CorrelationTriple {
            task_id,
            context_id,
            message_id: new_id(),
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}
