//! Work items: the individually executable units a job is made of.

use serde::{Deserialize, Serialize};

use crate::id::ItemId;

/// Terminal outcome recorded for a work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    Succeeded,
    Failed { detail: String },
}

impl ItemOutcome {
    pub fn failed(detail: impl Into<String>) -> Self {
        Self::Failed {
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Succeeded)
    }
}

/// One unit of work (a question to answer, an answer to evaluate).
///
/// `position` is the item's place in the job's stable ordering; checkpoints
/// refer to positions, never to ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: ItemId,
    pub position: u64,
    /// Opaque input for the executor (question text, answer reference, ...).
    pub payload: serde_json::Value,
    /// `Some` once the item has been processed, by this or an earlier loop.
    pub outcome: Option<ItemOutcome>,
}

impl WorkItem {
    pub fn new(position: u64, payload: serde_json::Value) -> Self {
        Self {
            id: ItemId::new(),
            position,
            payload,
            outcome: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Terminal counts for a job as recorded by its item source.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTally {
    pub succeeded: u64,
    pub failed: u64,
}

impl ItemTally {
    pub fn processed(&self) -> u64 {
        self.succeeded + self.failed
    }
}
