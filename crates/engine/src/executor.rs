//! The per-item operation a job performs (generate an answer, score one).

use evalrun_core::{JobRecord, WorkItem};

/// Output recorded alongside a successful item.
pub type ItemOutput = serde_json::Value;

/// Why executing an item did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// The item failed on its own; it is recorded as failed and the job continues.
    #[error("item failed: {0}")]
    Item(String),
    /// Nothing further can succeed (bad credentials, missing model, ...); the
    /// job moves to FAILED and the item stays unprocessed.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl ExecutionError {
    pub fn item(msg: impl Into<String>) -> Self {
        Self::Item(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }
}

/// Executes one work item.
///
/// Implementations must tolerate being called again for an item whose
/// outcome was never recorded (a crash or fatal error in between).
pub trait ItemExecutor: Send + Sync {
    fn execute(&self, job: &JobRecord, item: &WorkItem) -> Result<ItemOutput, ExecutionError>;
}

impl<F> ItemExecutor for F
where
    F: Fn(&JobRecord, &WorkItem) -> Result<ItemOutput, ExecutionError> + Send + Sync,
{
    fn execute(&self, job: &JobRecord, item: &WorkItem) -> Result<ItemOutput, ExecutionError> {
        self(job, item)
    }
}
