use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use evalrun_core::{JobId, JobRecord};

/// Lifecycle or progress notification type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    Started,
    Progress,
    Paused,
    Resumed,
    Completed,
    Failed,
    Reset,
}

impl JobEventKind {
    /// Stable event name (e.g. "job.paused").
    pub fn event_type(&self) -> &'static str {
        match self {
            JobEventKind::Started => "job.started",
            JobEventKind::Progress => "job.progress",
            JobEventKind::Paused => "job.paused",
            JobEventKind::Resumed => "job.resumed",
            JobEventKind::Completed => "job.completed",
            JobEventKind::Failed => "job.failed",
            JobEventKind::Reset => "job.reset",
        }
    }

    /// The job reached COMPLETED or FAILED; no further events follow unless
    /// it is reset.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEventKind::Completed | JobEventKind::Failed)
    }
}

/// A lifecycle event for one job.
///
/// Events are facts about a job at the moment they were emitted; they are
/// never used to reconstruct state (the durable record is the source of
/// truth).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    event_id: Uuid,
    job_id: JobId,
    kind: JobEventKind,
    occurred_at: DateTime<Utc>,
    payload: serde_json::Value,
}

impl JobEvent {
    pub fn new(job_id: JobId, kind: JobEventKind, payload: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            job_id,
            kind,
            occurred_at: Utc::now(),
            payload,
        }
    }

    /// Event carrying the counters and progress of `job`.
    pub fn snapshot(kind: JobEventKind, job: &JobRecord) -> Self {
        let payload = serde_json::json!({
            "status": job.status,
            "kind": job.kind,
            "checkpoint": job.checkpoint,
            "total_count": job.total_count,
            "completed_count": job.completed_count,
            "failed_count": job.failed_count,
            "progress_percentage": job.progress_percentage,
            "resume_count": job.resume_count,
            "pause_reason": job.pause_reason,
            "error_message": job.error_message,
        });
        Self::new(job.id, kind, payload)
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn kind(&self) -> JobEventKind {
        self.kind
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }
}
