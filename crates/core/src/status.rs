//! Job lifecycle states, the transition table, and the canonical string form.
//!
//! Every status/kind value that crosses a storage or cache boundary goes
//! through [`JobStatus::as_str`] / [`str::parse`] (and the `JobKind`
//! equivalents). Case and separator normalization, plus historical
//! spellings, are handled here and nowhere else.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Lifecycle state of a job.
///
/// ```text
/// PENDING ──start──▶ RUNNING ──▶ COMPLETED
///                      │  ▲
///               pause  │  │ loop begins
///                      ▼  │
///  FAILED ──reset──▶ PAUSED ──resume──▶ RESUMING
///    ▲                                     │
///    └──────────── fatal error ────────────┘ (also from RUNNING)
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum JobStatus {
    Pending,
    Running,
    Paused,
    Resuming,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Paused,
        JobStatus::Resuming,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    /// Canonical (stored) spelling.
    pub const fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Paused => "PAUSED",
            JobStatus::Resuming => "RESUMING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Failed)
                | (Paused, Resuming)
                | (Resuming, Running)
                | (Resuming, Paused)
                | (Resuming, Failed)
                | (Failed, Paused)
        )
    }

    /// A worker loop may be (or is about to be) driving the job.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Running | JobStatus::Resuming)
    }

    /// No outgoing edge without an operator action.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "PENDING" | "CREATED" => Ok(JobStatus::Pending),
            "RUNNING" | "IN_PROGRESS" | "GENERATING_ANSWERS" => Ok(JobStatus::Running),
            "PAUSED" => Ok(JobStatus::Paused),
            "RESUMING" => Ok(JobStatus::Resuming),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" | "ERROR" => Ok(JobStatus::Failed),
            _ => Err(DomainError::unrecognized("job status", s)),
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JobStatus> for String {
    fn from(value: JobStatus) -> Self {
        value.as_str().to_string()
    }
}

/// Kind of work a job performs.
///
/// Both kinds share the same lifecycle; the kind only routes a job to the
/// item source and executor registered for it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum JobKind {
    /// A batch generating model answers for every question of a dataset.
    AnswerGeneration,
    /// A run scoring previously generated answers.
    Evaluation,
}

impl JobKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            JobKind::AnswerGeneration => "ANSWER_GENERATION",
            JobKind::Evaluation => "EVALUATION",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "ANSWER_GENERATION" | "BATCH" => Ok(JobKind::AnswerGeneration),
            "EVALUATION" | "EVALUATION_RUN" | "RUN" => Ok(JobKind::Evaluation),
            _ => Err(DomainError::unrecognized("job kind", s)),
        }
    }
}

impl TryFrom<String> for JobKind {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JobKind> for String {
    fn from(value: JobKind) -> Self {
        value.as_str().to_string()
    }
}

/// Upper-case, trim, and fold `-` / whitespace into `_`.
fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' | '\t' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}
