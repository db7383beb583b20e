//! Errors raised by the job state machine.

use thiserror::Error;

use crate::status::JobStatus;

pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic lifecycle failures. Storage and transport errors live in the
/// engine crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A status, kind or identifier string could not be parsed.
    #[error("unrecognized {what}: {value}")]
    Unrecognized { what: &'static str, value: String },

    /// Counters or the checkpoint would leave the job inconsistent.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("illegal transition {from} -> {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },

    /// The caller's lease is not the one recorded on the job.
    #[error("lease superseded")]
    LeaseSuperseded,

    /// The operation raced another writer or found the job in use.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn unrecognized(what: &'static str, value: impl Into<String>) -> Self {
        Self::Unrecognized {
            what,
            value: value.into(),
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn illegal(from: JobStatus, to: JobStatus) -> Self {
        Self::IllegalTransition { from, to }
    }
}
