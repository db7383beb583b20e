//! The durable job record and its lifecycle transitions.
//!
//! `JobRecord` methods are pure: they validate a transition against the state
//! machine and the lease, then mutate the record in place. Persisting the
//! result (with an optimistic version check) is the caller's job.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{JobId, LeaseToken};
use crate::item::{ItemOutcome, ItemTally};
use crate::status::{JobKind, JobStatus};

/// Pause reason recorded when a failed job is reset.
pub const RESET_PAUSE_REASON: &str = "reset after failure";

/// Pause reason recorded when a stalled job's lease is reclaimed.
pub const STALLED_PAUSE_REASON: &str = "stalled";

/// Authoritative, persisted state of a batch or run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    /// Position of the last fully-processed item; `None` before the first.
    pub checkpoint: Option<u64>,
    pub total_count: u64,
    pub completed_count: u64,
    pub failed_count: u64,
    pub progress_percentage: f64,
    pub resume_count: u32,
    pub pause_reason: Option<String>,
    pub pause_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub owner_lease: Option<LeaseToken>,
    /// Durable mirror of the cache interrupt flag.
    pub interrupt_requested: bool,
    pub last_activity_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Incremented by the store on every successful write.
    pub version: u64,
}

impl JobRecord {
    /// Create a PENDING job over `total_count` work items.
    pub fn new(kind: JobKind, total_count: u64) -> Self {
        Self {
            id: JobId::new(),
            kind,
            status: JobStatus::Pending,
            checkpoint: None,
            total_count,
            completed_count: 0,
            failed_count: 0,
            progress_percentage: 0.0,
            resume_count: 0,
            pause_reason: None,
            pause_time: None,
            error_message: None,
            owner_lease: None,
            interrupt_requested: false,
            last_activity_time: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            version: 0,
        }
    }

    pub fn with_id(mut self, id: JobId) -> Self {
        self.id = id;
        self
    }

    pub fn processed_count(&self) -> u64 {
        self.completed_count + self.failed_count
    }

    pub fn holds_lease(&self, lease: &LeaseToken) -> bool {
        self.owner_lease.as_ref() == Some(lease)
    }

    /// A RUNNING/RESUMING job with no recorded activity since `now - threshold`.
    pub fn is_stalled(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        if !self.status.is_active() {
            return false;
        }
        let last = self
            .last_activity_time
            .or(self.started_at)
            .unwrap_or(self.created_at);
        now - last > threshold
    }

    /// PENDING -> RUNNING under a freshly issued lease.
    pub fn start(&mut self, lease: LeaseToken, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_transition(JobStatus::Running)?;
        if self.status != JobStatus::Pending {
            return Err(DomainError::illegal(self.status, JobStatus::Running));
        }
        if self.owner_lease.is_some() {
            return Err(DomainError::conflict("job already has an owner lease"));
        }
        self.status = JobStatus::Running;
        self.owner_lease = Some(lease);
        self.interrupt_requested = false;
        self.started_at = Some(now);
        self.last_activity_time = Some(now);
        Ok(())
    }

    /// Remember why an operator asked the job to stop.
    ///
    /// The status is left alone: the loop performs RUNNING -> PAUSED once it
    /// observes the interrupt flag.
    pub fn record_pause_request(&mut self, reason: impl Into<String>) -> DomainResult<()> {
        if !self.status.is_active() {
            return Err(DomainError::illegal(self.status, JobStatus::Paused));
        }
        self.pause_reason = Some(reason.into());
        self.interrupt_requested = true;
        Ok(())
    }

    /// A pause has been asked for but not yet observed by the loop.
    pub fn pause_pending(&self) -> bool {
        self.status.is_active() && (self.interrupt_requested || self.pause_reason.is_some())
    }

    /// PAUSED -> RESUMING under a new lease.
    pub fn begin_resume(&mut self, lease: LeaseToken, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != JobStatus::Paused {
            return Err(DomainError::illegal(self.status, JobStatus::Resuming));
        }
        self.status = JobStatus::Resuming;
        self.resume_count += 1;
        self.owner_lease = Some(lease);
        self.interrupt_requested = false;
        self.pause_reason = None;
        self.pause_time = None;
        self.last_activity_time = Some(now);
        Ok(())
    }

    /// RESUMING -> RUNNING once the resumed loop is live. No-op if already RUNNING.
    pub fn enter_running(&mut self, lease: &LeaseToken, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_lease(lease)?;
        match self.status {
            JobStatus::Running => Ok(()),
            JobStatus::Resuming => {
                self.status = JobStatus::Running;
                self.last_activity_time = Some(now);
                Ok(())
            }
            other => Err(DomainError::illegal(other, JobStatus::Running)),
        }
    }

    /// Count one processed item and optionally move the checkpoint onto it.
    pub fn record_item(
        &mut self,
        lease: &LeaseToken,
        position: u64,
        outcome: &ItemOutcome,
        advance_checkpoint: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_running(lease)?;
        if self.processed_count() >= self.total_count {
            return Err(DomainError::invariant(format!(
                "processed count would exceed total of {}",
                self.total_count
            )));
        }
        if outcome.is_success() {
            self.completed_count += 1;
        } else {
            self.failed_count += 1;
        }
        if advance_checkpoint {
            self.move_checkpoint(position);
        }
        self.progress_percentage = crate::progress::percentage(self.processed_count(), self.total_count);
        self.last_activity_time = Some(now);
        Ok(())
    }

    /// Move the checkpoint without touching counters (flushes, skipped items).
    pub fn advance_checkpoint(
        &mut self,
        lease: &LeaseToken,
        position: u64,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_running(lease)?;
        self.move_checkpoint(position);
        self.last_activity_time = Some(now);
        Ok(())
    }

    /// Adopt the item source's terminal tally when the counters drifted.
    pub fn heal_counters(&mut self, lease: &LeaseToken, tally: ItemTally) -> DomainResult<bool> {
        self.ensure_running(lease)?;
        if tally.processed() > self.total_count {
            return Err(DomainError::invariant(format!(
                "source reports {} processed items for a total of {}",
                tally.processed(),
                self.total_count
            )));
        }
        if tally.succeeded == self.completed_count && tally.failed == self.failed_count {
            return Ok(false);
        }
        self.completed_count = tally.succeeded;
        self.failed_count = tally.failed;
        self.progress_percentage = crate::progress::percentage(self.processed_count(), self.total_count);
        Ok(true)
    }

    /// RUNNING/RESUMING -> PAUSED after the loop observed the interrupt flag.
    pub fn pause_stopped(&mut self, lease: &LeaseToken, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_lease(lease)?;
        self.ensure_transition(JobStatus::Paused)?;
        self.status = JobStatus::Paused;
        self.pause_time = Some(now);
        self.pause_reason.get_or_insert_with(|| "paused".to_string());
        self.interrupt_requested = true;
        self.owner_lease = None;
        self.last_activity_time = Some(now);
        Ok(())
    }

    /// RUNNING -> COMPLETED once every item is terminal.
    pub fn complete(&mut self, lease: &LeaseToken, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_lease(lease)?;
        self.ensure_transition(JobStatus::Completed)?;
        if self.processed_count() != self.total_count {
            return Err(DomainError::invariant(format!(
                "cannot complete with {} of {} items processed",
                self.processed_count(),
                self.total_count
            )));
        }
        self.status = JobStatus::Completed;
        self.progress_percentage = 100.0;
        self.completed_at = Some(now);
        // A pause that arrived after the last item no longer applies.
        self.pause_reason = None;
        self.interrupt_requested = false;
        self.owner_lease = None;
        self.last_activity_time = Some(now);
        Ok(())
    }

    /// RUNNING/RESUMING -> FAILED. Checkpoint and counters are preserved.
    pub fn fail(
        &mut self,
        lease: &LeaseToken,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_lease(lease)?;
        self.ensure_transition(JobStatus::Failed)?;
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "job failed".to_string();
        }
        self.status = JobStatus::Failed;
        self.error_message = Some(message);
        self.owner_lease = None;
        self.last_activity_time = Some(now);
        Ok(())
    }

    /// FAILED -> PAUSED. The interrupt flag stays raised so an explicit
    /// resume is required.
    pub fn reset_failed(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != JobStatus::Failed {
            return Err(DomainError::illegal(self.status, JobStatus::Paused));
        }
        self.status = JobStatus::Paused;
        self.error_message = None;
        self.interrupt_requested = true;
        self.pause_reason = Some(RESET_PAUSE_REASON.to_string());
        self.pause_time = Some(now);
        self.owner_lease = None;
        Ok(())
    }

    /// Revoke the lease of a stalled RUNNING/RESUMING job and park it in PAUSED.
    pub fn reclaim(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.is_active() {
            return Err(DomainError::illegal(self.status, JobStatus::Paused));
        }
        self.status = JobStatus::Paused;
        self.owner_lease = None;
        self.interrupt_requested = true;
        self.pause_reason = Some(STALLED_PAUSE_REASON.to_string());
        self.pause_time = Some(now);
        Ok(())
    }

    /// Snapshot handed back to callers of `get_status`.
    pub fn view(&self) -> JobStatusView {
        JobStatusView {
            id: self.id,
            kind: self.kind,
            status: self.status,
            checkpoint: self.checkpoint,
            total_count: self.total_count,
            completed_count: self.completed_count,
            failed_count: self.failed_count,
            progress_percentage: self.progress_percentage,
            resume_count: self.resume_count,
            pause_reason: self.pause_reason.clone(),
            error_message: self.error_message.clone(),
            last_activity_time: self.last_activity_time,
        }
    }

    fn move_checkpoint(&mut self, position: u64) {
        // Never move backwards.
        self.checkpoint = Some(self.checkpoint.map_or(position, |cp| cp.max(position)));
    }

    fn ensure_transition(&self, to: JobStatus) -> DomainResult<()> {
        if self.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(DomainError::illegal(self.status, to))
        }
    }

    fn ensure_lease(&self, lease: &LeaseToken) -> DomainResult<()> {
        if self.holds_lease(lease) {
            Ok(())
        } else {
            Err(DomainError::LeaseSuperseded)
        }
    }

    fn ensure_running(&self, lease: &LeaseToken) -> DomainResult<()> {
        self.ensure_lease(lease)?;
        if self.status != JobStatus::Running {
            return Err(DomainError::invariant(format!(
                "items can only be recorded while RUNNING (status: {})",
                self.status
            )));
        }
        Ok(())
    }
}

/// Read model returned by status queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub checkpoint: Option<u64>,
    pub total_count: u64,
    pub completed_count: u64,
    pub failed_count: u64,
    pub progress_percentage: f64,
    pub resume_count: u32,
    pub pause_reason: Option<String>,
    pub error_message: Option<String>,
    pub last_activity_time: Option<DateTime<Utc>>,
}
