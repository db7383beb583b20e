//! The per-job worker loop.
//!
//! One OS thread per active job. The loop walks the job's items in position
//! order after the persisted checkpoint, executes each, records its outcome,
//! and writes counters (every item) and the checkpoint (every
//! `checkpoint_interval` items, and always on stop) through the lease-fenced
//! [`JobRecord`] transitions. Before every item it polls the interrupt flag
//! and, if set, parks the job in PAUSED without starting another item.

use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, info_span, warn};

use evalrun_core::{
    DomainError, DomainResult, ItemOutcome, JobId, JobRecord, JobStatus, LeaseToken, WorkItem,
};
use evalrun_events::{JobEvent, JobEventKind, Notifier};

use crate::cache::StatusCache;
use crate::config::EngineConfig;
use crate::executor::{ExecutionError, ItemExecutor};
use crate::source::WorkItemSource;
use crate::store::{self, JobStore, StoreError};

/// How a worker loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    Completed,
    Paused,
    Failed(String),
    /// The lease was revoked or reissued; the loop exited without writing.
    LeaseLost,
    /// The loop hit a fatal error and could not even record FAILED.
    Abandoned(String),
}

/// Retained handle to a spawned worker thread.
#[derive(Debug)]
pub struct WorkerHandle {
    job_id: JobId,
    lease: LeaseToken,
    join: Option<thread::JoinHandle<WorkerExit>>,
}

impl WorkerHandle {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn lease(&self) -> LeaseToken {
        self.lease
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }

    /// Block until the loop exits. `None` if the thread panicked.
    pub fn join(mut self) -> Option<WorkerExit> {
        self.join.take().and_then(|j| j.join().ok())
    }
}

/// Everything one loop needs; moved onto the worker thread.
pub(crate) struct JobWorker {
    pub job_id: JobId,
    pub lease: LeaseToken,
    pub store: Arc<dyn JobStore>,
    pub cache: StatusCache,
    pub source: Arc<dyn WorkItemSource>,
    pub executor: Arc<dyn ItemExecutor>,
    pub notifier: Arc<dyn Notifier>,
    pub config: EngineConfig,
}

#[derive(Debug)]
enum LoopError {
    LeaseLost,
    Fatal(String),
}

impl From<StoreError> for LoopError {
    fn from(err: StoreError) -> Self {
        LoopError::Fatal(format!("job store: {err}"))
    }
}

impl From<DomainError> for LoopError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::LeaseSuperseded => LoopError::LeaseLost,
            other => LoopError::Fatal(other.to_string()),
        }
    }
}

/// Where the loop is relative to the durable checkpoint.
#[derive(Debug, Default)]
struct Cursor {
    /// Last position handled by this loop (fetch pages start after it).
    after: Option<u64>,
    /// Handled position not yet written as the checkpoint.
    unflushed: Option<u64>,
    /// Items recorded since the checkpoint was last written.
    since_flush: u32,
}

impl Cursor {
    fn handled(&mut self, position: u64, flushed: bool) {
        self.after = Some(position);
        if flushed {
            self.unflushed = None;
            self.since_flush = 0;
        } else {
            self.unflushed = Some(position);
        }
    }
}

impl JobWorker {
    pub(crate) fn spawn(self) -> std::io::Result<WorkerHandle> {
        let job_id = self.job_id;
        let lease = self.lease;
        let join = thread::Builder::new()
            .name(format!("{}-{}", self.config.name, job_id))
            .spawn(move || self.run())?;

        Ok(WorkerHandle {
            job_id,
            lease,
            join: Some(join),
        })
    }

    fn run(self) -> WorkerExit {
        let span = info_span!("job_worker", job_id = %self.job_id, lease = %self.lease);
        let _entered = span.enter();
        info!("worker loop started");

        let mut cursor = Cursor::default();
        let exit = match self.drive(&mut cursor) {
            Ok(exit) => exit,
            Err(LoopError::LeaseLost) => {
                info!("lease superseded; exiting without writing");
                WorkerExit::LeaseLost
            }
            Err(LoopError::Fatal(message)) => self.fail(message, cursor.unflushed),
        };

        info!(exit = ?exit, "worker loop finished");
        exit
    }

    fn drive(&self, cursor: &mut Cursor) -> Result<WorkerExit, LoopError> {
        let current = self.store.load(self.job_id)?;
        if !current.holds_lease(&self.lease) {
            return Err(LoopError::LeaseLost);
        }
        // A pause that landed between resume and the first item: RESUMING -> PAUSED.
        if self.interrupted(&current) {
            return self.stop(cursor);
        }

        let (mut job, ()) = self.write(|j, now| j.enter_running(&self.lease, now))?;
        self.mirror_status(JobStatus::Running);
        cursor.after = job.checkpoint;
        debug!(checkpoint = ?job.checkpoint, total = job.total_count, "processing items");

        loop {
            let page = self
                .source
                .fetch_pending(self.job_id, cursor.after, self.config.fetch_batch_size)
                .map_err(|e| LoopError::Fatal(format!("fetching items: {e}")))?;
            if page.is_empty() {
                return self.finish(cursor);
            }

            for item in page {
                if self.interrupted(&job) {
                    return self.stop(cursor);
                }
                if item.is_terminal() {
                    debug!(position = item.position, "skipping item that already has an outcome");
                    cursor.handled(item.position, false);
                    continue;
                }
                job = self.process(&job, &item, cursor)?;
            }
        }
    }

    fn process(
        &self,
        job: &JobRecord,
        item: &WorkItem,
        cursor: &mut Cursor,
    ) -> Result<JobRecord, LoopError> {
        let position = item.position;
        let (outcome, detail) = match self.executor.execute(job, item) {
            Ok(output) => (ItemOutcome::Succeeded, output),
            Err(ExecutionError::Item(msg)) => {
                warn!(position, error = %msg, "item failed");
                let detail = serde_json::json!({ "error": msg });
                (ItemOutcome::failed(msg), detail)
            }
            Err(ExecutionError::Fatal(msg)) => {
                return Err(LoopError::Fatal(format!("item {position}: {msg}")));
            }
        };

        self.source
            .mark_result(self.job_id, item.id, outcome.clone(), detail)
            .map_err(|e| LoopError::Fatal(format!("recording item {position}: {e}")))?;

        let advance = cursor.since_flush + 1 >= self.config.checkpoint_interval;
        let (job, ()) =
            self.write(|j, now| j.record_item(&self.lease, position, &outcome, advance, now))?;
        cursor.since_flush += 1;
        cursor.handled(position, advance);

        debug!(
            position,
            succeeded = outcome.is_success(),
            completed = job.completed_count,
            failed = job.failed_count,
            progress = job.progress_percentage,
            "item recorded"
        );
        self.notifier
            .publish(JobEvent::snapshot(JobEventKind::Progress, &job));
        Ok(job)
    }

    /// Interrupt check before each item: the durable record we last wrote,
    /// then the cache flag, then (cache down) a fresh durable read.
    fn interrupted(&self, job: &JobRecord) -> bool {
        if job.pause_pending() {
            return true;
        }
        match self.cache.interrupt_requested(self.job_id) {
            Ok(flag) => flag,
            Err(err) => {
                warn!(error = %err, "interrupt flag unreadable; checking durable record");
                match self.store.load(self.job_id) {
                    Ok(current) => current.pause_pending() || !current.holds_lease(&self.lease),
                    Err(err) => {
                        warn!(error = %err, "durable record unreadable; continuing");
                        false
                    }
                }
            }
        }
    }

    fn stop(&self, cursor: &mut Cursor) -> Result<WorkerExit, LoopError> {
        let unflushed = cursor.unflushed;
        let (job, ()) = self.write(|j, now| {
            if let Some(position) = unflushed {
                j.advance_checkpoint(&self.lease, position, now)?;
            }
            j.pause_stopped(&self.lease, now)
        })?;
        cursor.unflushed = None;

        self.mirror_status(JobStatus::Paused);
        if let Err(err) = self.cache.set_interrupt(self.job_id, true) {
            warn!(error = %err, "could not mirror interrupt flag");
        }
        info!(
            checkpoint = ?job.checkpoint,
            reason = ?job.pause_reason,
            completed = job.completed_count,
            failed = job.failed_count,
            "job paused"
        );
        self.notifier.publish(JobEvent::snapshot(JobEventKind::Paused, &job));
        Ok(WorkerExit::Paused)
    }

    fn finish(&self, cursor: &mut Cursor) -> Result<WorkerExit, LoopError> {
        let tally = self
            .source
            .tally(self.job_id)
            .map_err(|e| LoopError::Fatal(format!("tallying items: {e}")))?;

        let unflushed = cursor.unflushed;
        let (job, healed) = self.write(|j, now| {
            if let Some(position) = unflushed {
                j.advance_checkpoint(&self.lease, position, now)?;
            }
            let healed = if j.processed_count() != j.total_count {
                j.heal_counters(&self.lease, tally)?
            } else {
                false
            };
            j.complete(&self.lease, now)?;
            Ok(healed)
        })?;
        cursor.unflushed = None;

        if healed {
            warn!(
                completed = job.completed_count,
                failed = job.failed_count,
                "counters drifted from item outcomes; adopted the source tally"
            );
        }
        self.mirror_status(JobStatus::Completed);
        if let Err(err) = self.cache.set_interrupt(self.job_id, false) {
            warn!(error = %err, "could not clear interrupt flag");
        }
        info!(
            completed = job.completed_count,
            failed = job.failed_count,
            resumes = job.resume_count,
            "job completed"
        );
        self.notifier
            .publish(JobEvent::snapshot(JobEventKind::Completed, &job));
        Ok(WorkerExit::Completed)
    }

    fn fail(&self, message: String, unflushed: Option<u64>) -> WorkerExit {
        error!(error = %message, "job failed");

        let result = self.write(|j, now| {
            if let Some(position) = unflushed {
                if j.status == JobStatus::Running {
                    j.advance_checkpoint(&self.lease, position, now)?;
                }
            }
            j.fail(&self.lease, message.as_str(), now)
        });

        match result {
            Ok((job, ())) => {
                self.mirror_status(JobStatus::Failed);
                self.notifier.publish(JobEvent::snapshot(JobEventKind::Failed, &job));
                WorkerExit::Failed(message)
            }
            Err(LoopError::LeaseLost) => {
                info!("lease superseded before the failure could be recorded");
                WorkerExit::LeaseLost
            }
            Err(LoopError::Fatal(err)) => {
                error!(error = %err, "could not record job failure");
                WorkerExit::Abandoned(err)
            }
        }
    }

    /// Lease-fenced read-modify-write of the durable record.
    fn write<T>(
        &self,
        mut apply: impl FnMut(&mut JobRecord, DateTime<Utc>) -> DomainResult<T>,
    ) -> Result<(JobRecord, T), LoopError> {
        store::modify(&*self.store, self.job_id, |j| {
            apply(j, Utc::now()).map_err(LoopError::from)
        })
    }

    fn mirror_status(&self, status: JobStatus) {
        if let Err(err) = self.cache.set_status(self.job_id, status) {
            warn!(%status, error = %err, "could not mirror status to cache");
        }
    }
}
