//! Control surface for answer-generation batches and evaluation runs.
//!
//! Every control operation runs under the job's entry in [`JobLocks`],
//! validates against the durable record, writes it through a version-checked
//! transition, and only then touches the cache and spawns or signals loops.
//! Guard failures come back as [`OrchestratorError::StateConflict`] and leave
//! the job untouched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use evalrun_core::{
    DomainError, JobId, JobKind, JobRecord, JobStatus, JobStatusView, LeaseToken, STALLED_PAUSE_REASON,
};
use evalrun_events::{JobEvent, JobEventKind, Notifier};

use crate::cache::{CacheError, KeyValueCache, StatusCache};
use crate::config::EngineConfig;
use crate::executor::ItemExecutor;
use crate::locks::JobLocks;
use crate::reconciler::Reconciler;
use crate::source::WorkItemSource;
use crate::store::{self, JobStore, StoreError};
use crate::worker::{JobWorker, WorkerExit, WorkerHandle};

/// Upper bound on jobs scanned by stall detection.
const STALL_SCAN_LIMIT: usize = 10_000;

/// Orchestrator error.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("cannot {operation} job {job_id} while it is {status}")]
    StateConflict {
        job_id: JobId,
        status: JobStatus,
        operation: &'static str,
    },
    #[error("no item source/executor registered for job kind {0}")]
    NoHandler(JobKind),
    #[error("job store error: {0}")]
    Store(StoreError),
    #[error("status cache error: {0}")]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Domain(DomainError),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

impl From<StoreError> for OrchestratorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(job_id) => OrchestratorError::NotFound(job_id),
            other => OrchestratorError::Store(other),
        }
    }
}

impl OrchestratorError {
    /// Translate a rejected transition into the caller-facing error.
    fn rejected(job_id: JobId, status: JobStatus, operation: &'static str, err: DomainError) -> Self {
        match err {
            DomainError::IllegalTransition { .. }
            | DomainError::Conflict(_)
            | DomainError::LeaseSuperseded => OrchestratorError::StateConflict {
                job_id,
                status,
                operation,
            },
            other => OrchestratorError::Domain(other),
        }
    }

    pub fn is_state_conflict(&self) -> bool {
        matches!(self, OrchestratorError::StateConflict { .. })
    }
}

#[derive(Clone)]
struct Handlers {
    source: Arc<dyn WorkItemSource>,
    executor: Arc<dyn ItemExecutor>,
}

/// Starts, pauses, resumes and resets jobs; owns their worker threads.
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    cache: StatusCache,
    reconciler: Reconciler,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
    handlers: RwLock<HashMap<JobKind, Handlers>>,
    locks: JobLocks,
    workers: Mutex<HashMap<JobId, WorkerHandle>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        cache: Arc<dyn KeyValueCache>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        let cache = StatusCache::new(cache, config.cache_key_prefix.clone(), config.cache_ttl);
        Self {
            reconciler: Reconciler::new(store.clone(), cache.clone()),
            store,
            cache,
            notifier,
            config,
            handlers: RwLock::new(HashMap::new()),
            locks: JobLocks::new(),
            workers: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Route jobs of `kind` to `source` and `executor`. Replaces any earlier
    /// registration for the kind.
    pub fn register(
        &self,
        kind: JobKind,
        source: Arc<dyn WorkItemSource>,
        executor: Arc<dyn ItemExecutor>,
    ) {
        let mut handlers = self.handlers.write().unwrap_or_else(|p| p.into_inner());
        handlers.insert(kind, Handlers { source, executor });
    }

    /// Persist a new PENDING job.
    pub fn submit(&self, job: JobRecord) -> Result<JobStatusView, OrchestratorError> {
        if job.status != JobStatus::Pending {
            return Err(OrchestratorError::StateConflict {
                job_id: job.id,
                status: job.status,
                operation: "submit",
            });
        }
        let stored = self.store.insert(job)?;
        self.mirror_status(stored.id, stored.status);
        info!(job_id = %stored.id, kind = %stored.kind, total = stored.total_count, "job submitted");
        Ok(stored.view())
    }

    /// PENDING -> RUNNING: issue a lease and spawn the worker loop.
    pub fn start(&self, job_id: JobId) -> Result<JobStatusView, OrchestratorError> {
        self.locks.with(job_id, || -> Result<JobStatusView, OrchestratorError> {
            let current = self.reconciler.reconcile(job_id)?.record;
            let handlers = self.handlers_for(current.kind)?;

            let lease = LeaseToken::new();
            let job = self.transition(job_id, "start", |j| j.start(lease, Utc::now()))?;

            self.clear_interrupt(job_id);
            self.mirror_status(job_id, JobStatus::Running);
            self.notifier.publish(JobEvent::snapshot(JobEventKind::Started, &job));
            self.spawn_worker(&job, lease, handlers)?;

            info!(%job_id, %lease, total = job.total_count, "job started");
            Ok(job.view())
        })
    }

    /// Ask a RUNNING/RESUMING job to stop after its current item.
    ///
    /// Returns once the request is recorded; the loop performs
    /// RUNNING -> PAUSED asynchronously (use [`Orchestrator::wait`] to block).
    pub fn pause(&self, job_id: JobId, reason: &str) -> Result<JobStatusView, OrchestratorError> {
        self.locks.with(job_id, || -> Result<JobStatusView, OrchestratorError> {
            let current = self.reconciler.reconcile(job_id)?.record;
            if !current.status.is_active() {
                return Err(OrchestratorError::StateConflict {
                    job_id,
                    status: current.status,
                    operation: "pause",
                });
            }

            // Durable request first: once the flag is up the loop may stop at
            // any moment, and the reason must already be on the record.
            let reason = if reason.trim().is_empty() { "paused" } else { reason };
            let job = self.transition(job_id, "pause", |j| j.record_pause_request(reason))?;

            if let Err(err) = self.cache.set_interrupt(job_id, true) {
                warn!(%job_id, error = %err, "could not raise interrupt flag; loop will see the durable request");
            }
            // The loop may have finished its last item in between; a
            // completed or failed job must not keep a raised flag.
            if self.store.load(job_id)?.status.is_terminal() {
                self.clear_interrupt(job_id);
            }

            info!(%job_id, reason, "pause requested");
            Ok(job.view())
        })
    }

    /// PAUSED -> RESUMING: issue a new lease and spawn a loop that continues
    /// after the checkpoint.
    pub fn resume(&self, job_id: JobId) -> Result<JobStatusView, OrchestratorError> {
        self.locks.with(job_id, || -> Result<JobStatusView, OrchestratorError> {
            let current = self.reconciler.reconcile(job_id)?.record;
            if current.status != JobStatus::Paused {
                return Err(OrchestratorError::StateConflict {
                    job_id,
                    status: current.status,
                    operation: "resume",
                });
            }
            let handlers = self.handlers_for(current.kind)?;
            self.settle_previous_worker(&current);

            let lease = LeaseToken::new();
            let job = self.transition(job_id, "resume", |j| j.begin_resume(lease, Utc::now()))?;

            self.clear_interrupt(job_id);
            self.mirror_status(job_id, JobStatus::Resuming);
            self.notifier.publish(JobEvent::snapshot(JobEventKind::Resumed, &job));
            self.spawn_worker(&job, lease, handlers)?;

            info!(
                %job_id,
                %lease,
                checkpoint = ?job.checkpoint,
                resume_count = job.resume_count,
                "job resumed"
            );
            Ok(job.view())
        })
    }

    /// FAILED -> PAUSED. Counters and checkpoint are kept; an explicit
    /// [`Orchestrator::resume`] continues the job.
    pub fn reset_failed(&self, job_id: JobId) -> Result<JobStatusView, OrchestratorError> {
        self.locks.with(job_id, || -> Result<JobStatusView, OrchestratorError> {
            let current = self.reconciler.reconcile(job_id)?.record;
            if current.status == JobStatus::Failed {
                self.settle_previous_worker(&current);
            }
            let job = self.transition(job_id, "reset", |j| j.reset_failed(Utc::now()))?;

            if let Err(err) = self.cache.set_interrupt(job_id, true) {
                warn!(%job_id, error = %err, "could not raise interrupt flag");
            }
            self.mirror_status(job_id, JobStatus::Paused);

            info!(%job_id, checkpoint = ?job.checkpoint, "failed job reset to paused");
            self.notifier.publish(JobEvent::snapshot(JobEventKind::Reset, &job));
            Ok(job.view())
        })
    }

    /// Current state of a job, after healing any cache drift.
    ///
    /// Runs under the job's control lock: healing writes to the cache, and a
    /// concurrent resume must not see them land after it cleared the flag.
    pub fn get_status(&self, job_id: JobId) -> Result<JobStatusView, OrchestratorError> {
        self.locks.with(job_id, || -> Result<JobStatusView, OrchestratorError> {
            let reconciled = self.reconciler.reconcile(job_id)?;
            Ok(reconciled.record.view())
        })
    }

    /// RUNNING/RESUMING jobs with no recorded activity within `threshold`.
    pub fn list_stalled(&self, threshold: Duration) -> Result<Vec<JobStatusView>, OrchestratorError> {
        let threshold = to_chrono(threshold);
        let now = Utc::now();
        let active = self
            .store
            .list_by_status(&[JobStatus::Running, JobStatus::Resuming], STALL_SCAN_LIMIT)?;
        Ok(active
            .iter()
            .filter(|j| j.is_stalled(now, threshold))
            .map(JobRecord::view)
            .collect())
    }

    /// [`Orchestrator::list_stalled`] with the configured threshold.
    pub fn list_stalled_default(&self) -> Result<Vec<JobStatusView>, OrchestratorError> {
        self.list_stalled(self.config.stall_threshold)
    }

    /// Revoke the lease of a stalled job and park it in PAUSED so it can be
    /// resumed by a new loop. A still-running stale loop exits on its next write.
    pub fn reclaim_stalled(
        &self,
        job_id: JobId,
        threshold: Duration,
    ) -> Result<JobStatusView, OrchestratorError> {
        let threshold = to_chrono(threshold);
        self.locks.with(job_id, || -> Result<JobStatusView, OrchestratorError> {
            self.reconciler.reconcile(job_id)?;
            let job = self.transition(job_id, "reclaim", |j| {
                if !j.is_stalled(Utc::now(), threshold) {
                    return Err(DomainError::conflict("job is not stalled"));
                }
                j.reclaim(Utc::now())
            })?;

            if let Err(err) = self.cache.set_interrupt(job_id, true) {
                warn!(%job_id, error = %err, "could not raise interrupt flag");
            }
            self.mirror_status(job_id, JobStatus::Paused);

            warn!(%job_id, checkpoint = ?job.checkpoint, "stalled job reclaimed");
            self.notifier.publish(JobEvent::snapshot(JobEventKind::Paused, &job));
            Ok(job.view())
        })
    }

    /// Block until the job's most recent worker loop exits.
    ///
    /// `None` when no loop was spawned by this orchestrator (or it was
    /// already waited on) or the loop panicked.
    pub fn wait(&self, job_id: JobId) -> Option<WorkerExit> {
        let handle = {
            let mut workers = self.workers.lock().unwrap_or_else(|p| p.into_inner());
            workers.remove(&job_id)
        };
        handle.and_then(WorkerHandle::join)
    }

    /// Number of retained worker loops still running.
    pub fn active_workers(&self) -> usize {
        let workers = self.workers.lock().unwrap_or_else(|p| p.into_inner());
        workers.values().filter(|h| !h.is_finished()).count()
    }

    fn handlers_for(&self, kind: JobKind) -> Result<Handlers, OrchestratorError> {
        let handlers = self.handlers.read().unwrap_or_else(|p| p.into_inner());
        handlers
            .get(&kind)
            .cloned()
            .ok_or(OrchestratorError::NoHandler(kind))
    }

    fn transition(
        &self,
        job_id: JobId,
        operation: &'static str,
        mut apply: impl FnMut(&mut JobRecord) -> Result<(), DomainError>,
    ) -> Result<JobRecord, OrchestratorError> {
        let (job, ()) = store::modify(&*self.store, job_id, |j| {
            let status = j.status;
            apply(j).map_err(|e| OrchestratorError::rejected(job_id, status, operation, e))
        })?;
        Ok(job)
    }

    fn spawn_worker(
        &self,
        job: &JobRecord,
        lease: LeaseToken,
        handlers: Handlers,
    ) -> Result<(), OrchestratorError> {
        let worker = JobWorker {
            job_id: job.id,
            lease,
            store: self.store.clone(),
            cache: self.cache.clone(),
            source: handlers.source,
            executor: handlers.executor,
            notifier: self.notifier.clone(),
            config: self.config.clone(),
        };
        let handle = match worker.spawn() {
            Ok(handle) => handle,
            Err(err) => {
                // The lease is recorded but nothing holds it: hand the job back.
                let message = format!("failed to spawn worker thread: {err}");
                if let Err(fail_err) = store::modify(&*self.store, job.id, |j| {
                    j.fail(&lease, message.as_str(), Utc::now()).map_err(OrchestratorError::Domain)
                }) {
                    warn!(job_id = %job.id, error = %fail_err, "could not fail job after spawn error");
                } else {
                    self.mirror_status(job.id, JobStatus::Failed);
                }
                return Err(OrchestratorError::Spawn(err.to_string()));
            }
        };

        let mut workers = self.workers.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(previous) = workers.insert(job.id, handle) {
            debug!(job_id = %job.id, lease = %previous.lease(), "replaced handle of previous worker");
        }
        Ok(())
    }

    /// Wait for the job's previous loop to finish its post-stop cache writes
    /// so they cannot land on top of the ones this operation makes.
    ///
    /// A reclaimed loop may still be stuck in an item call; it is detached
    /// instead (it exits without writing once it wakes up).
    fn settle_previous_worker(&self, job: &JobRecord) {
        let previous = {
            let mut workers = self.workers.lock().unwrap_or_else(|p| p.into_inner());
            workers.remove(&job.id)
        };
        let Some(handle) = previous else {
            return;
        };
        if !handle.is_finished() && job.pause_reason.as_deref() == Some(STALLED_PAUSE_REASON) {
            warn!(job_id = %job.id, lease = %handle.lease(), "detaching reclaimed worker that is still running");
            return;
        }
        let exit = handle.join();
        debug!(job_id = %job.id, exit = ?exit, "previous worker settled");
    }

    fn clear_interrupt(&self, job_id: JobId) {
        if let Err(err) = self.cache.set_interrupt(job_id, false) {
            warn!(%job_id, error = %err, "could not clear interrupt flag");
        }
    }

    fn mirror_status(&self, job_id: JobId, status: JobStatus) {
        if let Err(err) = self.cache.set_status(job_id, status) {
            warn!(%job_id, %status, error = %err, "could not mirror status to cache");
        }
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}
