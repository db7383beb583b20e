//! Durable job record storage.
//!
//! The store is deliberately dumb: it persists whole `JobRecord`s guarded by
//! an optimistic version check. Every lifecycle rule lives in
//! `evalrun_core::JobRecord`; [`modify`] glues the two together with a
//! read-apply-write loop that retries on version conflicts.

use std::sync::Arc;

use evalrun_core::{ExpectedVersion, JobId, JobRecord, JobStatus};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryJobStore;
pub use postgres::PostgresJobStore;

/// How many times [`modify`] re-reads after losing a version race.
const MAX_MODIFY_ATTEMPTS: usize = 16;

/// Job store abstraction.
pub trait JobStore: Send + Sync {
    /// Persist a new record. The stored copy (with its initial version) is returned.
    fn insert(&self, job: JobRecord) -> Result<JobRecord, StoreError>;

    /// Get a job by ID.
    fn get(&self, job_id: JobId) -> Result<Option<JobRecord>, StoreError>;

    /// Replace a record if its stored version matches `expected`.
    ///
    /// Returns the stored copy with the bumped version.
    fn update(&self, job: &JobRecord, expected: ExpectedVersion) -> Result<JobRecord, StoreError>;

    /// List jobs in any of `statuses`, oldest first.
    fn list_by_status(&self, statuses: &[JobStatus], limit: usize) -> Result<Vec<JobRecord>, StoreError>;

    /// Get a job by ID, treating absence as an error.
    fn load(&self, job_id: JobId) -> Result<JobRecord, StoreError> {
        self.get(job_id)?.ok_or(StoreError::NotFound(job_id))
    }
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("concurrent modification: {0}")]
    Concurrency(String),
    #[error("stored record could not be decoded: {0}")]
    Decode(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Read the current record, apply `apply`, and write it back under a version
/// check, retrying from a fresh read when another writer got there first.
///
/// `apply` may run more than once and must not have side effects beyond the
/// record it is handed. Any error it returns aborts without writing.
pub fn modify<S, T, E, F>(store: &S, job_id: JobId, mut apply: F) -> Result<(JobRecord, T), E>
where
    S: JobStore + ?Sized,
    E: From<StoreError>,
    F: FnMut(&mut JobRecord) -> Result<T, E>,
{
    for _ in 0..MAX_MODIFY_ATTEMPTS {
        let current = store.load(job_id)?;
        let mut next = current.clone();
        let out = apply(&mut next)?;
        match store.update(&next, ExpectedVersion::Exact(current.version)) {
            Ok(stored) => return Ok((stored, out)),
            Err(StoreError::Concurrency(msg)) => {
                tracing::debug!(%job_id, reason = %msg, "version race on job record; retrying");
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(StoreError::Concurrency(format!(
        "gave up on job {job_id} after {MAX_MODIFY_ATTEMPTS} version conflicts"
    ))
    .into())
}

impl<S> JobStore for Arc<S>
where
    S: JobStore + ?Sized,
{
    fn insert(&self, job: JobRecord) -> Result<JobRecord, StoreError> {
        (**self).insert(job)
    }

    fn get(&self, job_id: JobId) -> Result<Option<JobRecord>, StoreError> {
        (**self).get(job_id)
    }

    fn update(&self, job: &JobRecord, expected: ExpectedVersion) -> Result<JobRecord, StoreError> {
        (**self).update(job, expected)
    }

    fn list_by_status(&self, statuses: &[JobStatus], limit: usize) -> Result<Vec<JobRecord>, StoreError> {
        (**self).list_by_status(statuses, limit)
    }
}
