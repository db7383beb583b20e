//! In-memory job store for tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use evalrun_core::{ExpectedVersion, JobId, JobRecord, JobStatus};

use super::{JobStore, StoreError};

#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Storage("job store lock poisoned".to_string())
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, mut job: JobRecord) -> Result<JobRecord, StoreError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id));
        }
        job.version = 1;
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    fn get(&self, job_id: JobId) -> Result<Option<JobRecord>, StoreError> {
        let jobs = self.jobs.read().map_err(poisoned)?;
        Ok(jobs.get(&job_id).cloned())
    }

    fn update(&self, job: &JobRecord, expected: ExpectedVersion) -> Result<JobRecord, StoreError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        let current = jobs.get_mut(&job.id).ok_or(StoreError::NotFound(job.id))?;
        if !expected.matches(current.version) {
            return Err(StoreError::Concurrency(format!(
                "job {} is at version {}, expected {:?}",
                job.id, current.version, expected
            )));
        }
        let mut next = job.clone();
        next.version = current.version + 1;
        *current = next.clone();
        Ok(next)
    }

    fn list_by_status(&self, statuses: &[JobStatus], limit: usize) -> Result<Vec<JobRecord>, StoreError> {
        let jobs = self.jobs.read().map_err(poisoned)?;
        let mut result: Vec<_> = jobs
            .values()
            .filter(|j| statuses.contains(&j.status))
            .cloned()
            .collect();

        result.sort_by_key(|j| j.created_at);
        result.truncate(limit);
        Ok(result)
    }
}
