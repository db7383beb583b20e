//! Per-job control locks.
//!
//! Control operations (start, pause, resume, reset, reclaim) on the same job
//! run one at a time; different jobs never contend. The worker loop does not
//! take these locks: it is fenced by its lease instead.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use evalrun_core::JobId;

/// Slots are pruned once the registry grows past this many entries.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Default)]
pub struct JobLocks {
    slots: Mutex<HashMap<JobId, Arc<Mutex<()>>>>,
}

impl JobLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock slot for `job_id`, created on first use.
    pub fn slot(&self, job_id: JobId) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        if slots.len() > PRUNE_THRESHOLD {
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        }
        slots.entry(job_id).or_default().clone()
    }

    /// Run `f` while holding the lock for `job_id`.
    ///
    /// A poisoned lock (a panic inside an earlier control operation) is
    /// recovered: the protected state lives in the store, not in the mutex.
    pub fn with<T>(&self, job_id: JobId, f: impl FnOnce() -> T) -> T {
        let slot = self.slot(job_id);
        let _guard = slot.lock().unwrap_or_else(|p| p.into_inner());
        f()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
