//! Cache/durable store reconciliation.
//!
//! The durable record is authoritative for the status. The interrupt flag is
//! owned by the cache while a loop is active, and must read "set" whenever
//! the durable job is PAUSED so a stray loop can never keep going.

use std::sync::Arc;

use tracing::{debug, info, warn};

use evalrun_core::{JobId, JobRecord, JobStatus};

use crate::cache::StatusCache;
use crate::store::{JobStore, StoreError};

/// A disagreement between the cache and the durable record that was healed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
    /// The cache had no (readable) status; it was filled in.
    MissingStatus { durable: JobStatus },
    /// The cache disagreed with the durable status; it was overwritten.
    StatusMismatch { cached: JobStatus, durable: JobStatus },
    /// A PAUSED job's interrupt flag was not set; it was raised.
    InterruptCleared,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub record: JobRecord,
    pub drift: Vec<Drift>,
}

#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn JobStore>,
    cache: StatusCache,
}

impl Reconciler {
    pub fn new(store: Arc<dyn JobStore>, cache: StatusCache) -> Self {
        Self { store, cache }
    }

    /// Load the durable record and bring the cache in line with it.
    ///
    /// Cache failures are logged and skipped; only durable store errors are
    /// returned.
    pub fn reconcile(&self, job_id: JobId) -> Result<Reconciled, StoreError> {
        let record = self.store.load(job_id)?;
        let mut drift = Vec::new();

        match self.cache.status(job_id) {
            Ok(cached) if cached == Some(record.status) => {}
            Ok(cached) => {
                if let Some(latest) = self.moved_on(&record)? {
                    return Ok(Reconciled { record: latest, drift });
                }
                drift.push(match cached {
                    None => Drift::MissingStatus {
                        durable: record.status,
                    },
                    Some(cached) => Drift::StatusMismatch {
                        cached,
                        durable: record.status,
                    },
                });
                if let Err(err) = self.cache.set_status(job_id, record.status) {
                    warn!(%job_id, error = %err, "could not heal cached status");
                }
            }
            Err(err) => {
                warn!(%job_id, error = %err, "status cache unreadable; skipping reconciliation");
                return Ok(Reconciled { record, drift });
            }
        }

        if record.status == JobStatus::Paused {
            match self.cache.interrupt_flag(job_id) {
                Ok(Some(true)) => {}
                Ok(_) => {
                    if let Some(latest) = self.moved_on(&record)? {
                        log_healed(job_id, &drift, record.status);
                        return Ok(Reconciled { record: latest, drift });
                    }
                    drift.push(Drift::InterruptCleared);
                    if let Err(err) = self.cache.set_interrupt(job_id, true) {
                        warn!(%job_id, error = %err, "could not raise interrupt flag");
                    }
                }
                Err(err) => warn!(%job_id, error = %err, "interrupt flag unreadable"),
            }
        }

        log_healed(job_id, &drift, record.status);
        Ok(Reconciled { record, drift })
    }

    /// The newer record if the job was rewritten since `record` was loaded.
    /// A stale copy must not heal the cache (it could re-raise the flag a
    /// resume just cleared).
    fn moved_on(&self, record: &JobRecord) -> Result<Option<JobRecord>, StoreError> {
        let latest = self.store.load(record.id)?;
        if latest.version == record.version {
            return Ok(None);
        }
        debug!(job_id = %record.id, seen = record.version, latest = latest.version, "record moved on; skipping cache heal");
        Ok(Some(latest))
    }
}

fn log_healed(job_id: JobId, drift: &[Drift], status: JobStatus) {
    for d in drift {
        info!(%job_id, drift = ?d, %status, "healed status cache drift");
    }
}
