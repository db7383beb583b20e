//! Fast status cache.
//!
//! The cache holds two keys per job: the mirrored status and the interrupt
//! flag the worker loop polls before every item. Backends only see opaque
//! strings ([`KeyValueCache`]); [`StatusCache`] owns the key layout and the
//! single canonical encoding of statuses.

use std::sync::Arc;
use std::time::Duration;

use evalrun_core::{JobId, JobStatus};
use tracing::warn;

#[cfg(test)]
pub(crate) mod hooked;
pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis_cache;

pub use in_memory::InMemoryCache;
#[cfg(feature = "redis")]
pub use redis_cache::RedisCache;

/// Cache backend error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// String key/value store with per-key expiry.
pub trait KeyValueCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    fn delete(&self, key: &str) -> Result<(), CacheError>;
}

impl<C> KeyValueCache for Arc<C>
where
    C: KeyValueCache + ?Sized,
{
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        (**self).set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        (**self).delete(key)
    }
}

const FLAG_SET: &str = "1";
const FLAG_CLEAR: &str = "0";

/// Typed view over a [`KeyValueCache`]: job status and interrupt flag.
#[derive(Clone)]
pub struct StatusCache {
    backend: Arc<dyn KeyValueCache>,
    prefix: String,
    ttl: Duration,
}

impl std::fmt::Debug for StatusCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusCache")
            .field("prefix", &self.prefix)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl StatusCache {
    pub fn new(backend: Arc<dyn KeyValueCache>, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            ttl,
        }
    }

    pub fn status_key(&self, job_id: JobId) -> String {
        format!("{}:state:{}", self.prefix, job_id)
    }

    pub fn interrupt_key(&self, job_id: JobId) -> String {
        format!("{}:interrupt:{}", self.prefix, job_id)
    }

    /// Cached status, or `None` when absent, expired, or unreadable.
    pub fn status(&self, job_id: JobId) -> Result<Option<JobStatus>, CacheError> {
        let key = self.status_key(job_id);
        let Some(raw) = self.backend.get(&key)? else {
            return Ok(None);
        };
        match raw.parse::<JobStatus>() {
            Ok(status) => Ok(Some(status)),
            Err(err) => {
                // Treated as a miss; the reconciler overwrites it with the durable value.
                warn!(%job_id, %key, %raw, error = %err, "unparseable cached status");
                Ok(None)
            }
        }
    }

    pub fn set_status(&self, job_id: JobId, status: JobStatus) -> Result<(), CacheError> {
        self.backend
            .set(&self.status_key(job_id), status.as_str(), self.ttl)
    }

    /// Raw interrupt flag: `None` when the key is absent or expired.
    pub fn interrupt_flag(&self, job_id: JobId) -> Result<Option<bool>, CacheError> {
        let raw = self.backend.get(&self.interrupt_key(job_id))?;
        Ok(raw.map(|v| matches!(v.trim(), FLAG_SET | "true")))
    }

    /// Whether a stop has been requested. An absent flag reads as `false`.
    pub fn interrupt_requested(&self, job_id: JobId) -> Result<bool, CacheError> {
        Ok(self.interrupt_flag(job_id)?.unwrap_or(false))
    }

    pub fn set_interrupt(&self, job_id: JobId, requested: bool) -> Result<(), CacheError> {
        let value = if requested { FLAG_SET } else { FLAG_CLEAR };
        self.backend
            .set(&self.interrupt_key(job_id), value, self.ttl)
    }

    /// Drop both keys for a job.
    pub fn evict(&self, job_id: JobId) -> Result<(), CacheError> {
        self.backend.delete(&self.status_key(job_id))?;
        self.backend.delete(&self.interrupt_key(job_id))
    }
}
