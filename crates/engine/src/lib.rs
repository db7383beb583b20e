//! `evalrun-engine`: orchestration of long-running, resumable jobs.
//!
//! ## Components
//!
//! - `JobStore`: durable, version-checked job records (in-memory or Postgres)
//! - `StatusCache`: fast status mirror + interrupt flag (in-memory or Redis)
//! - `Reconciler`: heals the cache from the durable record
//! - `WorkItemSource` / `ItemExecutor`: where items come from and what is done with them
//! - `Orchestrator`: start/pause/resume/reset, one worker thread per active job

pub mod cache;
pub mod config;
pub mod executor;
pub mod locks;
pub mod orchestrator;
pub mod reconciler;
pub mod source;
pub mod store;
pub mod worker;

mod integration_tests;

pub use cache::{CacheError, InMemoryCache, KeyValueCache, StatusCache};
#[cfg(feature = "redis")]
pub use cache::RedisCache;
pub use config::{ConfigError, EngineConfig};
pub use executor::{ExecutionError, ItemExecutor, ItemOutput};
pub use locks::JobLocks;
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use reconciler::{Drift, Reconciled, Reconciler};
pub use source::{InMemoryWorkItemSource, SourceError, WorkItemSource};
pub use store::{InMemoryJobStore, JobStore, PostgresJobStore, StoreError};
pub use worker::{WorkerExit, WorkerHandle};
