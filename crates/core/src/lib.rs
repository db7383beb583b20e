//! `evalrun-core`: job lifecycle building blocks.
//!
//! This crate contains **pure domain** primitives (no IO, no threads): ids, the
//! status state machine, the durable job record and its transitions.

pub mod error;
pub mod id;
pub mod item;
pub mod job;
pub mod progress;
pub mod status;
pub mod version;

pub use error::{DomainError, DomainResult};
pub use id::{ItemId, JobId, LeaseToken};
pub use item::{ItemOutcome, ItemTally, WorkItem};
pub use job::{JobRecord, JobStatusView, RESET_PAUSE_REASON, STALLED_PAUSE_REASON};
pub use status::{JobKind, JobStatus};
pub use version::ExpectedVersion;
