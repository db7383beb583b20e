//! Job event fan-out.
//!
//! Listeners (push channels, dashboards, tests) either watch every job or a
//! single one. Nothing here is durable: the job record is the source of truth
//! and a missed event is recovered by reading the job's status.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use evalrun_core::JobId;

use crate::event::JobEvent;

/// Receiving end of a bus subscription.
///
/// Only events published after the subscription was created are delivered.
///
/// ```ignore
/// let watch = bus.subscribe_job(job_id);
/// while let Ok(event) = watch.recv_timeout(Duration::from_secs(30)) {
///     render(&event);
///     if event.kind().is_terminal() {
///         break;
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Subscription {
    job_id: Option<JobId>,
    receiver: Receiver<JobEvent>,
}

impl Subscription {
    pub fn new(job_id: Option<JobId>, receiver: Receiver<JobEvent>) -> Self {
        Self { job_id, receiver }
    }

    /// The job this subscription is scoped to; `None` for all jobs.
    pub fn job_id(&self) -> Option<JobId> {
        self.job_id
    }

    pub fn recv(&self) -> Result<JobEvent, RecvError> {
        self.receiver.recv()
    }

    pub fn try_recv(&self) -> Result<JobEvent, TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<JobEvent, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything buffered so far, without blocking.
    pub fn drain(&self) -> Vec<JobEvent> {
        self.receiver.try_iter().collect()
    }
}

/// Transport for job events.
///
/// `publish` may fail (bus closed, broker down). The engine treats delivery
/// as best effort: see [`crate::BusNotifier`].
pub trait EventBus: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, event: JobEvent) -> Result<(), Self::Error>;

    /// Events of every job.
    fn subscribe(&self) -> Subscription;

    /// Events of one job only.
    fn subscribe_job(&self, job_id: JobId) -> Subscription;
}

impl<B> EventBus for Arc<B>
where
    B: EventBus + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, event: JobEvent) -> Result<(), Self::Error> {
        (**self).publish(event)
    }

    fn subscribe(&self) -> Subscription {
        (**self).subscribe()
    }

    fn subscribe_job(&self, job_id: JobId) -> Subscription {
        (**self).subscribe_job(job_id)
    }
}
