//! Fire-and-forget lifecycle notifications.

use std::sync::Arc;

use tracing::warn;

use crate::bus::EventBus;
use crate::event::JobEvent;

/// Receives job lifecycle/progress events.
///
/// Delivery is best effort: `publish` returns nothing and the engine never
/// blocks a job on a notification.
pub trait Notifier: Send + Sync {
    fn publish(&self, event: JobEvent);
}

impl<N> Notifier for Arc<N>
where
    N: Notifier + ?Sized,
{
    fn publish(&self, event: JobEvent) {
        (**self).publish(event)
    }
}

/// Notifier that forwards to an [`EventBus`], logging (not propagating)
/// publish failures.
#[derive(Debug)]
pub struct BusNotifier<B> {
    bus: B,
}

impl<B> BusNotifier<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<B> Notifier for BusNotifier<B>
where
    B: EventBus,
{
    fn publish(&self, event: JobEvent) {
        let job_id = event.job_id();
        let event_type = event.kind().event_type();
        if let Err(err) = self.bus.publish(event) {
            warn!(%job_id, event_type, error = ?err, "failed to publish job event");
        }
    }
}

/// Notifier that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn publish(&self, _event: JobEvent) {}
}
