//! Process-local event bus (tests, single-node deployments).

use std::sync::{Mutex, mpsc};

use thiserror::Error;

use evalrun_core::JobId;

use crate::bus::{EventBus, Subscription};
use crate::event::JobEvent;

#[derive(Debug, Error)]
pub enum InMemoryBusError {
    #[error("subscriber registry lock poisoned")]
    Poisoned,
}

struct Subscriber {
    job_id: Option<JobId>,
    sender: mpsc::Sender<JobEvent>,
}

impl Subscriber {
    fn wants(&self, event: &JobEvent) -> bool {
        self.job_id.is_none_or(|id| id == event.job_id())
    }
}

/// Channel-backed fan-out; subscribers whose receiver was dropped are pruned
/// on the next publish that would reach them.
#[derive(Default)]
pub struct InMemoryEventBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl core::fmt::Debug for InMemoryEventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let count = self.subscribers.lock().map(|subs| subs.len()).unwrap_or(0);
        f.debug_struct("InMemoryEventBus").field("subscribers", &count).finish()
    }
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, job_id: Option<JobId>) -> Subscription {
        let (sender, receiver) = mpsc::channel();
        // A poisoned registry still hands out a subscription; it never receives.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(Subscriber { job_id, sender });
        }
        Subscription::new(job_id, receiver)
    }
}

impl EventBus for InMemoryEventBus {
    type Error = InMemoryBusError;

    fn publish(&self, event: JobEvent) -> Result<(), Self::Error> {
        let mut subs = self.subscribers.lock().map_err(|_| InMemoryBusError::Poisoned)?;
        subs.retain(|sub| !sub.wants(&event) || sub.sender.send(event.clone()).is_ok());
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.register(None)
    }

    fn subscribe_job(&self, job_id: JobId) -> Subscription {
        self.register(Some(job_id))
    }
}
