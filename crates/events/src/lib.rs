//! Job lifecycle events and their (best-effort) distribution.

pub mod bus;
pub mod event;
pub mod in_memory_bus;
pub mod notifier;

pub use bus::{EventBus, Subscription};
pub use event::{JobEvent, JobEventKind};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use notifier::{BusNotifier, NoopNotifier, Notifier};
