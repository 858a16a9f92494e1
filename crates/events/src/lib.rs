//! Domain events published by the allocation, pickup and booking services.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod tenant;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use tenant::TenantScoped;
