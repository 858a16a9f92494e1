//! Container booking domain: bookings, containers, stock allocations and the
//! booking status state machine.
//!
//! Pure domain logic (no IO). Services in `freightops-infra` load a
//! [`BookingAggregate`] from the stores and ask it which transitions are legal.

pub mod allocation;
pub mod booking;
pub mod container;
pub mod events;
pub mod guards;
pub mod owner;
pub mod state_machine;

pub use allocation::{AllocationStage, ExportStage, ImportStage, StockAllocation};
pub use booking::{Booking, BookingStatus, ContainerSize, RoutingLeg};
pub use container::{ContainerDetail, ContainerMeasurements, ContainerStatus};
pub use events::{AllocationStageChanged, BookingEvent, BookingStatusChanged, ContainerStatusChanged};
pub use guards::BookingAggregate;
pub use owner::{BookingKind, BookingRef, OwnerLookup, RawOwnerRef, RawOwnerValue};
