//! Request-level operations composing the ledger, the record stores and the bus.
//!
//! Every operation takes an explicit [`freightops_core::OperationContext`]; no
//! tenant or actor is ever read from process state.

pub mod allocation;
pub mod booking_status;
mod holder;
pub mod pickup;
pub mod records;

pub use allocation::{AllocationMode, AllocationResult, AllocationService, AllocationWarning, ReleaseOutcome};
pub use booking_status::BookingStatusService;
pub use pickup::{PickupOutcome, PickupRequest, PickupService};
pub use records::BookingRecordsService;
