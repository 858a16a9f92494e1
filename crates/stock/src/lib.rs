//! Stock domain: license-plate units, demand lines, outbound jobs and pickups.
//!
//! Business rules only (no IO, no storage). Reservation is all-or-nothing per
//! line, so selection here is pure and the ledger adapter performs the
//! per-unit conditional writes.

pub mod coverage;
pub mod demand;
pub mod events;
pub mod pickup;
pub mod selection;
pub mod sku;
pub mod unit;

pub use coverage::{Coverage, Progress};
pub use demand::{DemandLine, JobStatus, OutboundJob};
pub use events::{JobStatusChanged, PickupRecorded, StockEvent, UnitPicked, UnitReleased, UnitReserved};
pub use pickup::{PickupRecord, PickupTarget, PickupWarning, PickupWarningReason, Screening, screen_units};
pub use selection::{select_fifo, select_manual};
pub use sku::Sku;
pub use unit::{AllocationStatus, DemandOwner, DemandRef, PutAway, StockQuery, StockUnit, fifo_order};
