//! `freightops-core`: shared building blocks for the allocation and booking engine.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod id;
pub mod version;

pub use config::EngineConfig;
pub use context::OperationContext;
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    AggregateId, BookingId, ContainerId, DemandLineId, JobId, Lpn, PickupId, SkuId,
    StockAllocationId, TenantId, UserId,
};
pub use version::{ExpectedVersion, Versioned};
