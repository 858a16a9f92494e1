//! Infrastructure layer: record stores, the stock ledger and the services that
//! drive allocation, pickup and booking progression over them.

pub mod ledger;
pub mod publisher;
pub mod repositories;
pub mod resolver;
pub mod services;
pub mod store;


pub use ledger::{InMemoryStockLedger, LedgerError, StockLedger};
pub use publisher::{EventPublisher, EventSink};
pub use repositories::Repositories;
pub use resolver::OwnerResolver;
pub use store::{InMemoryTenantStore, StoreError, TenantStore};
