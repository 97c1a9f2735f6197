//! Infrastructure layer: persistence, stock accounting, catalog services.
//!
//! - [`store`]: the entity store (document backends + typed facade)
//! - [`stock`]: capacity-safe stock mutations, serialized per warehouse
//! - [`catalog`]: per-entity operations consumed by the HTTP layer

pub mod catalog;
pub mod error;
pub mod stock;
pub mod store;

pub use catalog::Catalog;
pub use error::{ServiceError, ServiceResult};
pub use stock::StockAccounting;
pub use store::{EntityStore, StoreError};
