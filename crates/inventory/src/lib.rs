//! Inventory domain module.
//!
//! Warehouses, the stock records held in them, and the capacity/stock rules
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).
//! Orchestration across records (locking, persistence) lives in `stockyard-infra`.

pub mod capacity;
pub mod record;
pub mod warehouse;

pub use capacity::{Utilization, ensure_capacity, ensure_positive_quantity};
pub use record::{AuditAction, AuditEntry, InventoryRecord, NewInventoryRecord};
pub use warehouse::{NewWarehouse, Warehouse, WarehouseUpdate};
