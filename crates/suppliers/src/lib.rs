//! Suppliers domain module.
//!
//! Vendors that provide products, together with their delivery history.
//! Pure domain logic (no IO, no HTTP, no storage).

pub mod supplier;

pub use supplier::{DeliveryLog, NewSupplier, Supplier, SupplierUpdate};
