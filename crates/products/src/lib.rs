//! Product catalog domain module.
//!
//! Products and the categories they are filed under. Pure validation and
//! state transitions only (no IO, no HTTP, no storage).

pub mod category;
pub mod product;

pub use category::Category;
pub use product::{Product, ProductDetails, ProductSummary};
