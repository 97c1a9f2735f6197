//! Domain error model.

use thiserror::Error;

use crate::id::WarehouseId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. missing or malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced record does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A conflict occurred (duplicate unique field, delete blocked by references, ...).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Accepting `requested` more units would push the warehouse past its capacity.
    #[error(
        "warehouse {warehouse_id} over capacity: usage {current_usage} + {requested} exceeds capacity {capacity}"
    )]
    CapacityExceeded {
        warehouse_id: WarehouseId,
        current_usage: i64,
        capacity: i64,
        requested: i64,
    },

    /// A withdrawal asked for more units than the record holds.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { available: i64, requested: i64 },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// `what` names the missing record, e.g. `"product"`.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn insufficient_stock(available: i64, requested: i64) -> Self {
        Self::InsufficientStock { available, requested }
    }
}
