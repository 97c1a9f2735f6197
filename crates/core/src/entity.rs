//! Identity shared by every stored record.

/// Entity marker + minimal interface.
///
/// Every persisted record (product, category, supplier, warehouse, inventory
/// record) is an entity keyed by a strongly-typed identifier.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
