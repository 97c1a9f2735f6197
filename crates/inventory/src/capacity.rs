//! Warehouse capacity rules.

use serde::Serialize;

use stockyard_core::{DomainError, DomainResult};

use crate::warehouse::Warehouse;

/// Reject zero or negative quantities.
pub fn ensure_positive_quantity(quantity: i64, field: &str) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation(format!("{field} must be greater than 0")));
    }
    Ok(())
}

/// Check that `warehouse` can take `requested` more units on top of `current_usage`.
///
/// Returns the usage after acceptance.
pub fn ensure_capacity(warehouse: &Warehouse, current_usage: i64, requested: i64) -> DomainResult<i64> {
    let new_usage = current_usage
        .checked_add(requested)
        .ok_or_else(|| DomainError::validation("quantity overflows"))?;
    if new_usage > warehouse.capacity {
        return Err(DomainError::CapacityExceeded {
            warehouse_id: warehouse.id,
            current_usage,
            capacity: warehouse.capacity,
            requested,
        });
    }
    Ok(new_usage)
}

/// Capacity report for one warehouse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Utilization {
    pub capacity: i64,
    pub current_usage: i64,
    pub available: i64,
    pub utilization_percent: f64,
}

impl Utilization {
    pub fn of(warehouse: &Warehouse, current_usage: i64) -> Self {
        let utilization_percent = if warehouse.capacity == 0 {
            0.0
        } else {
            // Two decimal places.
            (current_usage as f64 * 10_000.0 / warehouse.capacity as f64).round() / 100.0
        };
        Self {
            capacity: warehouse.capacity,
            current_usage,
            available: warehouse.headroom(current_usage),
            utilization_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::NewWarehouse;
    use chrono::Utc;
    use proptest::prelude::*;
    use stockyard_core::WarehouseId;

    fn warehouse(capacity: i64) -> Warehouse {
        Warehouse::create(
            WarehouseId::new(),
            NewWarehouse {
                name: "W".to_string(),
                location: "L".to_string(),
                capacity,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn over_capacity_reports_usage_and_capacity() {
        let w = warehouse(100);
        let err = ensure_capacity(&w, 90, 20).unwrap_err();
        assert_eq!(
            err,
            DomainError::CapacityExceeded {
                warehouse_id: w.id,
                current_usage: 90,
                capacity: 100,
                requested: 20,
            }
        );
        assert_eq!(ensure_capacity(&w, 90, 5).unwrap(), 95);
    }

    #[test]
    fn filling_exactly_to_capacity_is_allowed() {
        let w = warehouse(100);
        assert_eq!(ensure_capacity(&w, 90, 10).unwrap(), 100);
    }

    #[test]
    fn utilization_percentages() {
        let w = warehouse(300);
        let u = Utilization::of(&w, 100);
        assert_eq!(u.available, 200);
        assert_eq!(u.utilization_percent, 33.33);

        let empty = warehouse(0);
        assert_eq!(Utilization::of(&empty, 0).utilization_percent, 0.0);
    }

    #[test]
    fn non_positive_quantities_rejected() {
        assert!(ensure_positive_quantity(0, "amount").is_err());
        assert!(ensure_positive_quantity(-1, "amount").is_err());
        assert!(ensure_positive_quantity(1, "amount").is_ok());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of additions is attempted, accepted ones
        /// never push usage past capacity and rejected ones never change usage.
        #[test]
        fn accepted_additions_never_exceed_capacity(
            capacity in 0i64..10_000,
            requests in prop::collection::vec(1i64..2_000, 1..40)
        ) {
            let w = warehouse(capacity);
            let mut usage = 0i64;
            for q in requests {
                match ensure_capacity(&w, usage, q) {
                    Ok(new_usage) => {
                        prop_assert_eq!(new_usage, usage + q);
                        usage = new_usage;
                    }
                    Err(DomainError::CapacityExceeded { current_usage, .. }) => {
                        prop_assert_eq!(current_usage, usage);
                        prop_assert!(usage + q > capacity);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                }
                prop_assert!(usage <= capacity);
            }
        }
    }
}
