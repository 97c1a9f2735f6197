use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockyard_core::{DomainError, DomainResult, Entity, WarehouseId};

/// Fields accepted when creating a warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWarehouse {
    pub name: String,
    pub location: String,
    pub capacity: i64,
}

/// Partial update; absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub capacity: Option<i64>,
}

/// Physical storage location.
///
/// `current_usage` is a denormalised copy of the live stock total. Only stock
/// accounting writes it, and always from a fresh recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    pub location: String,
    pub capacity: i64,
    #[serde(default)]
    pub current_usage: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Warehouse {
    pub fn create(id: WarehouseId, new: NewWarehouse, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: required("name", &new.name)?,
            location: required("location", &new.location)?,
            capacity: validate_capacity(new.capacity)?,
            current_usage: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial update. `live_usage` is the current stock total; capacity may
    /// not be lowered beneath it.
    pub fn apply_update(
        &mut self,
        update: WarehouseUpdate,
        live_usage: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let name = update.name.as_deref().map(|v| required("name", v)).transpose()?;
        let location = update
            .location
            .as_deref()
            .map(|v| required("location", v))
            .transpose()?;
        let capacity = update.capacity.map(validate_capacity).transpose()?;

        if let Some(c) = capacity {
            if c < live_usage {
                return Err(DomainError::conflict(format!(
                    "capacity {c} is below current usage {live_usage}"
                )));
            }
        }

        if let Some(v) = name {
            self.name = v;
        }
        if let Some(v) = location {
            self.location = v;
        }
        if let Some(c) = capacity {
            self.capacity = c;
        }
        self.current_usage = live_usage;
        self.updated_at = now;
        Ok(())
    }

    /// Units that can still be accepted given `usage`.
    pub fn headroom(&self, usage: i64) -> i64 {
        (self.capacity - usage).max(0)
    }
}

impl Entity for Warehouse {
    type Id = WarehouseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn required(field: &str, value: &str) -> DomainResult<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(v.to_string())
}

fn validate_capacity(capacity: i64) -> DomainResult<i64> {
    if capacity < 0 {
        return Err(DomainError::validation("capacity must be non-negative"));
    }
    Ok(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_warehouse(capacity: i64) -> NewWarehouse {
        NewWarehouse {
            name: "Main Distribution Center".to_string(),
            location: "Davao City, PH".to_string(),
            capacity,
        }
    }

    #[test]
    fn create_starts_with_zero_usage() {
        let w = Warehouse::create(WarehouseId::new(), new_warehouse(100), Utc::now()).unwrap();
        assert_eq!(w.current_usage, 0);
        assert_eq!(w.headroom(0), 100);
    }

    #[test]
    fn create_rejects_negative_capacity() {
        let err = Warehouse::create(WarehouseId::new(), new_warehouse(-1), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn capacity_cannot_drop_below_usage() {
        let mut w = Warehouse::create(WarehouseId::new(), new_warehouse(100), Utc::now()).unwrap();
        let update = WarehouseUpdate {
            capacity: Some(40),
            name: Some("Renamed".to_string()),
            ..WarehouseUpdate::default()
        };
        let err = w.apply_update(update, 50, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(w.capacity, 100);
        assert_eq!(w.name, "Main Distribution Center");
    }

    #[test]
    fn update_refreshes_usage_counter() {
        let mut w = Warehouse::create(WarehouseId::new(), new_warehouse(100), Utc::now()).unwrap();
        w.apply_update(WarehouseUpdate { capacity: Some(60), ..Default::default() }, 60, Utc::now())
            .unwrap();
        assert_eq!(w.capacity, 60);
        assert_eq!(w.current_usage, 60);
        assert_eq!(w.headroom(60), 0);
    }
}
