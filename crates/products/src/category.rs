use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockyard_core::{CategoryId, DomainError, DomainResult, Entity};

/// Product category. Names are unique (case-sensitive), enforced by the store layer.
///
/// Product membership and counts are derived from products on read, not stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn create(id: CategoryId, name: &str, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: validate_name(name)?,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn rename(&mut self, name: &str, now: DateTime<Utc>) -> DomainResult<()> {
        self.name = validate_name(name)?;
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn validate_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("category name cannot be empty"));
    }
    Ok(name.to_string())
}
