use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockyard_core::{DomainError, DomainResult, Entity, ProductId, SupplierId, WarehouseId};

/// One delivery of a product into a warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryLog {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub date: DateTime<Utc>,
}

/// Fields accepted when registering a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    pub contact_info: String,
    pub email: String,
    pub address: String,
    #[serde(default)]
    pub rating: Option<u8>,
}

/// Partial update: absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub contact_info: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub rating: Option<u8>,
}

/// A vendor providing products.
///
/// `rating` and `order_count` are informational; nothing in the service maintains them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub contact_info: String,
    pub email: String,
    pub address: String,
    pub rating: Option<u8>,
    #[serde(default)]
    pub delivery_logs: Vec<DeliveryLog>,
    #[serde(default)]
    pub order_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Supplier {
    pub fn register(id: SupplierId, new: NewSupplier, now: DateTime<Utc>) -> DomainResult<Self> {
        let supplier = Self {
            id,
            name: required("name", &new.name)?,
            contact_info: required("contact_info", &new.contact_info)?,
            email: validate_email(&new.email)?,
            address: required("address", &new.address)?,
            rating: validate_rating(new.rating)?,
            delivery_logs: Vec::new(),
            order_count: 0,
            created_at: now,
            updated_at: now,
        };
        Ok(supplier)
    }

    pub fn apply_update(&mut self, update: SupplierUpdate, now: DateTime<Utc>) -> DomainResult<()> {
        // Validate everything before touching state so a bad field leaves the record intact.
        let name = update.name.as_deref().map(|v| required("name", v)).transpose()?;
        let contact = update
            .contact_info
            .as_deref()
            .map(|v| required("contact_info", v))
            .transpose()?;
        let email = update.email.as_deref().map(validate_email).transpose()?;
        let address = update.address.as_deref().map(|v| required("address", v)).transpose()?;
        let rating = validate_rating(update.rating)?;

        if let Some(v) = name {
            self.name = v;
        }
        if let Some(v) = contact {
            self.contact_info = v;
        }
        if let Some(v) = email {
            self.email = v;
        }
        if let Some(v) = address {
            self.address = v;
        }
        if rating.is_some() {
            self.rating = rating;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn record_delivery(&mut self, log: DeliveryLog) -> DomainResult<()> {
        if log.quantity <= 0 {
            return Err(DomainError::validation("delivery quantity must be greater than 0"));
        }
        self.updated_at = log.date.max(self.updated_at);
        self.delivery_logs.push(log);
        Ok(())
    }

    pub fn delivered(&self, product_id: ProductId) -> bool {
        self.delivery_logs.iter().any(|l| l.product_id == product_id)
    }
}

impl Entity for Supplier {
    type Id = SupplierId;

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

fn validate_email(value: &str) -> DomainResult<String> {
    let v = required("email", value)?;
    match v.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(v),
        _ => Err(DomainError::validation("email must look like user@domain")),
    }
}

fn validate_rating(rating: Option<u8>) -> DomainResult<Option<u8>> {
    match rating {
        Some(r) if !(1..=5).contains(&r) => {
            Err(DomainError::validation("rating must be between 1 and 5"))
        }
        other => Ok(other),
    }
}
