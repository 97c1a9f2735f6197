use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockyard_core::{CategoryId, DomainError, DomainResult, Entity, ProductId, SupplierId};

/// Client-supplied product fields (create and full update share this shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    pub category_id: CategoryId,
    pub supplier_id: SupplierId,
    #[serde(default)]
    pub sku: Option<String>,
}

impl ProductDetails {
    /// Validate field-level rules. Reference existence is checked by the caller.
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(DomainError::validation("price must be a non-negative number"));
        }
        if let Some(sku) = &self.sku {
            if sku.trim().is_empty() {
                return Err(DomainError::validation("sku cannot be blank when provided"));
            }
        }
        Ok(())
    }

    fn normalized_sku(&self) -> Option<String> {
        self.sku.as_ref().map(|s| s.trim().to_string())
    }
}

/// A sellable item.
///
/// `category_id` / `supplier_id` are required on create and update, but may be
/// cleared when the referenced category or supplier is force-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category_id: Option<CategoryId>,
    pub supplier_id: Option<SupplierId>,
    pub sku: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn create(id: ProductId, details: ProductDetails, now: DateTime<Utc>) -> DomainResult<Self> {
        details.validate()?;
        let sku = details.normalized_sku();
        Ok(Self {
            id,
            name: details.name.trim().to_string(),
            description: details.description,
            price: details.price,
            category_id: Some(details.category_id),
            supplier_id: Some(details.supplier_id),
            sku,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace every client-owned field.
    pub fn replace_details(&mut self, details: ProductDetails, now: DateTime<Utc>) -> DomainResult<()> {
        details.validate()?;
        self.sku = details.normalized_sku();
        self.name = details.name.trim().to_string();
        self.description = details.description;
        self.price = details.price;
        self.category_id = Some(details.category_id);
        self.supplier_id = Some(details.supplier_id);
        self.updated_at = now;
        Ok(())
    }

    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
        }
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Reduced projection returned by name search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSummary {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
}
