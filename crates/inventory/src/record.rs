use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockyard_core::{
    CategoryId, DomainError, DomainResult, Entity, InventoryId, ProductId, SupplierId, WarehouseId,
};

use crate::capacity::ensure_positive_quantity;

/// Kind of stock mutation recorded in an inventory record's audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "Create")]
    Create,
    #[serde(rename = "Restock")]
    Restock,
    #[serde(rename = "Transfer Out")]
    TransferOut,
    #[serde(rename = "Transfer In")]
    TransferIn,
    #[serde(rename = "Diminished")]
    Diminished,
    #[serde(rename = "Adjusted")]
    Adjusted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "Create",
            AuditAction::Restock => "Restock",
            AuditAction::TransferOut => "Transfer Out",
            AuditAction::TransferIn => "Transfer In",
            AuditAction::Diminished => "Diminished",
            AuditAction::Adjusted => "Adjusted",
        }
    }
}

impl FromStr for AuditAction {
    type Err = DomainError;

    /// Accepts the serialized names, case-insensitively (`"transfer out"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [AuditAction; 6] = [
            AuditAction::Create,
            AuditAction::Restock,
            AuditAction::TransferOut,
            AuditAction::TransferIn,
            AuditAction::Diminished,
            AuditAction::Adjusted,
        ];
        let wanted = s.trim();
        ALL.into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DomainError::validation(format!("unknown audit action '{wanted}'")))
    }
}

/// One recorded mutation of an inventory record's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub date: DateTime<Utc>,
}

/// Everything needed to open a new record for a (product, warehouse) pair.
///
/// `category_id` / `supplier_id` are copied from the product by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInventoryRecord {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub category_id: Option<CategoryId>,
    pub supplier_id: Option<SupplierId>,
    pub stock: i64,
    pub unit_price: Option<f64>,
    pub expiry_date: Option<NaiveDate>,
}

/// Stock of one product held at one warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: InventoryId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub stock: i64,
    pub category_id: Option<CategoryId>,
    pub supplier_id: Option<SupplierId>,
    pub unit_price: Option<f64>,
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub audit_log: Vec<AuditEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    /// Open a record. `action` is `Create` for fresh stock, `TransferIn` when the
    /// units arrive from another warehouse.
    pub fn open(
        id: InventoryId,
        new: NewInventoryRecord,
        action: AuditAction,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        ensure_positive_quantity(new.stock, "stock")?;
        validate_unit_price(new.unit_price)?;
        Ok(Self {
            id,
            product_id: new.product_id,
            warehouse_id: new.warehouse_id,
            stock: new.stock,
            category_id: new.category_id,
            supplier_id: new.supplier_id,
            unit_price: new.unit_price,
            expiry_date: new.expiry_date,
            audit_log: vec![AuditEntry {
                action,
                amount: new.stock,
                reason: None,
                date: now,
            }],
            created_at: now,
            updated_at: now,
        })
    }

    /// Add `quantity` units. Capacity is the caller's concern.
    pub fn deposit(&mut self, quantity: i64, action: AuditAction, now: DateTime<Utc>) -> DomainResult<()> {
        ensure_positive_quantity(quantity, "quantity")?;
        self.stock += quantity;
        self.push_audit(action, quantity, None, now);
        Ok(())
    }

    /// Remove `quantity` units. All-or-nothing: fails without touching stock when
    /// the record holds fewer than `quantity`.
    pub fn withdraw(
        &mut self,
        quantity: i64,
        action: AuditAction,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        ensure_positive_quantity(quantity, "quantity")?;
        if self.stock < quantity {
            return Err(DomainError::insufficient_stock(self.stock, quantity));
        }
        self.stock = (self.stock - quantity).max(0);
        self.push_audit(action, quantity, reason, now);
        Ok(())
    }

    /// Overwrite stock with an absolute value. Returns the signed delta.
    pub fn set_stock(&mut self, stock: i64, now: DateTime<Utc>) -> DomainResult<i64> {
        if stock < 0 {
            return Err(DomainError::validation("stock must be a non-negative integer"));
        }
        let delta = stock - self.stock;
        if delta != 0 {
            self.stock = stock;
            self.push_audit(AuditAction::Adjusted, delta, None, now);
        }
        Ok(delta)
    }

    pub fn set_unit_price(&mut self, unit_price: f64) -> DomainResult<()> {
        validate_unit_price(Some(unit_price))?;
        self.unit_price = Some(unit_price);
        Ok(())
    }

    /// Refresh the product-derived references.
    pub fn refresh_references(&mut self, category_id: Option<CategoryId>, supplier_id: Option<SupplierId>) {
        self.category_id = category_id;
        self.supplier_id = supplier_id;
    }

    pub fn has_action(&self, action: AuditAction) -> bool {
        self.audit_log.iter().any(|e| e.action == action)
    }

    fn push_audit(&mut self, action: AuditAction, amount: i64, reason: Option<String>, now: DateTime<Utc>) {
        self.audit_log.push(AuditEntry {
            action,
            amount,
            reason,
            date: now,
        });
        self.updated_at = now;
    }
}

impl Entity for InventoryRecord {
    type Id = InventoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn validate_unit_price(unit_price: Option<f64>) -> DomainResult<()> {
    match unit_price {
        Some(p) if !p.is_finite() || p < 0.0 => {
            Err(DomainError::validation("unit_price must be a non-negative number"))
        }
        _ => Ok(()),
    }
}
