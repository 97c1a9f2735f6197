use chrono::NaiveDate;
use serde::Serialize;

use stockyard_core::{CategoryId, DomainError, InventoryId, ProductId, SupplierId, WarehouseId};
use stockyard_inventory::{AuditAction, InventoryRecord, Warehouse};
use stockyard_products::Product;

use super::{Catalog, index};
use crate::error::ServiceResult;
use crate::stock::{AddStock, InventoryUpdate, StockReceipt, Transfer};
use crate::store::Filter;

pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// An inventory record with its product and warehouse populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryView {
    #[serde(flatten)]
    pub record: InventoryRecord,
    pub product: Option<Product>,
    pub warehouse: Option<Warehouse>,
}

impl Catalog {
    pub async fn create_inventory(&self, req: AddStock) -> ServiceResult<StockReceipt> {
        self.stock.add_stock(req).await
    }

    /// Apply additions in order. The first failure stops the batch; earlier
    /// additions stay committed.
    pub async fn create_inventory_batch(&self, batch: Vec<AddStock>) -> ServiceResult<Vec<StockReceipt>> {
        if batch.is_empty() {
            return Err(DomainError::validation("empty array is not allowed").into());
        }
        let mut receipts = Vec::with_capacity(batch.len());
        for req in batch {
            receipts.push(self.stock.add_stock(req).await?);
        }
        Ok(receipts)
    }

    pub async fn list_inventory(&self) -> ServiceResult<Vec<InventoryView>> {
        self.inventory_where(Filter::All).await
    }

    pub async fn get_inventory(&self, id: InventoryId) -> ServiceResult<InventoryView> {
        let record = self.store.get::<InventoryRecord>(&id).await?;
        Ok(self.inventory_views(vec![record]).await?.remove(0))
    }

    /// Records holding fewer than `threshold` units (default 5).
    pub async fn low_stock(&self, threshold: Option<i64>) -> ServiceResult<Vec<InventoryView>> {
        let threshold = threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
        self.inventory_where(Filter::lt("stock", threshold as f64)).await
    }

    pub async fn inventory_by_product(&self, id: ProductId) -> ServiceResult<Vec<InventoryView>> {
        self.non_empty(Filter::eq("product_id", id)).await
    }

    pub async fn inventory_by_warehouse(&self, id: WarehouseId) -> ServiceResult<Vec<InventoryView>> {
        self.non_empty(Filter::eq("warehouse_id", id)).await
    }

    pub async fn inventory_by_sku(&self, sku: &str) -> ServiceResult<Vec<InventoryView>> {
        let product = self
            .store
            .find_one::<Product>(&Filter::eq("sku", sku.trim()))
            .await?
            .ok_or_else(|| DomainError::not_found("product"))?;
        self.non_empty(Filter::eq("product_id", product.id)).await
    }

    pub async fn inventory_by_expiry(&self, date: NaiveDate) -> ServiceResult<Vec<InventoryView>> {
        self.non_empty(Filter::eq("expiry_date", date)).await
    }

    /// Records whose audit log contains at least one `action` entry.
    pub async fn inventory_by_audit_action(&self, action: AuditAction) -> ServiceResult<Vec<InventoryView>> {
        self.non_empty(Filter::eq("audit_log.action", action)).await
    }

    pub async fn inventory_by_product_name(&self, name: &str) -> ServiceResult<Vec<InventoryView>> {
        let products = self.store.find_many::<Product>(&Filter::contains("name", name)).await?;
        let ids: Vec<ProductId> = products.iter().map(|p| p.id).collect();
        self.non_empty(Filter::any_of("product_id", ids)).await
    }

    pub async fn inventory_by_warehouse_name(&self, name: &str) -> ServiceResult<Vec<InventoryView>> {
        let warehouses = self.store.find_many::<Warehouse>(&Filter::contains("name", name)).await?;
        let ids: Vec<WarehouseId> = warehouses.iter().map(|w| w.id).collect();
        self.non_empty(Filter::any_of("warehouse_id", ids)).await
    }

    pub async fn inventory_by_category(&self, id: CategoryId) -> ServiceResult<Vec<InventoryView>> {
        self.non_empty(Filter::eq("category_id", id)).await
    }

    pub async fn inventory_by_supplier(&self, id: SupplierId) -> ServiceResult<Vec<InventoryView>> {
        self.non_empty(Filter::eq("supplier_id", id)).await
    }

    pub async fn update_inventory(&self, id: InventoryId, update: InventoryUpdate) -> ServiceResult<InventoryRecord> {
        self.stock.set_stock(id, update).await
    }

    pub async fn delete_inventory(&self, id: InventoryId) -> ServiceResult<InventoryRecord> {
        self.stock.remove_record(id).await
    }

    pub async fn move_inventory(
        &self,
        product_id: ProductId,
        from: WarehouseId,
        to: WarehouseId,
        amount: i64,
    ) -> ServiceResult<Transfer> {
        self.stock.transfer(product_id, from, to, amount).await
    }

    pub async fn diminish_inventory(
        &self,
        id: InventoryId,
        quantity: i64,
        reason: Option<String>,
    ) -> ServiceResult<InventoryRecord> {
        self.stock.diminish(id, quantity, reason).await
    }

    async fn inventory_where(&self, filter: Filter) -> ServiceResult<Vec<InventoryView>> {
        let records = self.store.find_many::<InventoryRecord>(&filter).await?;
        self.inventory_views(records).await
    }

    async fn non_empty(&self, filter: Filter) -> ServiceResult<Vec<InventoryView>> {
        let views = self.inventory_where(filter).await?;
        if views.is_empty() {
            return Err(DomainError::not_found("inventory record").into());
        }
        Ok(views)
    }

    async fn inventory_views(&self, records: Vec<InventoryRecord>) -> ServiceResult<Vec<InventoryView>> {
        let products = index::<Product>(&self.store, records.iter().map(|r| r.product_id)).await?;
        let warehouses = index::<Warehouse>(&self.store, records.iter().map(|r| r.warehouse_id)).await?;
        Ok(records
            .into_iter()
            .map(|record| InventoryView {
                product: products.get(&record.product_id).cloned(),
                warehouse: warehouses.get(&record.warehouse_id).cloned(),
                record,
            })
            .collect())
    }
}
