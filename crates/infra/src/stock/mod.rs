//! Stock accounting: every mutation of inventory stock and warehouse usage.
//!
//! Each operation holds the lock of every warehouse it touches for its whole
//! read-check-write sequence, so two concurrent additions can never both pass the
//! same capacity check. Usage is always the live sum of the warehouse's inventory
//! stock computed under that lock; `Warehouse::current_usage` is rewritten from
//! that sum after each commit.
//!
//! Operations that create records for a product also hold that product's lock,
//! taken before any warehouse lock, so a product cannot be deleted or have its
//! references rewritten while stock for it is being written.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use stockyard_core::{CategoryId, DomainError, InventoryId, ProductId, SupplierId, WarehouseId};
use stockyard_inventory::{
    AuditAction, InventoryRecord, NewInventoryRecord, Utilization, Warehouse, WarehouseUpdate,
    ensure_capacity, ensure_positive_quantity,
};
use stockyard_products::Product;

use crate::error::{ServiceError, ServiceResult};
use crate::store::{Document, EntityStore, Filter, StoreResult};

mod locks;

pub use locks::{KeyGuard, KeyedLocks, ProductLocks, WarehouseLocks};

/// Reason recorded when a diminish request does not give one.
pub const DEFAULT_DIMINISH_REASON: &str = "Unspecified";

/// Stock to receive into a warehouse.
#[derive(Debug, Clone, PartialEq)]
pub struct AddStock {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub unit_price: Option<f64>,
    pub expiry_date: Option<NaiveDate>,
}

/// Result of a successful [`StockAccounting::add_stock`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockReceipt {
    pub record: InventoryRecord,
    pub current_usage: i64,
    pub capacity: i64,
}

/// Both sides of a completed transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transfer {
    pub from: InventoryRecord,
    pub to: InventoryRecord,
}

/// Direct edit of one inventory record. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryUpdate {
    pub stock: Option<i64>,
    pub unit_price: Option<f64>,
    pub expiry_date: Option<NaiveDate>,
}

/// The stock accounting service.
#[derive(Debug)]
pub struct StockAccounting {
    store: EntityStore,
    products: ProductLocks,
    locks: WarehouseLocks,
}

impl StockAccounting {
    pub fn new(store: EntityStore) -> Self {
        Self {
            store,
            products: ProductLocks::new(),
            locks: WarehouseLocks::new(),
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Exclusive access to one product's stock and references.
    ///
    /// Take it before any warehouse work; it is not reentrant, so do not call
    /// `add_stock` or `transfer` for the same product while holding it.
    pub async fn lock_product(&self, product_id: &ProductId) -> KeyGuard {
        self.products.lock(product_id).await
    }

    /// Receive `quantity` units of a product into a warehouse.
    ///
    /// Merges into the (product, warehouse) record when one exists. Fails with
    /// `CapacityExceeded` and writes nothing when the warehouse cannot take the units.
    pub async fn add_stock(&self, req: AddStock) -> ServiceResult<StockReceipt> {
        ensure_positive_quantity(req.quantity, "quantity")?;
        let _product_guard = self.products.lock(&req.product_id).await;
        let product = self.store.get::<Product>(&req.product_id).await?;

        let _guard = self.locks.lock(&req.warehouse_id).await;
        let warehouse = self.store.get::<Warehouse>(&req.warehouse_id).await?;
        let usage = self.live_usage(&req.warehouse_id).await?;
        let new_usage = ensure_capacity(&warehouse, usage, req.quantity).inspect_err(|e| {
            debug!(
                warehouse_id = %req.warehouse_id,
                product_id = %req.product_id,
                quantity = req.quantity,
                error = %e,
                "stock addition rejected"
            );
        })?;

        let now = Utc::now();
        let record = match self.pair_record(&req.product_id, &req.warehouse_id).await? {
            Some(mut record) => {
                record.deposit(req.quantity, AuditAction::Restock, now)?;
                if let Some(price) = req.unit_price {
                    record.set_unit_price(price)?;
                }
                if req.expiry_date.is_some() {
                    record.expiry_date = req.expiry_date;
                }
                record.refresh_references(product.category_id, product.supplier_id);
                self.store.replace(&record).await?;
                record
            }
            None => {
                let record = InventoryRecord::open(
                    InventoryId::new(),
                    NewInventoryRecord {
                        product_id: req.product_id,
                        warehouse_id: req.warehouse_id,
                        category_id: product.category_id,
                        supplier_id: product.supplier_id,
                        stock: req.quantity,
                        unit_price: req.unit_price,
                        expiry_date: req.expiry_date,
                    },
                    AuditAction::Create,
                    now,
                )?;
                self.store.insert(&record).await?;
                record
            }
        };

        self.sync_usage(warehouse.clone(), new_usage).await?;
        info!(
            warehouse_id = %req.warehouse_id,
            product_id = %req.product_id,
            quantity = req.quantity,
            current_usage = new_usage,
            capacity = warehouse.capacity,
            "stock added"
        );

        Ok(StockReceipt {
            record,
            current_usage: new_usage,
            capacity: warehouse.capacity,
        })
    }

    /// Move `quantity` units of a product from one warehouse to another.
    pub async fn transfer(
        &self,
        product_id: ProductId,
        from: WarehouseId,
        to: WarehouseId,
        quantity: i64,
    ) -> ServiceResult<Transfer> {
        ensure_positive_quantity(quantity, "amount")?;
        if from == to {
            return Err(DomainError::validation("source and destination warehouses must differ").into());
        }

        let _product_guard = self.products.lock(&product_id).await;
        let _guard = self.locks.lock_all(&[from, to]).await;

        let mut source = match self.pair_record(&product_id, &from).await? {
            Some(record) if record.stock >= quantity => record,
            found => {
                let available = found.map(|r| r.stock).unwrap_or(0);
                debug!(%product_id, warehouse_id = %from, available, quantity, "transfer rejected: short stock");
                return Err(DomainError::insufficient_stock(available, quantity).into());
            }
        };

        let destination = self.store.get::<Warehouse>(&to).await?;
        let destination_usage = self.live_usage(&to).await?;
        let destination_new_usage = ensure_capacity(&destination, destination_usage, quantity)
            .inspect_err(|e| {
                debug!(%product_id, warehouse_id = %to, quantity, error = %e, "transfer rejected");
            })?;

        let now = Utc::now();
        source.withdraw(quantity, AuditAction::TransferOut, None, now)?;

        let (target, opened) = match self.pair_record(&product_id, &to).await? {
            Some(mut record) => {
                record.deposit(quantity, AuditAction::TransferIn, now)?;
                (record, false)
            }
            None => {
                let record = InventoryRecord::open(
                    InventoryId::new(),
                    NewInventoryRecord {
                        product_id,
                        warehouse_id: to,
                        category_id: source.category_id,
                        supplier_id: source.supplier_id,
                        stock: quantity,
                        unit_price: source.unit_price,
                        expiry_date: source.expiry_date,
                    },
                    AuditAction::TransferIn,
                    now,
                )?;
                (record, true)
            }
        };

        self.store.replace(&source).await?;
        if opened {
            self.store.insert(&target).await?;
        } else {
            self.store.replace(&target).await?;
        }

        if let Some(origin) = self.store.find_by_id::<Warehouse>(&from).await? {
            let origin_usage = self.live_usage(&from).await?;
            self.sync_usage(origin, origin_usage).await?;
        }
        self.sync_usage(destination, destination_new_usage).await?;

        info!(%product_id, from = %from, to = %to, quantity, "stock transferred");
        Ok(Transfer {
            from: source,
            to: target,
        })
    }

    /// Remove units from one record (spoilage, damage, ...).
    ///
    /// All-or-nothing: a request larger than the record's stock fails with
    /// `InsufficientStock` and changes nothing.
    pub async fn diminish(
        &self,
        inventory_id: InventoryId,
        quantity: i64,
        reason: Option<String>,
    ) -> ServiceResult<InventoryRecord> {
        ensure_positive_quantity(quantity, "quantity")?;
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_DIMINISH_REASON.to_string());

        let (_guard, mut record) = self.lock_record(inventory_id).await?;
        record
            .withdraw(quantity, AuditAction::Diminished, Some(reason.clone()), Utc::now())
            .inspect_err(|e| debug!(%inventory_id, quantity, error = %e, "diminish rejected"))?;
        self.store.replace(&record).await?;
        self.refresh_usage(&record.warehouse_id).await?;

        info!(
            %inventory_id,
            warehouse_id = %record.warehouse_id,
            quantity,
            reason = %reason,
            stock = record.stock,
            "stock diminished"
        );
        Ok(record)
    }

    /// Edit a record directly. A stock increase is capacity-checked like an addition.
    pub async fn set_stock(
        &self,
        inventory_id: InventoryId,
        update: InventoryUpdate,
    ) -> ServiceResult<InventoryRecord> {
        let (_guard, mut record) = self.lock_record(inventory_id).await?;
        let warehouse = self.store.get::<Warehouse>(&record.warehouse_id).await?;
        let usage = self.live_usage(&record.warehouse_id).await?;
        let now = Utc::now();

        if let Some(price) = update.unit_price {
            record.set_unit_price(price)?;
        }
        if update.expiry_date.is_some() {
            record.expiry_date = update.expiry_date;
        }
        let delta = match update.stock {
            Some(stock) => record.set_stock(stock, now)?,
            None => 0,
        };
        let new_usage = if delta > 0 {
            ensure_capacity(&warehouse, usage, delta)?
        } else {
            usage + delta
        };
        record.updated_at = now;

        self.store.replace(&record).await?;
        self.sync_usage(warehouse, new_usage).await?;
        info!(%inventory_id, delta, stock = record.stock, "inventory record updated");
        Ok(record)
    }

    /// Delete one record and release its units from the warehouse.
    pub async fn remove_record(&self, inventory_id: InventoryId) -> ServiceResult<InventoryRecord> {
        let (_guard, record) = self.lock_record(inventory_id).await?;
        if !self.store.delete_by_id::<InventoryRecord>(&inventory_id).await? {
            return Err(DomainError::not_found(InventoryRecord::LABEL).into());
        }
        self.refresh_usage(&record.warehouse_id).await?;
        info!(%inventory_id, warehouse_id = %record.warehouse_id, stock = record.stock, "inventory record removed");
        Ok(record)
    }

    /// Apply a partial warehouse update. Capacity may not drop below live usage.
    pub async fn update_warehouse(
        &self,
        warehouse_id: WarehouseId,
        update: WarehouseUpdate,
    ) -> ServiceResult<Warehouse> {
        let _guard = self.locks.lock(&warehouse_id).await;
        let mut warehouse = self.store.get::<Warehouse>(&warehouse_id).await?;
        let usage = self.live_usage(&warehouse_id).await?;
        warehouse.apply_update(update, usage, Utc::now())?;
        self.store.replace(&warehouse).await?;
        Ok(warehouse)
    }

    /// Delete a warehouse.
    ///
    /// Blocked with `Conflict` while inventory records reference it, unless `force`,
    /// in which case those records are deleted first. Returns how many were removed.
    pub async fn delete_warehouse(&self, warehouse_id: WarehouseId, force: bool) -> ServiceResult<u64> {
        let _guard = self.locks.lock(&warehouse_id).await;
        self.store.get::<Warehouse>(&warehouse_id).await?;

        let filter = Filter::eq("warehouse_id", warehouse_id);
        let records = self.store.find_many::<InventoryRecord>(&filter).await?;
        if !records.is_empty() && !force {
            return Err(DomainError::conflict(format!(
                "warehouse is referenced by {} inventory record(s)",
                records.len()
            ))
            .into());
        }

        for record in &records {
            self.store.delete_by_id::<InventoryRecord>(&record.id).await?;
        }
        self.store.delete_by_id::<Warehouse>(&warehouse_id).await?;
        if !records.is_empty() {
            warn!(%warehouse_id, removed = records.len(), "warehouse deleted with its inventory");
        } else {
            info!(%warehouse_id, "warehouse deleted");
        }
        Ok(records.len() as u64)
    }

    /// Delete every record of a product and release the units. Returns the count.
    ///
    /// The caller holds the product's lock (see [`Self::lock_product`]).
    pub async fn remove_product_stock(&self, product_id: ProductId) -> ServiceResult<u64> {
        let by_product = Filter::eq("product_id", product_id);
        let mut removed = 0;
        for warehouse_id in self.warehouses_of(&by_product).await? {
            let _guard = self.locks.lock(&warehouse_id).await;
            let filter = by_product.clone().and(Filter::eq("warehouse_id", warehouse_id));
            for record in self.store.find_many::<InventoryRecord>(&filter).await? {
                if self.store.delete_by_id::<InventoryRecord>(&record.id).await? {
                    removed += 1;
                }
            }
            self.refresh_usage(&warehouse_id).await?;
        }
        if removed > 0 {
            info!(%product_id, removed, "product stock removed");
        }
        Ok(removed)
    }

    /// Copy a product's category and supplier onto all of its records.
    ///
    /// The caller holds the product's lock.
    pub async fn refresh_product_references(&self, product: &Product) -> ServiceResult<u64> {
        let (category_id, supplier_id) = (product.category_id, product.supplier_id);
        self.rewrite_records(Filter::eq("product_id", product.id), |record| {
            record.refresh_references(category_id, supplier_id);
        })
        .await
    }

    /// Null out a category reference on every record carrying it.
    pub async fn detach_category(&self, category_id: CategoryId) -> ServiceResult<u64> {
        self.rewrite_records(Filter::eq("category_id", category_id), |record| {
            if record.category_id == Some(category_id) {
                record.category_id = None;
            }
        })
        .await
    }

    /// Null out a supplier reference on every record carrying it.
    pub async fn detach_supplier(&self, supplier_id: SupplierId) -> ServiceResult<u64> {
        self.rewrite_records(Filter::eq("supplier_id", supplier_id), |record| {
            if record.supplier_id == Some(supplier_id) {
                record.supplier_id = None;
            }
        })
        .await
    }

    /// Capacity report computed from live stock.
    pub async fn warehouse_usage(&self, warehouse_id: WarehouseId) -> ServiceResult<Utilization> {
        let warehouse = self.store.get::<Warehouse>(&warehouse_id).await?;
        let usage = self.live_usage(&warehouse_id).await?;
        Ok(Utilization::of(&warehouse, usage))
    }

    /// Sum of stock across the warehouse's records.
    pub async fn live_usage(&self, warehouse_id: &WarehouseId) -> StoreResult<i64> {
        self.store
            .sum_field::<InventoryRecord>(&Filter::eq("warehouse_id", warehouse_id), "stock")
            .await
    }

    async fn pair_record(
        &self,
        product_id: &ProductId,
        warehouse_id: &WarehouseId,
    ) -> StoreResult<Option<InventoryRecord>> {
        let filter = Filter::eq("product_id", product_id).and(Filter::eq("warehouse_id", warehouse_id));
        self.store.find_one::<InventoryRecord>(&filter).await
    }

    /// Lock the record's warehouse, then re-read the record under the lock.
    async fn lock_record(&self, inventory_id: InventoryId) -> ServiceResult<(KeyGuard, InventoryRecord)> {
        let peek = self.store.get::<InventoryRecord>(&inventory_id).await?;
        let guard = self.locks.lock(&peek.warehouse_id).await;
        let record = self.store.get::<InventoryRecord>(&inventory_id).await?;
        if record.warehouse_id != peek.warehouse_id {
            // Records never change warehouse; treat it as gone.
            return Err(DomainError::not_found(InventoryRecord::LABEL).into());
        }
        Ok((guard, record))
    }

    async fn refresh_usage(&self, warehouse_id: &WarehouseId) -> ServiceResult<()> {
        if let Some(warehouse) = self.store.find_by_id::<Warehouse>(warehouse_id).await? {
            let usage = self.live_usage(warehouse_id).await?;
            self.sync_usage(warehouse, usage).await?;
        }
        Ok(())
    }

    async fn sync_usage(&self, mut warehouse: Warehouse, usage: i64) -> ServiceResult<()> {
        if warehouse.current_usage != usage {
            warehouse.current_usage = usage;
            self.store.replace(&warehouse).await?;
        }
        Ok(())
    }

    async fn warehouses_of(&self, filter: &Filter) -> StoreResult<Vec<WarehouseId>> {
        let mut ids: Vec<WarehouseId> = self
            .store
            .find_many::<InventoryRecord>(filter)
            .await?
            .into_iter()
            .map(|r| r.warehouse_id)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// Rewrite non-stock fields of matching records, one warehouse lock at a time.
    async fn rewrite_records<F>(&self, filter: Filter, apply: F) -> ServiceResult<u64>
    where
        F: Fn(&mut InventoryRecord),
    {
        let mut touched = 0;
        for warehouse_id in self.warehouses_of(&filter).await? {
            let _guard = self.locks.lock(&warehouse_id).await;
            let scoped = filter.clone().and(Filter::eq("warehouse_id", warehouse_id));
            for mut record in self.store.find_many::<InventoryRecord>(&scoped).await? {
                apply(&mut record);
                match self.store.replace(&record).await {
                    Ok(()) => touched += 1,
                    Err(ServiceError::Domain(DomainError::NotFound(_))) => {}
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(touched)
    }
}

#[cfg(test)]
mod tests;
