//! Catalog services: validation and store orchestration for every entity.
//!
//! Anything that changes stock or warehouse usage is delegated to
//! [`StockAccounting`]; the rest is plain record bookkeeping with reference
//! checks. Read paths "populate" references by resolving ids into records.
//!
//! Lock order, outermost first: a uniqueness mutex (SKU or category name), the
//! category, the supplier, the product, then warehouses. Every path acquires in
//! this order, so reference checks and the writes they guard cannot interleave
//! with a delete of the referenced record.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use stockyard_core::{CategoryId, Entity, ProductId, SupplierId};
use stockyard_inventory::{InventoryRecord, Warehouse};

use crate::error::ServiceResult;
use crate::stock::{KeyedLocks, StockAccounting};
use crate::store::{Document, EntityStore, Filter};

mod categories;
mod inventory;
mod products;
mod suppliers;
mod warehouses;

pub use categories::{CategoryStock, CategorySummary};
pub use inventory::{DEFAULT_LOW_STOCK_THRESHOLD, InventoryView};
pub use products::ProductView;
pub use warehouses::WarehouseDetail;

/// Entry point for every catalog operation.
#[derive(Debug, Clone)]
pub struct Catalog {
    store: EntityStore,
    stock: Arc<StockAccounting>,
    locks: Arc<CatalogLocks>,
}

#[derive(Debug, Default)]
struct CatalogLocks {
    /// Held across a SKU uniqueness check and the write it guards.
    sku: AsyncMutex<()>,
    /// Held across a category name uniqueness check and the write it guards.
    category_names: AsyncMutex<()>,
    categories: KeyedLocks<CategoryId>,
    suppliers: KeyedLocks<SupplierId>,
}

impl Catalog {
    pub fn new(stock: Arc<StockAccounting>) -> Self {
        Self {
            store: stock.store().clone(),
            stock,
            locks: Arc::new(CatalogLocks::default()),
        }
    }

    /// Catalog over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(StockAccounting::new(EntityStore::in_memory())))
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn stock(&self) -> &StockAccounting {
        &self.stock
    }
}

/// Resolve `ids` into a lookup table.
async fn index<T>(store: &EntityStore, ids: impl IntoIterator<Item = T::Id>) -> ServiceResult<HashMap<T::Id, T>>
where
    T: Document,
{
    Ok(store
        .expand::<T>(ids)
        .await?
        .into_iter()
        .map(|r| (*r.id(), r))
        .collect())
}

fn unique<T: Ord + Copy>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut v: Vec<T> = items.into_iter().collect();
    v.sort();
    v.dedup();
    v
}

/// Warehouses holding any of `product_ids`, in id order.
async fn warehouses_stocking(store: &EntityStore, product_ids: &[ProductId]) -> ServiceResult<Vec<Warehouse>> {
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }
    let records = store
        .find_many::<InventoryRecord>(&Filter::any_of("product_id", product_ids.iter().copied()))
        .await?;
    let ids = unique(records.iter().map(|r| r.warehouse_id));
    Ok(store.expand::<Warehouse>(ids).await?)
}

#[cfg(test)]
pub(crate) mod test_support {
    use stockyard_inventory::NewWarehouse;
    use stockyard_products::{Category, Product, ProductDetails};
    use stockyard_suppliers::{NewSupplier, Supplier};

    use super::*;

    pub async fn category(c: &Catalog, name: &str) -> Category {
        c.create_category(name).await.unwrap()
    }

    pub fn new_supplier(name: &str) -> NewSupplier {
        NewSupplier {
            name: name.to_string(),
            contact_info: "555-0100".to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', "")),
            address: "1 Harbour Road".to_string(),
            rating: Some(4),
        }
    }

    pub async fn supplier(c: &Catalog, name: &str) -> Supplier {
        c.create_supplier(new_supplier(name)).await.unwrap()
    }

    pub fn details(name: &str, category: &Category, supplier: &Supplier) -> ProductDetails {
        ProductDetails {
            name: name.to_string(),
            description: Some(format!("{name} description")),
            price: 19.99,
            category_id: category.id,
            supplier_id: supplier.id,
            sku: None,
        }
    }

    pub async fn product(c: &Catalog, name: &str, category: &Category, supplier: &Supplier) -> Product {
        c.create_product(details(name, category, supplier)).await.unwrap()
    }

    pub async fn warehouse(c: &Catalog, name: &str, location: &str, capacity: i64) -> Warehouse {
        c.create_warehouse(NewWarehouse {
            name: name.to_string(),
            location: location.to_string(),
            capacity,
        })
        .await
        .unwrap()
    }
}
