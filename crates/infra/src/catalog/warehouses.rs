use chrono::Utc;
use serde::Serialize;
use tracing::info;

use stockyard_core::{CategoryId, DomainError, ProductId, SupplierId, WarehouseId};
use stockyard_inventory::{InventoryRecord, NewWarehouse, Utilization, Warehouse, WarehouseUpdate};
use stockyard_products::{Category, Product};
use stockyard_suppliers::Supplier;

use super::{Catalog, unique, warehouses_stocking};
use crate::error::ServiceResult;
use crate::store::Filter;

/// A warehouse with live usage and the references derived from its inventory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarehouseDetail {
    #[serde(flatten)]
    pub warehouse: Warehouse,
    pub products: Vec<ProductId>,
    pub suppliers: Vec<SupplierId>,
    pub categories: Vec<CategoryId>,
    pub utilization: Utilization,
}

impl Catalog {
    pub async fn create_warehouse(&self, new: NewWarehouse) -> ServiceResult<Warehouse> {
        let warehouse = Warehouse::create(WarehouseId::new(), new, Utc::now())?;
        self.store.insert(&warehouse).await?;
        info!(warehouse_id = %warehouse.id, capacity = warehouse.capacity, "warehouse created");
        Ok(warehouse)
    }

    pub async fn list_warehouses(&self) -> ServiceResult<Vec<Warehouse>> {
        Ok(self.store.find_many::<Warehouse>(&Filter::All).await?)
    }

    pub async fn get_warehouse(&self, id: WarehouseId) -> ServiceResult<WarehouseDetail> {
        let mut warehouse = self.store.get::<Warehouse>(&id).await?;
        let records = self
            .store
            .find_many::<InventoryRecord>(&Filter::eq("warehouse_id", id))
            .await?;
        let usage: i64 = records.iter().map(|r| r.stock).sum();
        warehouse.current_usage = usage;

        Ok(WarehouseDetail {
            utilization: Utilization::of(&warehouse, usage),
            products: unique(records.iter().map(|r| r.product_id)),
            suppliers: unique(records.iter().filter_map(|r| r.supplier_id)),
            categories: unique(records.iter().filter_map(|r| r.category_id)),
            warehouse,
        })
    }

    pub async fn warehouses_by_name(&self, name: &str) -> ServiceResult<Vec<Warehouse>> {
        Ok(self.store.find_many::<Warehouse>(&Filter::contains("name", name)).await?)
    }

    pub async fn warehouses_by_location(&self, location: &str) -> ServiceResult<Vec<Warehouse>> {
        Ok(self
            .store
            .find_many::<Warehouse>(&Filter::contains("location", location))
            .await?)
    }

    /// Warehouses stocking products of the first supplier whose name matches.
    pub async fn warehouses_by_supplier_name(&self, name: &str) -> ServiceResult<Vec<Warehouse>> {
        let supplier = self
            .store
            .find_one::<Supplier>(&Filter::contains("name", name))
            .await?
            .ok_or_else(|| DomainError::not_found("supplier"))?;
        let products = self
            .store
            .find_many::<Product>(&Filter::eq("supplier_id", supplier.id))
            .await?;
        let ids: Vec<ProductId> = products.iter().map(|p| p.id).collect();
        warehouses_stocking(&self.store, &ids).await
    }

    pub async fn warehouses_by_product_name(&self, name: &str) -> ServiceResult<Vec<Warehouse>> {
        let products = self.store.find_many::<Product>(&Filter::contains("name", name)).await?;
        if products.is_empty() {
            return Err(DomainError::not_found("product").into());
        }
        let ids: Vec<ProductId> = products.iter().map(|p| p.id).collect();
        warehouses_stocking(&self.store, &ids).await
    }

    pub async fn warehouses_by_category_name(&self, name: &str) -> ServiceResult<Vec<Warehouse>> {
        let categories = self.store.find_many::<Category>(&Filter::contains("name", name)).await?;
        let category_ids: Vec<CategoryId> = categories.iter().map(|c| c.id).collect();
        let products = if category_ids.is_empty() {
            Vec::new()
        } else {
            self.store
                .find_many::<Product>(&Filter::any_of("category_id", category_ids))
                .await?
        };
        if products.is_empty() {
            return Err(DomainError::not_found("product").into());
        }
        let ids: Vec<ProductId> = products.iter().map(|p| p.id).collect();
        warehouses_stocking(&self.store, &ids).await
    }

    pub async fn warehouse_utilization(&self, id: WarehouseId) -> ServiceResult<Utilization> {
        self.stock.warehouse_usage(id).await
    }

    pub async fn update_warehouse(&self, id: WarehouseId, update: WarehouseUpdate) -> ServiceResult<Warehouse> {
        self.stock.update_warehouse(id, update).await
    }

    /// Returns how many inventory records were removed along with it.
    pub async fn delete_warehouse(&self, id: WarehouseId, force: bool) -> ServiceResult<u64> {
        self.stock.delete_warehouse(id, force).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::stock::AddStock;

    async fn stock(c: &Catalog, product: ProductId, warehouse: WarehouseId, quantity: i64) {
        c.stock()
            .add_stock(AddStock {
                product_id: product,
                warehouse_id: warehouse,
                quantity,
                unit_price: None,
                expiry_date: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn detail_derives_references_from_inventory() {
        let c = Catalog::in_memory();
        let kids = category(&c, "Kids").await;
        let acme = supplier(&c, "Acme").await;
        let shirt = product(&c, "Shirt", &kids, &acme).await;
        let shorts = product(&c, "Shorts", &kids, &acme).await;
        let w = warehouse(&c, "Main", "North", 100).await;
        stock(&c, shirt.id, w.id, 10).await;
        stock(&c, shorts.id, w.id, 15).await;

        let detail = c.get_warehouse(w.id).await.unwrap();
        assert_eq!(detail.warehouse.current_usage, 25);
        assert_eq!(detail.products.len(), 2);
        assert_eq!(detail.suppliers, vec![acme.id]);
        assert_eq!(detail.categories, vec![kids.id]);
        assert_eq!(detail.utilization.available, 75);
        assert_eq!(detail.utilization.utilization_percent, 25.0);
    }

    #[tokio::test]
    async fn name_and_location_search_is_substring() {
        let c = Catalog::in_memory();
        warehouse(&c, "Central Depot", "Leeds", 10).await;
        warehouse(&c, "North Depot", "York", 10).await;

        assert_eq!(c.warehouses_by_name("depot").await.unwrap().len(), 2);
        assert_eq!(c.warehouses_by_location("YORK").await.unwrap().len(), 1);
        assert!(c.warehouses_by_name("south").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lookups_by_supplier_product_and_category() {
        let c = Catalog::in_memory();
        let kids = category(&c, "Kids").await;
        let pets = category(&c, "Pets").await;
        let acme = supplier(&c, "Acme").await;
        let shirt = product(&c, "Shirt", &kids, &acme).await;
        product(&c, "Collar", &pets, &acme).await;
        let a = warehouse(&c, "A", "North", 100).await;
        warehouse(&c, "B", "South", 100).await;
        stock(&c, shirt.id, a.id, 5).await;

        let by_supplier = c.warehouses_by_supplier_name("acme").await.unwrap();
        assert_eq!(by_supplier.iter().map(|w| w.id).collect::<Vec<_>>(), vec![a.id]);
        let by_product = c.warehouses_by_product_name("shirt").await.unwrap();
        assert_eq!(by_product.len(), 1);
        let by_category = c.warehouses_by_category_name("kid").await.unwrap();
        assert_eq!(by_category.len(), 1);
        // Products exist but are not stocked anywhere.
        assert!(c.warehouses_by_category_name("pets").await.unwrap().is_empty());

        assert!(c.warehouses_by_supplier_name("nobody").await.is_err());
        assert!(c.warehouses_by_product_name("boots").await.is_err());
        assert!(c.warehouses_by_category_name("garden").await.is_err());
    }
}
