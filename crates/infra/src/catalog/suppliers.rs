use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use stockyard_core::{DomainError, ProductId, SupplierId, WarehouseId};
use stockyard_inventory::InventoryRecord;
use stockyard_products::Product;
use stockyard_suppliers::{DeliveryLog, NewSupplier, Supplier, SupplierUpdate};

use super::{Catalog, unique};
use crate::error::ServiceResult;
use crate::stock::{AddStock, StockReceipt};
use crate::store::Filter;

impl Catalog {
    pub async fn create_supplier(&self, new: NewSupplier) -> ServiceResult<Supplier> {
        Ok(self.create_suppliers(vec![new]).await?.remove(0))
    }

    /// Register several suppliers; nothing is written unless all are valid.
    pub async fn create_suppliers(&self, batch: Vec<NewSupplier>) -> ServiceResult<Vec<Supplier>> {
        if batch.is_empty() {
            return Err(DomainError::validation("empty array is not allowed").into());
        }
        let now = Utc::now();
        let suppliers = batch
            .into_iter()
            .map(|n| Supplier::register(SupplierId::new(), n, now))
            .collect::<Result<Vec<_>, _>>()?;
        for supplier in &suppliers {
            self.store.insert(supplier).await?;
        }
        info!(count = suppliers.len(), "suppliers created");
        Ok(suppliers)
    }

    pub async fn list_suppliers(&self) -> ServiceResult<Vec<Supplier>> {
        Ok(self.store.find_many::<Supplier>(&Filter::All).await?)
    }

    pub async fn get_supplier(&self, id: SupplierId) -> ServiceResult<Supplier> {
        self.store.get::<Supplier>(&id).await
    }

    /// Case-insensitive name search; no match is `NotFound`.
    pub async fn search_suppliers(&self, name: &str) -> ServiceResult<Vec<Supplier>> {
        let found = self.store.find_many::<Supplier>(&Filter::contains("name", name)).await?;
        if found.is_empty() {
            return Err(DomainError::not_found("supplier").into());
        }
        Ok(found)
    }

    pub async fn update_supplier(&self, id: SupplierId, update: SupplierUpdate) -> ServiceResult<Supplier> {
        let _supplier = self.locks.suppliers.lock(&id).await;
        let mut supplier = self.store.get::<Supplier>(&id).await?;
        supplier.apply_update(update, Utc::now())?;
        self.store.replace(&supplier).await?;
        Ok(supplier)
    }

    /// Delete a supplier. Blocked while products reference it unless `force`,
    /// which clears product and inventory references.
    pub async fn delete_supplier(&self, id: SupplierId, force: bool) -> ServiceResult<()> {
        let _supplier = self.locks.suppliers.lock(&id).await;
        self.store.get::<Supplier>(&id).await?;
        let products = self.store.count::<Product>(&Filter::eq("supplier_id", id)).await?;
        if products > 0 {
            if !force {
                return Err(DomainError::conflict(format!("supplier is referenced by {products} product(s)")).into());
            }
            let cleared = self
                .rewrite_products(Filter::eq("supplier_id", id), |product| {
                    product.supplier_id.take_if(|s| *s == id).is_some()
                })
                .await?;
            let detached = self.stock.detach_supplier(id).await?;
            warn!(supplier_id = %id, products = cleared, inventory = detached, "supplier references cleared");
        }
        self.store.delete_by_id::<Supplier>(&id).await?;
        info!(supplier_id = %id, "supplier deleted");
        Ok(())
    }

    /// Suppliers that delivered any product whose name contains `name`.
    pub async fn suppliers_by_product_name(&self, name: &str) -> ServiceResult<Vec<Supplier>> {
        let products = self.store.find_many::<Product>(&Filter::contains("name", name)).await?;
        if products.is_empty() {
            return Err(DomainError::not_found("product").into());
        }
        let ids: Vec<ProductId> = products.iter().map(|p| p.id).collect();
        let suppliers = self
            .store
            .find_many::<Supplier>(&Filter::any_of("delivery_logs.product_id", ids))
            .await?;
        if suppliers.is_empty() {
            return Err(DomainError::not_found("supplier").into());
        }
        Ok(suppliers)
    }

    /// Suppliers of the products stocked in a warehouse.
    pub async fn suppliers_by_warehouse(&self, warehouse_id: WarehouseId) -> ServiceResult<Vec<Supplier>> {
        let records = self
            .store
            .find_many::<InventoryRecord>(&Filter::eq("warehouse_id", warehouse_id))
            .await?;
        if records.is_empty() {
            return Err(DomainError::not_found("inventory record").into());
        }
        let products = self
            .store
            .expand::<Product>(unique(records.iter().map(|r| r.product_id)))
            .await?;
        let supplier_ids = unique(products.iter().filter_map(|p| p.supplier_id));
        if supplier_ids.is_empty() {
            return Err(DomainError::not_found("supplier").into());
        }
        Ok(self.store.expand::<Supplier>(supplier_ids).await?)
    }

    /// Receive a delivery: the stock goes into the warehouse first and the log is
    /// only written once it was accepted.
    pub async fn record_delivery(
        &self,
        supplier_id: SupplierId,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        quantity: i64,
        unit_price: Option<f64>,
        expiry_date: Option<NaiveDate>,
    ) -> ServiceResult<(Supplier, StockReceipt)> {
        let _supplier = self.locks.suppliers.lock(&supplier_id).await;
        let mut supplier = self.store.get::<Supplier>(&supplier_id).await?;
        let now = Utc::now();
        let log = DeliveryLog {
            product_id,
            warehouse_id,
            quantity,
            date: now,
        };
        // Validate against a scratch copy before moving stock.
        supplier.clone().record_delivery(log.clone())?;

        let receipt = self
            .stock
            .add_stock(AddStock {
                product_id,
                warehouse_id,
                quantity,
                unit_price,
                expiry_date,
            })
            .await?;

        supplier.record_delivery(log)?;
        self.store.replace(&supplier).await?;
        info!(%supplier_id, %product_id, %warehouse_id, quantity, "delivery recorded");
        Ok((supplier, receipt))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn batch_create_validates_every_entry_first() {
        let c = Catalog::in_memory();
        let mut bad = new_supplier("Broken");
        bad.email = "not-an-email".to_string();

        let err = c
            .create_suppliers(vec![new_supplier("Acme"), bad])
            .await
            .unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::Validation(_))));
        assert!(c.list_suppliers().await.unwrap().is_empty());

        let err = c.create_suppliers(Vec::new()).await.unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn search_without_match_is_not_found() {
        let c = Catalog::in_memory();
        supplier(&c, "Acme Textiles").await;
        assert_eq!(c.search_suppliers("textile").await.unwrap().len(), 1);
        let err = c.search_suppliers("zzz").await.unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_is_partial() {
        let c = Catalog::in_memory();
        let s = supplier(&c, "Acme").await;
        let updated = c
            .update_supplier(
                s.id,
                SupplierUpdate {
                    address: Some("2 Quay Street".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.address, "2 Quay Street");
        assert_eq!(updated.name, "Acme");
        assert_eq!(updated.rating, Some(4));
    }

    #[tokio::test]
    async fn delivery_adds_stock_and_logs() {
        let c = Catalog::in_memory();
        let cat = category(&c, "Kids").await;
        let s = supplier(&c, "Acme").await;
        let p = product(&c, "Shirt", &cat, &s).await;
        let w = warehouse(&c, "Main", "North", 10).await;

        let (updated, receipt) = c.record_delivery(s.id, p.id, w.id, 6, None, None).await.unwrap();
        assert_eq!(updated.delivery_logs.len(), 1);
        assert_eq!(receipt.current_usage, 6);

        // Over capacity: stock is rejected and nothing is logged.
        let err = c.record_delivery(s.id, p.id, w.id, 6, None, None).await.unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::CapacityExceeded { .. })));
        assert_eq!(c.get_supplier(s.id).await.unwrap().delivery_logs.len(), 1);

        let by_product = c.suppliers_by_product_name("shi").await.unwrap();
        assert_eq!(by_product[0].id, s.id);
        let by_warehouse = c.suppliers_by_warehouse(w.id).await.unwrap();
        assert_eq!(by_warehouse[0].id, s.id);
    }

    #[tokio::test]
    async fn lookups_report_missing_links() {
        let c = Catalog::in_memory();
        let cat = category(&c, "Kids").await;
        let s = supplier(&c, "Acme").await;
        product(&c, "Shirt", &cat, &s).await;
        let w = warehouse(&c, "Main", "North", 10).await;

        let err = c.suppliers_by_product_name("boots").await.unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::NotFound(what)) if what == "product"));
        let err = c.suppliers_by_product_name("shirt").await.unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::NotFound(what)) if what == "supplier"));
        let err = c.suppliers_by_warehouse(w.id).await.unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_blocked_by_products_unless_forced() {
        let c = Catalog::in_memory();
        let cat = category(&c, "Kids").await;
        let s = supplier(&c, "Acme").await;
        let p = product(&c, "Shirt", &cat, &s).await;

        let err = c.delete_supplier(s.id, false).await.unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::Conflict(_))));

        c.delete_supplier(s.id, true).await.unwrap();
        assert_eq!(c.store().get::<Product>(&p.id).await.unwrap().supplier_id, None);
        assert!(c.get_supplier(s.id).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn delivery_racing_supplier_delete_moves_stock_only_when_logged() {
        let c = Catalog::in_memory();
        let cat = category(&c, "Kids").await;
        let anchor = supplier(&c, "Anchor").await;
        let product_id = product(&c, "Shirt", &cat, &anchor).await.id;

        for round in 0..50 {
            let supplier_id = supplier(&c, &format!("Vendor {round}")).await.id;
            let warehouse_id = warehouse(&c, &format!("Bay {round}"), "North", 100).await.id;
            let delivery = {
                let c = c.clone();
                tokio::spawn(async move {
                    c.record_delivery(supplier_id, product_id, warehouse_id, 5, None, None)
                        .await
                })
            };
            let deleter = {
                let c = c.clone();
                tokio::spawn(async move { c.delete_supplier(supplier_id, false).await })
            };
            let delivered = delivery.await.unwrap();
            deleter.await.unwrap().unwrap();

            let usage = c.stock().live_usage(&warehouse_id).await.unwrap();
            match delivered {
                Ok((supplier, receipt)) => {
                    assert_eq!(supplier.delivery_logs.len(), 1);
                    assert_eq!(receipt.current_usage, 5);
                    assert_eq!(usage, 5, "round {round}");
                }
                Err(err) => {
                    assert!(matches!(err.domain(), Some(DomainError::NotFound(_))), "round {round}");
                    assert_eq!(usage, 0, "round {round}");
                }
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn product_created_during_forced_delete_loses_the_supplier() {
        let c = Catalog::in_memory();
        let cat = category(&c, "Kids").await;

        for round in 0..50 {
            let sup = supplier(&c, &format!("Vendor {round}")).await;
            let supplier_id = sup.id;
            let coat = details("Coat", &cat, &sup);
            let creator = {
                let c = c.clone();
                tokio::spawn(async move { c.create_product(coat).await })
            };
            let deleter = {
                let c = c.clone();
                tokio::spawn(async move { c.delete_supplier(supplier_id, true).await })
            };
            let created = creator.await.unwrap();
            deleter.await.unwrap().unwrap();

            if let Ok(product) = created {
                let stored = c.store().get::<Product>(&product.id).await.unwrap();
                assert_eq!(stored.supplier_id, None, "round {round}");
            }
        }
    }
}
