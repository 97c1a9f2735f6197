use chrono::Utc;
use serde::Serialize;
use tracing::info;

use stockyard_core::{DomainError, ProductId};
use stockyard_inventory::InventoryRecord;
use stockyard_products::{Category, Product, ProductDetails, ProductSummary};
use stockyard_suppliers::Supplier;

use super::{Catalog, index};
use crate::error::ServiceResult;
use crate::stock::KeyGuard;
use crate::store::Filter;

/// A product with its category and supplier populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub category: Option<Category>,
    pub supplier: Option<Supplier>,
}

impl Catalog {
    pub async fn create_product(&self, details: ProductDetails) -> ServiceResult<Product> {
        details.validate()?;
        let _sku = self.locks.sku.lock().await;
        let _refs = self.lock_references(&details).await;
        self.ensure_product_references(&details).await?;
        self.ensure_sku_free(details.sku.as_deref(), None).await?;

        let product = Product::create(ProductId::new(), details, Utc::now())?;
        self.store.insert(&product).await?;
        info!(product_id = %product.id, name = %product.name, "product created");
        Ok(product)
    }

    pub async fn list_products(&self) -> ServiceResult<Vec<ProductView>> {
        let products = self.store.find_many::<Product>(&Filter::All).await?;
        self.product_views(products).await
    }

    pub async fn get_product(&self, id: ProductId) -> ServiceResult<ProductView> {
        let product = self.store.get::<Product>(&id).await?;
        Ok(self.product_views(vec![product]).await?.remove(0))
    }

    /// Case-insensitive name search. An empty result is not an error.
    pub async fn search_products(&self, name: &str) -> ServiceResult<Vec<ProductSummary>> {
        let products = self.store.find_many::<Product>(&Filter::contains("name", name)).await?;
        Ok(products.iter().map(Product::summary).collect())
    }

    pub async fn product_by_sku(&self, sku: &str) -> ServiceResult<ProductView> {
        let product = self
            .store
            .find_one::<Product>(&Filter::eq("sku", sku.trim()))
            .await?
            .ok_or_else(|| DomainError::not_found("product"))?;
        Ok(self.product_views(vec![product]).await?.remove(0))
    }

    /// Full replacement. Inventory records of the product pick up the new
    /// category and supplier.
    pub async fn update_product(&self, id: ProductId, details: ProductDetails) -> ServiceResult<Product> {
        details.validate()?;
        let _sku = self.locks.sku.lock().await;
        let _refs = self.lock_references(&details).await;
        let _product = self.stock.lock_product(&id).await;

        let mut product = self.store.get::<Product>(&id).await?;
        self.ensure_product_references(&details).await?;
        self.ensure_sku_free(details.sku.as_deref(), Some(id)).await?;
        product.replace_details(details, Utc::now())?;
        self.store.replace(&product).await?;

        let refreshed = self.stock.refresh_product_references(&product).await?;
        info!(product_id = %id, inventory_refreshed = refreshed, "product updated");
        Ok(product)
    }

    /// Delete a product. Blocked while inventory holds it, unless `force`, which
    /// removes that inventory first.
    pub async fn delete_product(&self, id: ProductId, force: bool) -> ServiceResult<()> {
        let _product = self.stock.lock_product(&id).await;
        self.store.get::<Product>(&id).await?;
        let held = self
            .store
            .count::<InventoryRecord>(&Filter::eq("product_id", id))
            .await?;
        if held > 0 {
            if !force {
                return Err(DomainError::conflict(format!(
                    "product is referenced by {held} inventory record(s)"
                ))
                .into());
            }
            self.stock.remove_product_stock(id).await?;
        }
        self.store.delete_by_id::<Product>(&id).await?;
        info!(product_id = %id, "product deleted");
        Ok(())
    }

    pub(super) async fn product_views(&self, products: Vec<Product>) -> ServiceResult<Vec<ProductView>> {
        let categories = index::<Category>(&self.store, products.iter().filter_map(|p| p.category_id)).await?;
        let suppliers = index::<Supplier>(&self.store, products.iter().filter_map(|p| p.supplier_id)).await?;
        Ok(products
            .into_iter()
            .map(|product| ProductView {
                category: product.category_id.and_then(|id| categories.get(&id).cloned()),
                supplier: product.supplier_id.and_then(|id| suppliers.get(&id).cloned()),
                product,
            })
            .collect())
    }

    /// Rewrite every product matching `filter`, one product lock at a time, and
    /// carry the change onto its inventory. `apply` returns whether it changed
    /// the product. Returns how many products changed.
    pub(super) async fn rewrite_products<F>(&self, filter: Filter, apply: F) -> ServiceResult<u64>
    where
        F: Fn(&mut Product) -> bool,
    {
        let mut changed = 0;
        for candidate in self.store.find_many::<Product>(&filter).await? {
            let _product = self.stock.lock_product(&candidate.id).await;
            let Some(mut product) = self.store.find_by_id::<Product>(&candidate.id).await? else {
                continue;
            };
            if !apply(&mut product) {
                continue;
            }
            product.updated_at = Utc::now();
            self.store.replace(&product).await?;
            self.stock.refresh_product_references(&product).await?;
            changed += 1;
        }
        Ok(changed)
    }

    /// Category then supplier, per the catalog lock order.
    async fn lock_references(&self, details: &ProductDetails) -> (KeyGuard, KeyGuard) {
        let category = self.locks.categories.lock(&details.category_id).await;
        let supplier = self.locks.suppliers.lock(&details.supplier_id).await;
        (category, supplier)
    }

    async fn ensure_product_references(&self, details: &ProductDetails) -> ServiceResult<()> {
        self.store.get::<Category>(&details.category_id).await?;
        self.store.get::<Supplier>(&details.supplier_id).await?;
        Ok(())
    }

    async fn ensure_sku_free(&self, sku: Option<&str>, owner: Option<ProductId>) -> ServiceResult<()> {
        let Some(sku) = sku else {
            return Ok(());
        };
        let taken = self
            .store
            .find_one::<Product>(&Filter::eq("sku", sku.trim()))
            .await?
            .is_some_and(|p| Some(p.id) != owner);
        if taken {
            return Err(DomainError::conflict(format!("sku '{}' is already in use", sku.trim())).into());
        }
        Ok(())
    }
}
