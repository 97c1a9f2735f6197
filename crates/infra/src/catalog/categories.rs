use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use stockyard_core::{CategoryId, DomainError};
use stockyard_inventory::InventoryRecord;
use stockyard_products::{Category, Product};

use super::Catalog;
use crate::error::ServiceResult;
use crate::store::Filter;

/// A category with its products and their live count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    #[serde(flatten)]
    pub category: Category,
    pub product_count: usize,
    pub products: Vec<Product>,
}

/// Total units held across every warehouse for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryStock {
    pub category_id: CategoryId,
    pub total_stock: i64,
}

impl Catalog {
    pub async fn create_category(&self, name: &str) -> ServiceResult<Category> {
        Ok(self.create_categories(&[name.to_string()]).await?.remove(0))
    }

    /// Create several categories at once. Nothing is written unless every name is
    /// valid and unused.
    pub async fn create_categories(&self, names: &[String]) -> ServiceResult<Vec<Category>> {
        if names.is_empty() {
            return Err(DomainError::validation("empty array is not allowed").into());
        }
        let now = Utc::now();
        let categories = names
            .iter()
            .map(|n| Category::create(CategoryId::new(), n, now))
            .collect::<Result<Vec<_>, _>>()?;

        let _names = self.locks.category_names.lock().await;
        for (i, category) in categories.iter().enumerate() {
            if categories[..i].iter().any(|c| c.name == category.name) {
                return Err(DomainError::conflict(format!("category '{}' appears twice", category.name)).into());
            }
            self.ensure_category_name_free(&category.name, None).await?;
        }
        for category in &categories {
            self.store.insert(category).await?;
        }
        info!(count = categories.len(), "categories created");
        Ok(categories)
    }

    pub async fn list_categories(&self) -> ServiceResult<Vec<Category>> {
        Ok(self.store.find_many::<Category>(&Filter::All).await?)
    }

    pub async fn category_summaries(&self) -> ServiceResult<Vec<CategorySummary>> {
        let categories = self.list_categories().await?;
        let products = self.store.find_many::<Product>(&Filter::All).await?;
        Ok(categories
            .into_iter()
            .map(|category| {
                let products: Vec<Product> = products
                    .iter()
                    .filter(|p| p.category_id == Some(category.id))
                    .cloned()
                    .collect();
                CategorySummary {
                    category,
                    product_count: products.len(),
                    products,
                }
            })
            .collect())
    }

    pub async fn get_category(&self, id: CategoryId) -> ServiceResult<Category> {
        self.store.get::<Category>(&id).await
    }

    /// Exact-name lookup, with products.
    pub async fn category_by_name(&self, name: &str) -> ServiceResult<CategorySummary> {
        let category = self
            .store
            .find_one::<Category>(&Filter::eq("name", name.trim()))
            .await?
            .ok_or_else(|| DomainError::not_found("category"))?;
        let products = self.products_of(category.id).await?;
        Ok(CategorySummary {
            category,
            product_count: products.len(),
            products,
        })
    }

    pub async fn products_in_category(&self, id: CategoryId) -> ServiceResult<Vec<Product>> {
        self.store.get::<Category>(&id).await?;
        self.products_of(id).await
    }

    /// Units currently held for the category's products, from live inventory.
    pub async fn category_stock(&self, id: CategoryId) -> ServiceResult<CategoryStock> {
        self.store.get::<Category>(&id).await?;
        let total_stock = self
            .store
            .sum_field::<InventoryRecord>(&Filter::eq("category_id", id), "stock")
            .await?;
        Ok(CategoryStock {
            category_id: id,
            total_stock,
        })
    }

    pub async fn rename_category(&self, id: CategoryId, name: &str) -> ServiceResult<Category> {
        let _names = self.locks.category_names.lock().await;
        let _category = self.locks.categories.lock(&id).await;
        let mut category = self.store.get::<Category>(&id).await?;
        category.rename(name, Utc::now())?;
        self.ensure_category_name_free(&category.name, Some(id)).await?;
        self.store.replace(&category).await?;
        Ok(category)
    }

    /// Delete a category. Blocked while products or inventory reference it unless
    /// `force`, which clears those references.
    pub async fn delete_category(&self, id: CategoryId, force: bool) -> ServiceResult<()> {
        let _category = self.locks.categories.lock(&id).await;
        self.store.get::<Category>(&id).await?;
        let products = self.store.count::<Product>(&Filter::eq("category_id", id)).await?;
        let records = self
            .store
            .count::<InventoryRecord>(&Filter::eq("category_id", id))
            .await?;

        if products + records > 0 {
            if !force {
                return Err(DomainError::conflict(format!(
                    "category is referenced by {products} product(s) and {records} inventory record(s)"
                ))
                .into());
            }
            let cleared = self
                .rewrite_products(Filter::eq("category_id", id), |product| {
                    product.category_id.take_if(|c| *c == id).is_some()
                })
                .await?;
            let detached = self.stock.detach_category(id).await?;
            warn!(category_id = %id, products = cleared, inventory = detached, "category references cleared");
        }

        self.store.delete_by_id::<Category>(&id).await?;
        info!(category_id = %id, "category deleted");
        Ok(())
    }

    async fn products_of(&self, id: CategoryId) -> ServiceResult<Vec<Product>> {
        Ok(self.store.find_many::<Product>(&Filter::eq("category_id", id)).await?)
    }

    async fn ensure_category_name_free(&self, name: &str, owner: Option<CategoryId>) -> ServiceResult<()> {
        let taken = self
            .store
            .find_one::<Category>(&Filter::eq("name", name))
            .await?
            .is_some_and(|c| Some(c.id) != owner);
        if taken {
            return Err(DomainError::conflict(format!("category '{name}' already exists")).into());
        }
        Ok(())
    }
}
