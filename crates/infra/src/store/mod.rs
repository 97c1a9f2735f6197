//! Entity Store: persistence for products, categories, suppliers, warehouses and
//! inventory records.
//!
//! Two layers:
//! - [`DocumentStore`]: object-safe async backend storing raw JSON documents grouped
//!   by collection (in-memory, or Postgres behind the `postgres` feature).
//! - [`EntityStore`]: typed facade that (de)serializes [`Document`] records.
//!
//! No transactional guarantee spans multiple calls. Callers needing cross-record
//! consistency serialize themselves (see `stock::KeyedLocks`).

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map as JsonMap, Value as JsonValue};
use thiserror::Error;

use stockyard_core::{DomainError, Entity};
use stockyard_inventory::{InventoryRecord, Warehouse};
use stockyard_products::{Category, Product};
use stockyard_suppliers::Supplier;

use crate::error::{ServiceError, ServiceResult};

pub mod filter;
pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use filter::Filter;
pub use in_memory::InMemoryDocumentStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresDocumentStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store operation error (infrastructure, not domain).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Insert targeted an id that already exists in the collection.
    #[error("duplicate id '{id}' in collection '{collection}'")]
    Duplicate { collection: String, id: String },

    /// A stored document could not be (de)serialized into its record type.
    #[error("serialization error in '{collection}': {message}")]
    Serialization { collection: String, message: String },

    /// Backend failure (connection, query, poisoned lock, ...).
    #[error("backend error: {0}")]
    Backend(String),
}

/// Raw document backend.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<JsonValue>>;

    /// Documents matching `filter`, ordered by id (creation order for UUIDv7 ids).
    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<JsonValue>>;

    async fn insert(&self, collection: &str, id: &str, doc: JsonValue) -> StoreResult<()>;

    /// Overwrite an existing document. Returns `false` when no document has this id.
    async fn replace(&self, collection: &str, id: &str, doc: JsonValue) -> StoreResult<bool>;

    /// Returns `false` when no document has this id.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        Ok(self.find(collection, filter).await?.len() as u64)
    }

    /// Sum of an integer field across matching documents (missing fields count as 0).
    async fn sum(&self, collection: &str, filter: &Filter, field: &str) -> StoreResult<i64> {
        let docs = self.find(collection, filter).await?;
        Ok(docs
            .iter()
            .filter_map(|d| d.get(field).and_then(JsonValue::as_i64))
            .sum())
    }
}

/// A record type persisted in its own collection.
pub trait Document: Entity + Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;
    /// Human-readable name used in "not found" messages.
    const LABEL: &'static str;
}

impl Document for Product {
    const COLLECTION: &'static str = "products";
    const LABEL: &'static str = "product";
}

impl Document for Category {
    const COLLECTION: &'static str = "categories";
    const LABEL: &'static str = "category";
}

impl Document for Supplier {
    const COLLECTION: &'static str = "suppliers";
    const LABEL: &'static str = "supplier";
}

impl Document for Warehouse {
    const COLLECTION: &'static str = "warehouses";
    const LABEL: &'static str = "warehouse";
}

impl Document for InventoryRecord {
    const COLLECTION: &'static str = "inventory";
    const LABEL: &'static str = "inventory record";
}

/// Typed access to the document backend.
#[derive(Clone)]
pub struct EntityStore {
    inner: Arc<dyn DocumentStore>,
}

impl core::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntityStore").finish_non_exhaustive()
    }
}

impl EntityStore {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self { inner }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryDocumentStore::new()))
    }

    pub async fn find_by_id<T: Document>(&self, id: &T::Id) -> StoreResult<Option<T>> {
        match self.inner.get(T::COLLECTION, &id.to_string()).await? {
            Some(doc) => decode::<T>(doc).map(Some),
            None => Ok(None),
        }
    }

    /// Like [`find_by_id`](Self::find_by_id) but a missing record is `DomainError::NotFound`.
    pub async fn get<T: Document>(&self, id: &T::Id) -> ServiceResult<T> {
        self.find_by_id::<T>(id)
            .await?
            .ok_or_else(|| ServiceError::Domain(DomainError::not_found(T::LABEL)))
    }

    pub async fn find_one<T: Document>(&self, filter: &Filter) -> StoreResult<Option<T>> {
        let docs = self.inner.find(T::COLLECTION, filter).await?;
        docs.into_iter().next().map(decode::<T>).transpose()
    }

    pub async fn find_many<T: Document>(&self, filter: &Filter) -> StoreResult<Vec<T>> {
        let docs = self.inner.find(T::COLLECTION, filter).await?;
        docs.into_iter().map(decode::<T>).collect()
    }

    pub async fn insert<T: Document>(&self, record: &T) -> StoreResult<()> {
        let doc = encode(record)?;
        self.inner.insert(T::COLLECTION, &record.id().to_string(), doc).await
    }

    /// Overwrite a record that must already exist.
    pub async fn replace<T: Document>(&self, record: &T) -> ServiceResult<()> {
        let doc = encode(record)?;
        let found = self.inner.replace(T::COLLECTION, &record.id().to_string(), doc).await?;
        if !found {
            return Err(DomainError::not_found(T::LABEL).into());
        }
        Ok(())
    }

    /// Shallow-merge `patch` into the stored document and return the updated record.
    ///
    /// The merged document must still decode as `T`; otherwise nothing is written.
    pub async fn update_by_id<T: Document>(
        &self,
        id: &T::Id,
        patch: JsonMap<String, JsonValue>,
    ) -> StoreResult<Option<T>> {
        let key = id.to_string();
        let Some(mut doc) = self.inner.get(T::COLLECTION, &key).await? else {
            return Ok(None);
        };
        if let JsonValue::Object(map) = &mut doc {
            for (k, v) in patch {
                map.insert(k, v);
            }
        }
        let record = decode::<T>(doc.clone())?;
        if !self.inner.replace(T::COLLECTION, &key, doc).await? {
            return Ok(None);
        }
        Ok(Some(record))
    }

    pub async fn delete_by_id<T: Document>(&self, id: &T::Id) -> StoreResult<bool> {
        self.inner.delete(T::COLLECTION, &id.to_string()).await
    }

    pub async fn count<T: Document>(&self, filter: &Filter) -> StoreResult<u64> {
        self.inner.count(T::COLLECTION, filter).await
    }

    pub async fn sum_field<T: Document>(&self, filter: &Filter, field: &str) -> StoreResult<i64> {
        self.inner.sum(T::COLLECTION, filter, field).await
    }

    /// Resolve references: every record whose id is in `ids` (unknown ids are skipped).
    pub async fn expand<T: Document>(&self, ids: impl IntoIterator<Item = T::Id>) -> StoreResult<Vec<T>> {
        let ids: Vec<String> = ids.into_iter().map(|id| id.to_string()).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.find_many::<T>(&Filter::any_of("id", ids)).await
    }
}

fn encode<T: Document>(record: &T) -> StoreResult<JsonValue> {
    serde_json::to_value(record).map_err(|e| StoreError::Serialization {
        collection: T::COLLECTION.to_string(),
        message: e.to_string(),
    })
}

fn decode<T: Document>(doc: JsonValue) -> StoreResult<T> {
    serde_json::from_value(doc).map_err(|e| StoreError::Serialization {
        collection: T::COLLECTION.to_string(),
        message: e.to_string(),
    })
}
