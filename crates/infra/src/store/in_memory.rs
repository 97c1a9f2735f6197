use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use super::{DocumentStore, Filter, StoreError, StoreResult};

/// In-memory document store.
///
/// Intended for tests/dev and single-process deployments. Documents are kept per
/// collection in id order.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, BTreeMap<String, JsonValue>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<JsonValue>> {
        let map = self.collections.read().map_err(|_| poisoned())?;
        Ok(map.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<JsonValue>> {
        let map = self.collections.read().map_err(|_| poisoned())?;
        let Some(docs) = map.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs.values().filter(|d| filter.matches(d)).cloned().collect())
    }

    async fn insert(&self, collection: &str, id: &str, doc: JsonValue) -> StoreResult<()> {
        let mut map = self.collections.write().map_err(|_| poisoned())?;
        let docs = map.entry(collection.to_string()).or_default();
        if docs.contains_key(id) {
            return Err(StoreError::Duplicate {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        docs.insert(id.to_string(), doc);
        Ok(())
    }

    async fn replace(&self, collection: &str, id: &str, doc: JsonValue) -> StoreResult<bool> {
        let mut map = self.collections.write().map_err(|_| poisoned())?;
        match map.get_mut(collection).and_then(|c| c.get_mut(id)) {
            Some(slot) => {
                *slot = doc;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let mut map = self.collections.write().map_err(|_| poisoned())?;
        Ok(map
            .get_mut(collection)
            .map(|c| c.remove(id).is_some())
            .unwrap_or(false))
    }
}
