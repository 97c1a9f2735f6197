//! Per-key asynchronous mutual exclusion.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use stockyard_core::{ProductId, WarehouseId};

/// Entries beyond this count trigger a sweep of idle locks.
const PRUNE_THRESHOLD: usize = 1024;

/// A lazily-populated set of async mutexes, one per key.
///
/// Guards are owned so they can be held across `.await` points and returned
/// from helpers.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

/// Serializes every capacity check and usage write per warehouse.
pub type WarehouseLocks = KeyedLocks<WarehouseId>;

/// Serializes stock writes for a product against its deletion and updates.
pub type ProductLocks = KeyedLocks<ProductId>;

/// Guards for one or more keys; released together on drop.
#[derive(Debug)]
pub struct KeyGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Clone + Eq + Hash + Ord,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: &K) -> KeyGuard {
        let slot = self.slot(key);
        KeyGuard {
            _guards: vec![slot.lock_owned().await],
        }
    }

    /// Wait for exclusive access to every key.
    ///
    /// Keys are locked in ascending order and duplicates are collapsed, so two
    /// callers locking overlapping sets cannot deadlock.
    pub async fn lock_all(&self, keys: &[K]) -> KeyGuard {
        let mut ordered: Vec<K> = keys.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for key in &ordered {
            let slot = self.slot(key);
            guards.push(slot.lock_owned().await);
        }
        KeyGuard { _guards: guards }
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, key: &K) -> Arc<AsyncMutex<()>> {
        // The map is only touched synchronously; a poisoned guard still holds a
        // consistent map, so recover it.
        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slots.len() >= PRUNE_THRESHOLD {
            // Only the map holds an idle slot.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        }
        slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}
