//! Read-model storage boundary.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Key-value storage for one read model.
///
/// Projections write through this trait so the same projection code can sit
/// on top of an in-memory map in tests and a durable table in production.
/// Values are stored whole; partial updates go through read-modify-upsert.
pub trait ReadModelStore<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;

    fn upsert(&self, key: K, value: V);

    fn list(&self) -> Vec<V>;

    fn clear(&self);
}

/// Hash-map backed read-model store.
#[derive(Debug)]
pub struct InMemoryReadModelStore<K, V> {
    rows: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for InMemoryReadModelStore<K, V> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> InMemoryReadModelStore<K, V> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K, V> ReadModelStore<K, V> for InMemoryReadModelStore<K, V>
where
    K: Eq + std::hash::Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn upsert(&self, key: K, value: V) {
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    fn list(&self) -> Vec<V> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn clear(&self) {
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
