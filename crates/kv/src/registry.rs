//! Named store registry
//!
//! Hands out one shared [`MemoryStore`] per cluster name, so independent
//! components that address the same cluster see the same data. The registry
//! is an explicit value rather than process-global state; a
//! [`crate::StoreRegistry`] is typically owned by the top-level database
//! handle and passed to whoever needs a store.

use crate::memory::MemoryStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of in-memory stores keyed by cluster name
#[derive(Debug, Default)]
pub struct StoreRegistry {
    stores: Mutex<HashMap<String, Arc<MemoryStore>>>,
}

impl StoreRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the store for `cluster`, creating it on first use
    pub fn get_or_create(&self, cluster: &str) -> Arc<MemoryStore> {
        let mut stores = self.stores.lock();
        Arc::clone(stores.entry(cluster.to_string()).or_insert_with(|| {
            debug!(cluster, "Creating in-memory store");
            Arc::new(MemoryStore::new(cluster))
        }))
    }

    /// Get the store for `cluster` if one exists
    pub fn get(&self, cluster: &str) -> Option<Arc<MemoryStore>> {
        self.stores.lock().get(cluster).cloned()
    }

    /// Forget the store for `cluster`, returning it if it existed
    pub fn remove(&self, cluster: &str) -> Option<Arc<MemoryStore>> {
        self.stores.lock().remove(cluster)
    }

    /// Registered cluster names, sorted
    pub fn clusters(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Empty every registered store and forget them all.
    ///
    /// Handles obtained earlier stay valid but see an empty store; later
    /// lookups create fresh stores.
    pub fn reset(&self) {
        let mut stores = self.stores.lock();
        for store in stores.values() {
            store.clear();
        }
        debug!(count = stores.len(), "Reset store registry");
        stores.clear();
    }
}
