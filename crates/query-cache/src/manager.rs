//! Named cache stores

use crate::config::CacheManagerConfig;
use crate::memory::MemoryStore;
use crate::store::CacheStore;
use query_core::{QueryError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// The set of cache stores queries may remember into, one of them the default.
///
/// Built by the caller and passed explicitly; there is no process-wide registry.
#[derive(Clone)]
pub struct CacheManager {
    default: String,
    stores: HashMap<String, Arc<dyn CacheStore>>,
}

impl CacheManager {
    /// Create a manager whose default is `store`
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        let default = store.name().to_string();
        let mut stores = HashMap::new();
        stores.insert(default.clone(), store);
        Self { default, stores }
    }

    /// Build in-memory stores from configuration
    pub fn from_config(config: &CacheManagerConfig) -> Result<Self> {
        if !config.stores.contains_key(&config.default) {
            return Err(QueryError::StoreNotFound(config.default.clone()));
        }

        let stores = config
            .stores
            .iter()
            .map(|(name, store_config)| {
                let store: Arc<dyn CacheStore> =
                    Arc::new(MemoryStore::new(name.clone(), store_config.clone()));
                (name.clone(), store)
            })
            .collect();

        Ok(Self {
            default: config.default.clone(),
            stores,
        })
    }

    /// Register another store under its own name, replacing any with that name
    pub fn with_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.stores.insert(store.name().to_string(), store);
        self
    }

    /// Resolve a store by name, or the default one for `None`
    pub fn store(&self, name: Option<&str>) -> Result<Arc<dyn CacheStore>> {
        let name = name.unwrap_or(&self.default);
        self.stores
            .get(name)
            .cloned()
            .ok_or_else(|| QueryError::StoreNotFound(name.to_string()))
    }

    pub fn default_store(&self) -> Result<Arc<dyn CacheStore>> {
        self.store(None)
    }

    pub fn default_name(&self) -> &str {
        &self.default
    }

    pub fn store_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stores.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("default", &self.default)
            .field("stores", &self.store_names())
            .finish()
    }
}
