//! Cache store configuration

use query_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Name of the store used when a query does not ask for one
pub const DEFAULT_STORE: &str = "memory";

/// Configuration for an in-memory store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStoreConfig {
    /// Maximum number of entries in the store
    pub max_entries: usize,
    /// Maximum memory usage in bytes (approximate)
    pub max_memory_bytes: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            max_memory_bytes: 100 * 1024 * 1024, // 100 MB
        }
    }
}

impl MemoryStoreConfig {
    pub fn new(max_entries: usize, max_memory_bytes: usize) -> Self {
        Self {
            max_entries,
            max_memory_bytes,
        }
    }

    /// Set the maximum number of entries
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the maximum memory usage
    pub fn with_max_memory(mut self, max_memory_bytes: usize) -> Self {
        self.max_memory_bytes = max_memory_bytes;
        self
    }
}

/// Stores a [`CacheManager`](crate::CacheManager) is built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheManagerConfig {
    /// Store used when no store name is requested
    pub default: String,
    /// Named in-memory stores
    pub stores: BTreeMap<String, MemoryStoreConfig>,
}

impl Default for CacheManagerConfig {
    fn default() -> Self {
        let mut stores = BTreeMap::new();
        stores.insert(DEFAULT_STORE.to_string(), MemoryStoreConfig::default());
        Self {
            default: DEFAULT_STORE.to_string(),
            stores,
        }
    }
}

impl CacheManagerConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: CacheManagerConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Add or replace a named store
    pub fn with_store(mut self, name: impl Into<String>, config: MemoryStoreConfig) -> Self {
        self.stores.insert(name.into(), config);
        self
    }

    /// Set the default store name
    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.default = name.into();
        self
    }
}
