//! In-memory cache store with LRU eviction and local locks

use crate::config::MemoryStoreConfig;
use crate::lock::deadline_after;
use crate::stats::CacheStats;
use crate::store::CacheStore;
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use query_core::Result;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::trace;

/// Entry stored in the cache
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Serialized value
    value: Vec<u8>,
    /// When this entry was written
    created_at: Instant,
    /// When this entry stops being visible; `None` keeps it forever
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        let created_at = Instant::now();
        Self {
            value,
            created_at,
            // A TTL past the end of time means no expiry at all
            expires_at: ttl.and_then(|ttl| created_at.checked_add(ttl)),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| Instant::now() >= expires_at)
            .unwrap_or(false)
    }

    fn size_bytes(&self) -> usize {
        self.value.len()
    }
}

#[derive(Debug)]
struct LockEntry {
    owner: String,
    expires_at: Instant,
}

/// Thread-safe in-memory [`CacheStore`]
pub struct MemoryStore {
    name: String,
    /// The underlying LRU cache
    cache: RwLock<LruCache<String, CacheEntry>>,
    /// Store configuration
    config: MemoryStoreConfig,
    /// Cache statistics
    stats: Arc<CacheStats>,
    /// Current memory usage
    memory_used: RwLock<usize>,
    /// Held locks by name
    locks: Mutex<HashMap<String, LockEntry>>,
    /// Woken whenever a lock is released
    released: Notify,
}

impl MemoryStore {
    /// Create a new store with the given configuration
    pub fn new(name: impl Into<String>, config: MemoryStoreConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            name: name.into(),
            cache: RwLock::new(LruCache::new(capacity)),
            config,
            stats: Arc::new(CacheStats::new()),
            memory_used: RwLock::new(0),
            locks: Mutex::new(HashMap::new()),
            released: Notify::new(),
        }
    }

    /// Create a store with default configuration
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, MemoryStoreConfig::default())
    }

    /// Get cache statistics
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Get current number of entries, expired ones included until purged
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    /// Get current memory usage in bytes
    pub fn memory_used(&self) -> usize {
        *self.memory_used.read()
    }

    pub fn config(&self) -> &MemoryStoreConfig {
        &self.config
    }

    /// Whether `name` is currently locked by anyone
    pub fn is_locked(&self, name: &str) -> bool {
        self.locks
            .lock()
            .get(name)
            .map(|lock| lock.expires_at > Instant::now())
            .unwrap_or(false)
    }

    fn lookup(&self, key: &str) -> Option<Vec<u8>> {
        let mut cache = self.cache.write();

        let expired = match cache.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.stats.record_hit();
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            if let Some(entry) = cache.pop(key) {
                let mut memory_used = self.memory_used.write();
                *memory_used = memory_used.saturating_sub(entry.size_bytes());
                self.stats.record_expiration();
                self.update_stats(&cache, *memory_used);
            }
        }
        self.stats.record_miss();
        None
    }

    fn insert(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
        let entry = CacheEntry::new(value, ttl);
        let entry_size = entry.size_bytes();

        let mut cache = self.cache.write();
        let mut memory_used = self.memory_used.write();

        // Replacing a key frees its old size first
        if let Some(old_entry) = cache.pop(key) {
            *memory_used = memory_used.saturating_sub(old_entry.size_bytes());
        }

        // A single oversized value is not cached
        if entry_size > self.config.max_memory_bytes {
            self.update_stats(&cache, *memory_used);
            return;
        }

        while *memory_used + entry_size > self.config.max_memory_bytes && !cache.is_empty() {
            if let Some((_, evicted)) = cache.pop_lru() {
                *memory_used = memory_used.saturating_sub(evicted.size_bytes());
                self.stats.record_eviction();
            }
        }

        if let Some((_, evicted)) = cache.push(key.to_string(), entry) {
            *memory_used = memory_used.saturating_sub(evicted.size_bytes());
            self.stats.record_eviction();
        }

        *memory_used += entry_size;
        self.stats.record_write();
        self.update_stats(&cache, *memory_used);
    }

    fn remove(&self, key: &str) -> bool {
        let mut cache = self.cache.write();
        let mut memory_used = self.memory_used.write();

        let removed = match cache.pop(key) {
            Some(entry) => {
                *memory_used = memory_used.saturating_sub(entry.size_bytes());
                !entry.is_expired()
            }
            None => false,
        };
        self.update_stats(&cache, *memory_used);
        removed
    }

    /// Expire entries that have exceeded their TTL
    pub fn expire_stale(&self) -> usize {
        let mut cache = self.cache.write();
        let mut memory_used = self.memory_used.write();

        let expired_keys: Vec<String> = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();

        for key in expired_keys {
            if let Some(entry) = cache.pop(&key) {
                *memory_used = memory_used.saturating_sub(entry.size_bytes());
                self.stats.record_expiration();
            }
        }

        self.update_stats(&cache, *memory_used);
        count
    }

    /// Age of a live entry
    pub fn age(&self, key: &str) -> Option<Duration> {
        self.cache
            .read()
            .peek(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.created_at.elapsed())
    }

    fn update_stats(&self, cache: &LruCache<String, CacheEntry>, memory_used: usize) {
        self.stats.set_entry_count(cache.len() as u64);
        self.stats.set_memory_bytes(memory_used as u64);
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self
            .cache
            .read()
            .peek(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lookup(key))
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        trace!("Store '{}' put '{}' ({} bytes, ttl {:?})", self.name, key, value.len(), ttl);
        self.insert(key, value, ttl);
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<bool> {
        Ok(self.remove(key))
    }

    async fn flush(&self) -> Result<()> {
        let eviction_count;
        {
            let mut cache = self.cache.write();
            let mut memory_used = self.memory_used.write();

            eviction_count = cache.len();
            cache.clear();
            *memory_used = 0;
        }

        for _ in 0..eviction_count {
            self.stats.record_eviction();
        }
        self.stats.set_entry_count(0);
        self.stats.set_memory_bytes(0);
        Ok(())
    }

    async fn try_lock(&self, name: &str, owner: &str, lease: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut locks = self.locks.lock();

        if let Some(held) = locks.get(name) {
            if held.expires_at > now && held.owner != owner {
                self.stats.record_lock_contention();
                return Ok(false);
            }
        }

        locks.insert(
            name.to_string(),
            LockEntry {
                owner: owner.to_string(),
                expires_at: deadline_after(now, lease),
            },
        );
        self.stats.record_lock_acquired();
        Ok(true)
    }

    async fn release_lock(&self, name: &str, owner: &str) -> Result<bool> {
        let released = {
            let mut locks = self.locks.lock();
            match locks.get(name) {
                Some(held) if held.owner == owner => {
                    locks.remove(name);
                    true
                }
                _ => false,
            }
        };

        if released {
            self.released.notify_waiters();
        }
        Ok(released)
    }

    async fn lock_released(&self, _name: &str, max: Duration) {
        let _ = tokio::time::timeout(max, self.released.notified()).await;
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("name", &self.name)
            .field("max_entries", &self.config.max_entries)
            .field("max_memory_bytes", &self.config.max_memory_bytes)
            .field("current_entries", &self.len())
            .field("memory_used", &self.memory_used())
            .finish()
    }
}
