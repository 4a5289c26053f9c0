//! The cache backend capability

use async_trait::async_trait;
use query_core::Result;
use std::time::Duration;

/// A key/value cache backend with named, owner-scoped locks.
///
/// Values are opaque bytes. A `None` TTL stores the value until it is
/// forgotten or evicted. Locks expire after their lease even when never
/// released, so an abandoned lock cannot block other owners forever.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Store name, for diagnostics
    fn name(&self) -> &str;

    /// Whether a live entry exists for `key`
    async fn has(&self, key: &str) -> Result<bool>;

    /// Fetch a live entry
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a value, replacing any previous one
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Remove an entry; returns whether one existed
    async fn forget(&self, key: &str) -> Result<bool>;

    /// Remove every entry
    async fn flush(&self) -> Result<()>;

    /// Try once to take the lock `name` for `owner`, held for at most `lease`
    async fn try_lock(&self, name: &str, owner: &str, lease: Duration) -> Result<bool>;

    /// Release the lock `name` if `owner` still holds it
    async fn release_lock(&self, name: &str, owner: &str) -> Result<bool>;

    /// Pause between lock attempts, returning early if the store can tell
    /// the lock `name` was released
    async fn lock_released(&self, _name: &str, max: Duration) {
        tokio::time::sleep(max).await;
    }
}
