//! Remembered query results for Query Engine
//!
//! This crate memoizes the terminal call of a query builder in a cache
//! store, keyed by the query's SQL and bindings or by an explicit key.
//!
//! # Features
//!
//! - **Derived keys**: SHA-256 of the SQL and its rendered bindings, namespaced under `query|`
//! - **TTL Support**: relative, absolute or no expiry
//! - **Named stores**: pick a store per query from a [`CacheManager`]
//! - **Stampede protection**: optional per-key locking with a bounded wait
//! - **Cancellation**: abandon a lock wait through a [`CancellationToken`]
//!
//! # Example
//!
//! ```ignore
//! use query_cache::{CacheManager, MemoryStore, Remember, RememberOptions};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let cache = CacheManager::new(Arc::new(MemoryStore::with_defaults("memory")));
//!
//! // First call runs the query, later ones within a minute read the cache
//! let id = users
//!     .remember(&cache, RememberOptions::new(Duration::from_secs(60)))?
//!     .value("id")
//!     .await?;
//! ```

pub mod config;
pub mod key;
pub mod lock;
pub mod manager;
pub mod memory;
pub mod options;
pub mod remember;
pub mod stats;
pub mod store;

pub use config::{CacheManagerConfig, MemoryStoreConfig, DEFAULT_STORE};
pub use key::{CacheKey, KEY_PREFIX};
pub use lock::{CancellationToken, LockGuard};
pub use manager::CacheManager;
pub use memory::MemoryStore;
pub use options::{Lifetime, RememberOptions, Ttl, DEFAULT_TTL};
pub use remember::{Remember, RememberableQuery};
pub use stats::CacheStats;
pub use store::CacheStore;
