//! Remembering query results
//!
//! [`RememberableQuery`] wraps a [`QueryBuilder`] and memoizes the result of
//! the terminal call made through it. The first call under a key executes
//! the query and writes the result to the store; later calls under the same
//! key are answered from the store without touching the query.
//!
//! With a non-zero wait the key is locked while the result is produced, so
//! of many callers racing on a cold key only one runs the query and the
//! rest read what it wrote.

use crate::key::CacheKey;
use crate::lock;
use crate::manager::CacheManager;
use crate::options::{Lifetime, RememberOptions};
use crate::store::CacheStore;
use query_core::{Outcome, QueryBuilder, QueryError, Result, Value};
use std::sync::Arc;
use tracing::{debug, trace};

/// A query whose next terminal call is remembered
pub struct RememberableQuery<Q> {
    store: Arc<dyn CacheStore>,
    query: Q,
    options: RememberOptions,
}

impl<Q: QueryBuilder> RememberableQuery<Q> {
    /// Wrap `query`, remembering into an already resolved `store`
    pub fn new(store: Arc<dyn CacheStore>, query: Q, options: RememberOptions) -> Self {
        Self {
            store,
            query,
            options,
        }
    }

    /// The key the result will be remembered under.
    ///
    /// An explicit key wins; otherwise it is derived from the query as it
    /// stands now.
    pub fn cache_key(&self) -> CacheKey {
        match self.options.key() {
            Some(key) => CacheKey::explicit(key),
            None => CacheKey::derive(&self.query.to_sql(), &self.query.bindings()),
        }
    }

    pub fn options(&self) -> &RememberOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Give back the wrapped query without calling it
    pub fn into_inner(self) -> Q {
        self.query
    }

    /// Call `method` on the query, or answer from the cache.
    ///
    /// Fails with [`QueryError::PrematureRemember`] if `method` only
    /// continues building the query, with [`QueryError::LockTimeout`] if the
    /// key stays locked for longer than the wait, and with
    /// [`QueryError::Cancelled`] if the wait is cancelled. Store and query
    /// errors are returned as they are.
    pub async fn call(self, method: &str, args: Vec<Value>) -> Result<Value> {
        let key = self.cache_key();
        let RememberableQuery {
            store,
            query,
            options,
        } = self;

        if let Some(value) = read(store.as_ref(), &key).await? {
            debug!("Cache hit for '{}' on store '{}'", key, store.name());
            return Ok(value);
        }
        debug!("Cache miss for '{}' on store '{}'", key, store.name());

        if !options.lock_enabled() {
            return execute(store.as_ref(), &key, &options, query, method, args).await;
        }

        let guard = lock::block(
            Arc::clone(&store),
            key.as_str(),
            options.wait(),
            options.lock_lease(),
            options.poll_interval(),
            options.cancellation(),
        )
        .await?;

        // Whoever held the lock before us may have written the key
        let result = match read(store.as_ref(), &key).await {
            Ok(Some(value)) => {
                debug!("Cache filled for '{}' while waiting for its lock", key);
                Ok(value)
            }
            Ok(None) => execute(store.as_ref(), &key, &options, query, method, args).await,
            Err(err) => Err(err),
        };

        let released = guard.release().await;
        let value = result?;
        released?;
        Ok(value)
    }

    /// Remember the result of `get`: all matching rows
    pub async fn get(self) -> Result<Value> {
        self.call("get", Vec::new()).await
    }

    /// Remember the result of `first`: the first matching row or null
    pub async fn first(self) -> Result<Value> {
        self.call("first", Vec::new()).await
    }

    /// Remember a single column of the first matching row
    pub async fn value(self, column: &str) -> Result<Value> {
        self.call("value", vec![Value::from(column)]).await
    }

    /// Remember the number of matching rows
    pub async fn count(self) -> Result<Value> {
        self.call("count", Vec::new()).await
    }
}

impl<Q> std::fmt::Debug for RememberableQuery<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RememberableQuery")
            .field("store", &self.store.name())
            .field("options", &self.options)
            .finish()
    }
}

async fn read(store: &dyn CacheStore, key: &CacheKey) -> Result<Option<Value>> {
    match store.get(key.as_str()).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Run the terminal call and write its result
async fn execute<Q: QueryBuilder>(
    store: &dyn CacheStore,
    key: &CacheKey,
    options: &RememberOptions,
    query: Q,
    method: &str,
    args: Vec<Value>,
) -> Result<Value> {
    let value = match query.call(method, args).await? {
        Outcome::Value(value) => value,
        Outcome::Continuation(_) => {
            return Err(QueryError::PrematureRemember {
                method: method.to_string(),
            });
        }
    };

    match options.ttl().lifetime() {
        Lifetime::Expires(ttl) => {
            store
                .put(key.as_str(), serde_json::to_vec(&value)?, Some(ttl))
                .await?
        }
        Lifetime::Forever => {
            store
                .put(key.as_str(), serde_json::to_vec(&value)?, None)
                .await?
        }
        Lifetime::Expired => {
            store.forget(key.as_str()).await?;
        }
    }
    trace!("Remembered '{}' for {:?}", key, options.ttl());

    Ok(value)
}

/// Attach remembering to any query builder
pub trait Remember: QueryBuilder {
    /// Remember this query's next terminal call.
    ///
    /// The store named in `options` (or the manager's default) is resolved
    /// here; an unknown name fails with [`QueryError::StoreNotFound`].
    fn remember(
        self,
        cache: &CacheManager,
        options: RememberOptions,
    ) -> Result<RememberableQuery<Self>> {
        let store = cache.store(options.store())?;
        Ok(RememberableQuery::new(store, self, options))
    }
}

impl<Q: QueryBuilder> Remember for Q {}
