//! Remembered Query Example
//!
//! Demonstrates remembering query results with derived and explicit keys,
//! and locking a key so concurrent callers run the query only once.

use anyhow::Result;
use examples_package::UserTable;
use query_cache::{CacheManager, MemoryStore, Remember, RememberOptions, Ttl};
use query_core::{Outcome, QueryBuilder, QueryError, Value};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== Remembered Query Example ===\n");

    let store = Arc::new(MemoryStore::with_defaults("memory"));
    let cache = CacheManager::new(store.clone());

    // Example 1: Derived cache keys
    derived_keys(&cache).await?;

    // Example 2: Explicit cache keys
    explicit_keys(&cache).await?;

    // Example 3: Locking a key
    locking(&cache).await?;

    // Example 4: Misuse
    premature_remember(&cache).await?;

    let stats = store.stats();
    println!("\nStore statistics:");
    println!("  Hits: {}", stats.hits());
    println!("  Misses: {}", stats.misses());
    println!("  Writes: {}", stats.writes());
    println!("  Hit rate: {:.1}%", stats.hit_rate() * 100.0);

    println!("\n=== All remember examples completed! ===");
    Ok(())
}

async fn random_user_id(table: &UserTable, cache: &CacheManager) -> Result<Value> {
    let query = match table.query().call("inRandomOrder", vec![]).await? {
        Outcome::Continuation(query) => query,
        Outcome::Value(_) => anyhow::bail!("inRandomOrder should keep building"),
    };
    let id = query
        .remember(cache, RememberOptions::new(Ttl::seconds(60)))?
        .value("id")
        .await?;
    Ok(id)
}

/// Example 1: the key is derived from the SQL and its bindings
async fn derived_keys(cache: &CacheManager) -> Result<()> {
    println!("--- Example 1: Derived Keys ---\n");

    let table = UserTable::seeded(&["Alice", "Bob", "Charlie", "Dana"]);

    let id = random_user_id(&table, cache).await?;
    println!("Random user id: {}", id);

    if let Some(id) = id.as_i64() {
        table.delete(id);
        println!("Deleted user {}; {} users left", id, table.len());
    }

    let again = random_user_id(&table, cache).await?;
    println!("Random user id again: {} (remembered)", again);
    println!("Queries that reached the table: {}\n", table.queries());

    Ok(())
}

/// Example 2: two different queries sharing one explicit key
async fn explicit_keys(cache: &CacheManager) -> Result<()> {
    println!("--- Example 2: Explicit Keys ---\n");

    let table = UserTable::seeded(&["Alice", "Bob"]);
    let options = RememberOptions::new(Ttl::seconds(30)).with_key("user-count");

    let count = table.query().remember(cache, options.clone())?.count().await?;
    println!("Users: {}", count);

    let all = table.query().remember(cache, options)?.get().await?;
    println!("Same key, different query: {}", all);
    println!("Queries that reached the table: {}\n", table.queries());

    Ok(())
}

/// Example 3: concurrent callers on a locked key
async fn locking(cache: &CacheManager) -> Result<()> {
    println!("--- Example 3: Locking ---\n");

    let table = UserTable::seeded(&["Alice", "Bob", "Charlie"]);
    let options = RememberOptions::new(Duration::from_secs(60))
        .with_key("locked-count")
        .with_wait(Duration::from_secs(2));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let query = table.query().remember(cache, options.clone())?;
        handles.push(tokio::spawn(query.count()));
    }
    for handle in handles {
        println!("Count: {}", handle.await??);
    }
    println!("Queries that reached the table: {}\n", table.queries());

    Ok(())
}

/// Example 4: remembering a call that only builds the query
async fn premature_remember(cache: &CacheManager) -> Result<()> {
    println!("--- Example 4: Premature Remember ---\n");

    let table = UserTable::seeded(&["Alice"]);
    let result = table
        .query()
        .remember(cache, RememberOptions::default().with_key("premature"))?
        .call("inRandomOrder", vec![])
        .await;

    match result {
        Err(err @ QueryError::PrematureRemember { .. }) => println!("Rejected: {}", err),
        Err(err) => return Err(err.into()),
        Ok(value) => println!("Unexpected value: {}", value),
    }

    Ok(())
}
