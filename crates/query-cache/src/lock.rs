//! Blocking acquisition of store locks

use crate::store::CacheStore;
use query_core::{QueryError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace};
use uuid::Uuid;

/// Sleep between blocked lock attempts
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Stands in for deadlines too far out to represent
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `now + after`, capped at a far-future instant instead of overflowing
pub(crate) fn deadline_after(now: Instant, after: Duration) -> Instant {
    now.checked_add(after).unwrap_or_else(|| now + FAR_FUTURE)
}

/// A handle for abandoning a lock wait.
///
/// Can be shared between tasks to cancel a waiter from outside.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenState>,
}

#[derive(Debug, Default)]
struct TokenState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// A held store lock.
///
/// Call [`release`](Self::release) to give it back. A guard dropped without
/// release (for instance when its task is aborted) releases in the
/// background if a runtime is available, and otherwise waits out its lease.
pub struct LockGuard {
    store: Arc<dyn CacheStore>,
    name: String,
    owner: String,
    released: bool,
}

impl LockGuard {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Release the lock; false if the lease had already run out and
    /// someone else took it
    pub async fn release(mut self) -> Result<bool> {
        self.released = true;
        let released = self.store.release_lock(&self.name, &self.owner).await?;
        trace!("Released lock '{}' (held: {})", self.name, released);
        Ok(released)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let store = Arc::clone(&self.store);
            let name = std::mem::take(&mut self.name);
            let owner = std::mem::take(&mut self.owner);
            handle.spawn(async move {
                let _ = store.release_lock(&name, &owner).await;
            });
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("store", &self.store.name())
            .field("name", &self.name)
            .field("owner", &self.owner)
            .finish()
    }
}

/// Acquire the lock `name`, waiting at most `wait`.
///
/// The lock is held for at most `lease`. Between attempts the waiter pauses
/// for up to `poll`, or less if the store signals a release. Fails with
/// [`QueryError::LockTimeout`] once `wait` has elapsed, or with
/// [`QueryError::Cancelled`] as soon as `cancel` fires.
pub async fn block(
    store: Arc<dyn CacheStore>,
    name: &str,
    wait: Duration,
    lease: Duration,
    poll: Duration,
    cancel: Option<&CancellationToken>,
) -> Result<LockGuard> {
    let owner = Uuid::new_v4().to_string();
    let deadline = deadline_after(Instant::now(), wait);
    let mut attempts = 0u32;

    loop {
        if cancel.map(|token| token.is_cancelled()).unwrap_or(false) {
            return Err(QueryError::Cancelled {
                key: name.to_string(),
            });
        }

        attempts += 1;
        if store.try_lock(name, &owner, lease).await? {
            debug!("Acquired lock '{}' after {} attempt(s)", name, attempts);
            return Ok(LockGuard {
                store,
                name: name.to_string(),
                owner,
                released: false,
            });
        }

        let now = Instant::now();
        if now >= deadline {
            debug!("Timed out waiting {:?} for lock '{}'", wait, name);
            return Err(QueryError::LockTimeout {
                key: name.to_string(),
                wait,
            });
        }

        let pause = poll.min(deadline - now);
        trace!("Lock '{}' is held, waiting {:?}", name, pause);
        match cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => {
                        return Err(QueryError::Cancelled {
                            key: name.to_string(),
                        });
                    }
                    _ = store.lock_released(name, pause) => {}
                }
            }
            None => store.lock_released(name, pause).await,
        }
    }
}
