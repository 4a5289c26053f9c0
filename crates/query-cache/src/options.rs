//! Per-query remember options

use crate::lock::{CancellationToken, DEFAULT_POLL_INTERVAL};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// TTL used when none is given
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// How long a remembered result stays in the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Relative to the moment the result is written
    For(Duration),
    /// Until an absolute instant
    Until(DateTime<Utc>),
    /// Until forgotten or evicted
    Forever,
}

/// A [`Ttl`] resolved against the current time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    Expires(Duration),
    Forever,
    /// Nothing left to live; the result is returned but not stored
    Expired,
}

impl Ttl {
    pub fn seconds(secs: u64) -> Self {
        Ttl::For(Duration::from_secs(secs))
    }

    /// Resolve against now
    pub fn lifetime(&self) -> Lifetime {
        match self {
            Ttl::Forever => Lifetime::Forever,
            Ttl::For(ttl) if ttl.is_zero() => Lifetime::Expired,
            Ttl::For(ttl) => Lifetime::Expires(*ttl),
            Ttl::Until(at) => match (*at - Utc::now()).to_std() {
                Ok(remaining) if !remaining.is_zero() => Lifetime::Expires(remaining),
                _ => Lifetime::Expired,
            },
        }
    }
}

impl Default for Ttl {
    fn default() -> Self {
        Ttl::For(DEFAULT_TTL)
    }
}

impl From<Duration> for Ttl {
    fn from(ttl: Duration) -> Self {
        Ttl::For(ttl)
    }
}

impl From<DateTime<Utc>> for Ttl {
    fn from(at: DateTime<Utc>) -> Self {
        Ttl::Until(at)
    }
}

/// What to remember a query result for, and where.
///
/// Built once with the `with_*` methods and then handed to
/// [`Remember::remember`](crate::Remember::remember); it does not change
/// afterwards. A zero `wait` (the default) disables locking.
#[derive(Debug, Clone, Default)]
pub struct RememberOptions {
    ttl: Ttl,
    key: Option<String>,
    store: Option<String>,
    wait: Duration,
    lock_lease: Option<Duration>,
    poll_interval: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl RememberOptions {
    pub fn new(ttl: impl Into<Ttl>) -> Self {
        Self {
            ttl: ttl.into(),
            ..Default::default()
        }
    }

    /// Remember until forgotten
    pub fn forever() -> Self {
        Self::new(Ttl::Forever)
    }

    /// Use this key instead of one derived from the query
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Use a named store instead of the default one
    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }

    /// Lock the key while populating it, waiting up to `wait` for the lock
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// How long a taken lock is held at most; defaults to the wait.
    ///
    /// The lease is not renewed while the query runs. A query that outlives
    /// it lets the next waiter take the lock and run the query again, so
    /// set a lease longer than the slowest expected execution when the
    /// query must run only once.
    pub fn with_lock_lease(mut self, lease: Duration) -> Self {
        self.lock_lease = Some(lease);
        self
    }

    /// Pause between lock attempts
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Abandon a lock wait when `token` fires
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn store(&self) -> Option<&str> {
        self.store.as_deref()
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    pub fn lock_enabled(&self) -> bool {
        !self.wait.is_zero()
    }

    pub fn lock_lease(&self) -> Duration {
        self.lock_lease.unwrap_or(self.wait)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = RememberOptions::default();
        assert_eq!(options.ttl(), Ttl::For(Duration::from_secs(60)));
        assert_eq!(options.key(), None);
        assert_eq!(options.store(), None);
        assert!(!options.lock_enabled());
        assert_eq!(options.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_builder_pattern() {
        let options = RememberOptions::new(Ttl::seconds(30))
            .with_key("customKey")
            .with_store("foo")
            .with_wait(Duration::from_secs(1));

        assert_eq!(options.key(), Some("customKey"));
        assert_eq!(options.store(), Some("foo"));
        assert!(options.lock_enabled());
        assert_eq!(options.lock_lease(), Duration::from_secs(1));

        let options = options.with_lock_lease(Duration::from_secs(5));
        assert_eq!(options.lock_lease(), Duration::from_secs(5));
    }

    #[test]
    fn test_lifetime() {
        assert_eq!(
            Ttl::seconds(60).lifetime(),
            Lifetime::Expires(Duration::from_secs(60))
        );
        assert_eq!(Ttl::seconds(0).lifetime(), Lifetime::Expired);
        assert_eq!(Ttl::Forever.lifetime(), Lifetime::Forever);
    }

    #[test]
    fn test_absolute_lifetime() {
        let future = Utc::now() + chrono::Duration::seconds(120);
        match Ttl::from(future).lifetime() {
            Lifetime::Expires(remaining) => {
                assert!(remaining <= Duration::from_secs(120));
                assert!(remaining > Duration::from_secs(100));
            }
            other => panic!("Expected Expires, got {:?}", other),
        }

        let past = Utc::now() - chrono::Duration::seconds(1);
        assert_eq!(Ttl::Until(past).lifetime(), Lifetime::Expired);
    }
}
