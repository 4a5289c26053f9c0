//! Cache key derivation

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use query_core::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Namespace prepended to every derived key
pub const KEY_PREFIX: &str = "query|";

/// Key under which a query result is remembered
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive a key from the query text and its bindings.
    ///
    /// The bindings are rendered canonically and appended to the SQL with no
    /// separator, then hashed with SHA-256. The digest is base64 encoded and
    /// prefixed with [`KEY_PREFIX`].
    pub fn derive(sql: &str, bindings: &[Value]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(sql.as_bytes());
        for binding in bindings {
            hasher.update(binding.render().as_bytes());
        }
        Self(format!("{}{}", KEY_PREFIX, STANDARD.encode(hasher.finalize())))
    }

    /// Use a caller supplied key verbatim
    pub fn explicit(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_derived(&self) -> bool {
        self.0.starts_with(KEY_PREFIX)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self::explicit(key)
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self::explicit(key)
    }
}
