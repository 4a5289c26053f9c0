use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("The `remember()` method call is not before query execution: [{method}] called.")]
    PrematureRemember { method: String },

    #[error("Lock timeout: could not acquire lock [{key}] within {wait:?}")]
    LockTimeout { key: String, wait: Duration },

    #[error("Cancelled while waiting for lock [{key}]")]
    Cancelled { key: String },

    #[error("Cache store [{0}] is not defined")]
    StoreNotFound(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl QueryError {
    /// Whether this error came from lock acquisition rather than a collaborator
    pub fn is_lock_error(&self) -> bool {
        matches!(
            self,
            QueryError::LockTimeout { .. } | QueryError::Cancelled { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_premature_remember_message() {
        let err = QueryError::PrematureRemember {
            method: "inRandomOrder".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "The `remember()` method call is not before query execution: [inRandomOrder] called."
        );
    }

    #[test]
    fn test_lock_errors() {
        let timeout = QueryError::LockTimeout {
            key: "foo".to_string(),
            wait: Duration::from_secs(1),
        };
        let cancelled = QueryError::Cancelled {
            key: "foo".to_string(),
        };
        assert!(timeout.is_lock_error());
        assert!(cancelled.is_lock_error());
        assert!(!QueryError::CacheError("down".into()).is_lock_error());
    }
}
