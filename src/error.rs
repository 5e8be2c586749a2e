//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The cache lock could not be acquired in time, probably a deadlock
    #[error("Unable to acquire cache lock after {0:?}")]
    LockTimeout(Duration),

    /// A batch producer returned a mapping without the requested key
    #[error("Batch refresh result does not contain requested key: {0}")]
    BatchContractViolation(String),

    /// Error raised by the value producer, passed through unchanged
    #[error(transparent)]
    Production(anyhow::Error),

    /// Arguments could not be bound to a memoized function's signature
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Cache or policy configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_error_is_transparent() {
        let err = CacheError::Production(anyhow::anyhow!("upstream unavailable"));
        assert_eq!(err.to_string(), "upstream unavailable");
    }

    #[test]
    fn test_production_error_downcasts_to_original() {
        #[derive(Debug, thiserror::Error)]
        #[error("quota exceeded")]
        struct QuotaExceeded;

        let err = CacheError::Production(QuotaExceeded.into());
        match err {
            CacheError::Production(inner) => {
                assert!(inner.downcast_ref::<QuotaExceeded>().is_some())
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_lock_timeout_message() {
        let err = CacheError::LockTimeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Unable to acquire cache lock after 250ms");
    }
}
