//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata recorded when an entry is created, used by policies to compute
/// time-to-live. By default this is the creation time.
pub type TtlInfo = DateTime<Utc>;

// == Cache Entry ==
/// A payload together with the TTL metadata recorded when it was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<V> {
    /// The stored value
    pub payload: V,
    /// Creation metadata
    pub ttl_info: TtlInfo,
}

impl<V> Entry<V> {
    // == Constructor ==
    /// Creates an entry stamped with the current time.
    pub fn new(payload: V) -> Self {
        Self::with_ttl_info(payload, create_ttl())
    }

    /// Creates an entry with caller-supplied TTL metadata.
    pub fn with_ttl_info(payload: V, ttl_info: TtlInfo) -> Self {
        Self { payload, ttl_info }
    }

    // == Age ==
    /// Seconds elapsed between `ttl_info` and `now`.
    ///
    /// Negative if `ttl_info` lies in the future.
    pub fn age_seconds(&self, now: DateTime<Utc>) -> f64 {
        (now - self.ttl_info)
            .num_microseconds()
            .map(|us| us as f64 / 1_000_000.0)
            .unwrap_or(f64::MAX)
    }
}

// == Utility Functions ==
/// Default TTL metadata: the current UTC time.
pub fn create_ttl() -> TtlInfo {
    Utc::now()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_entry_creation() {
        let before = Utc::now();
        let entry = Entry::new("test_value".to_string());

        assert_eq!(entry.payload, "test_value");
        assert!(entry.ttl_info >= before);
        assert!(entry.ttl_info <= Utc::now());
    }

    #[test]
    fn test_age_seconds() {
        let now = Utc::now();
        let entry = Entry::with_ttl_info(1, now - Duration::milliseconds(2500));

        assert!((entry.age_seconds(now) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_age_of_future_entry_is_negative() {
        let now = Utc::now();
        let entry = Entry::with_ttl_info((), now + Duration::seconds(3));

        assert!(entry.age_seconds(now) < 0.0);
    }
}
