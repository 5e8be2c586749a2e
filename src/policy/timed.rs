//! Timed expiry: entries expire a fixed number of seconds after creation.

use std::any::Any;

use chrono::{DateTime, Utc};

use crate::cache::Entry;
use crate::error::{CacheError, Result};
use crate::policy::Policy;

/// Lifetime used when none is configured.
pub const DEFAULT_EXPIRY_SECONDS: f64 = 3600.0;

/// Expires entries `expiry_seconds` after their `ttl_info` timestamp.
///
/// Changing `expiry_seconds` affects every entry on its next evaluation;
/// stored timestamps are never rewritten.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedExpiry {
    expiry_seconds: f64,
}

impl Default for TimedExpiry {
    fn default() -> Self {
        Self::new(DEFAULT_EXPIRY_SECONDS)
    }
}

impl TimedExpiry {
    pub fn new(expiry_seconds: f64) -> Self {
        Self { expiry_seconds }
    }

    pub fn expiry_seconds(&self) -> f64 {
        self.expiry_seconds
    }

    /// Changes the lifetime. Rejects the same values `validate` does and
    /// keeps the previous lifetime when it does.
    pub fn set_expiry_seconds(&mut self, expiry_seconds: f64) -> Result<()> {
        check_expiry(expiry_seconds)?;
        self.expiry_seconds = expiry_seconds;
        Ok(())
    }
}

fn check_expiry(expiry_seconds: f64) -> Result<()> {
    if !expiry_seconds.is_finite() || expiry_seconds < 0.0 {
        return Err(CacheError::InvalidConfig(format!(
            "expiry_seconds must be a non-negative number, got {expiry_seconds}"
        )));
    }
    Ok(())
}

impl<V> Policy<V> for TimedExpiry {
    fn name(&self) -> &'static str {
        "timed_expiry"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn validate(&self) -> Result<()> {
        check_expiry(self.expiry_seconds)
    }

    fn ttl_for_record(&self, entry: &Entry<V>, now: DateTime<Utc>) -> Option<f64> {
        Some((self.expiry_seconds - entry.age_seconds(now)).max(0.0))
    }
}
