//! Configuration Module
//!
//! Handles loading cache configuration from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::policy::DEFAULT_EXPIRY_SECONDS;

/// Default interval between background cleanup runs, in seconds.
pub const DEFAULT_CLEANUP_INTERVAL: u64 = 60;

// == Eviction Kind ==
/// Capacity eviction strategy applied when `max_size` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionKind {
    #[default]
    Lru,
    Random,
}

impl FromStr for EvictionKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(Self::Lru),
            "random" => Ok(Self::Random),
            other => Err(CacheError::InvalidConfig(format!("unknown eviction strategy '{other}'"))),
        }
    }
}

impl fmt::Display for EvictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lru => write!(f, "lru"),
            Self::Random => write!(f, "random"),
        }
    }
}

// == Cache Config ==
/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds an entry stays fresh after it is stored
    pub expiry_seconds: f64,
    /// Capacity bound; `None` means unbounded
    pub max_size: Option<usize>,
    /// Which eviction policy enforces `max_size`
    pub eviction: EvictionKind,
    /// Bounded lock wait in milliseconds; `None` blocks indefinitely
    pub lock_timeout_ms: Option<u64>,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_EXPIRY_SECONDS` - Entry lifetime in seconds (default: 3600)
    /// - `CACHE_MAX_SIZE` - Maximum entries (default: unbounded)
    /// - `CACHE_EVICTION` - `lru` or `random` (default: lru)
    /// - `CACHE_LOCK_TIMEOUT_MS` - Lock wait bound (default: none)
    /// - `CACHE_CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 60)
    ///
    /// Missing or unparsable values fall back to their defaults.
    pub fn from_env() -> Self {
        Self {
            expiry_seconds: env::var("CACHE_EXPIRY_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_EXPIRY_SECONDS),
            max_size: env::var("CACHE_MAX_SIZE").ok().and_then(|v| v.parse().ok()),
            eviction: env::var("CACHE_EVICTION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            lock_timeout_ms: env::var("CACHE_LOCK_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok()),
            cleanup_interval: env::var("CACHE_CLEANUP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CLEANUP_INTERVAL),
        }
    }

    /// Period for [`spawn_cleanup_task`](crate::tasks::spawn_cleanup_task).
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiry_seconds: DEFAULT_EXPIRY_SECONDS,
            max_size: None,
            eviction: EvictionKind::Lru,
            lock_timeout_ms: None,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}
