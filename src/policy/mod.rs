//! Eviction and Expiry Policies
//!
//! A cache holds an ordered list of policies. At fixed points of every
//! operation the cache calls each policy's hook in registration order:
//!
//! - `pre_get`: lock held, before the lookup
//! - `pre_store`: before a write; returns keys to evict first
//! - `post_store`: after a successful write
//! - `pre_delete`: before any removal, explicit or eviction
//! - `post_reset`: after the store has been emptied
//! - `ttl_for_record`: remaining lifetime of an entry, if the policy has an opinion
//!
//! Every hook is a no-op by default.

mod lru;
mod random;
mod timed;

use std::any::Any;

use chrono::{DateTime, Utc};

use crate::cache::{CompositeKey, Entry, EntryStore};
use crate::error::Result;

pub use lru::{LruEviction, LruTracker};
pub use random::RandomReplacement;
pub use timed::{TimedExpiry, DEFAULT_EXPIRY_SECONDS};

/// TTL reported when no policy expires entries.
pub const NEVER_EXPIRES: f64 = f64::INFINITY;

// == Policy ==
/// Hooks a cache calls around its operations.
pub trait Policy<V>: Send + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Lets the cache hand out typed access for runtime tuning.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Checks the policy's parameters when the cache is built.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn pre_get(&mut self, _key: &CompositeKey) {}

    /// Called before `entry` is written under `key`. Returns the keys that
    /// must be evicted to make room.
    fn pre_store(
        &mut self,
        _key: &CompositeKey,
        _entry: &Entry<V>,
        _store: &EntryStore<V>,
    ) -> Vec<CompositeKey> {
        Vec::new()
    }

    fn post_store(&mut self, _key: &CompositeKey, _entry: &Entry<V>) {}

    fn pre_delete(&mut self, _key: &CompositeKey) {}

    fn post_reset(&mut self) {}

    /// Seconds `entry` has left to live as of `now`; `0.0` means expired.
    /// `None` leaves the decision to other policies.
    fn ttl_for_record(&self, _entry: &Entry<V>, _now: DateTime<Utc>) -> Option<f64> {
        None
    }
}

/// How many entries must go before `key` can be written without the store
/// exceeding `max_size`. Overwrites never need room.
pub(crate) fn overflow<V>(key: &CompositeKey, store: &EntryStore<V>, max_size: usize) -> usize {
    if store.contains(key) {
        0
    } else {
        (store.len() + 1).saturating_sub(max_size)
    }
}

pub(crate) fn validate_max_size(policy: &str, max_size: usize) -> Result<()> {
    if max_size == 0 {
        return Err(crate::error::CacheError::InvalidConfig(format!(
            "{policy} policy requires max_size >= 1"
        )));
    }
    Ok(())
}
