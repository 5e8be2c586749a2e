//! Value Producers
//!
//! Contracts for the caller-supplied callbacks that compute values on a
//! cache miss. Errors are `anyhow` errors and reach the caller unchanged.

use std::collections::BTreeMap;

use crate::cache::{KeyValue, Opts};

/// Values produced by a batch refresh, keyed by base key.
pub type Batch<V> = BTreeMap<KeyValue, V>;

/// Produces the value for a single key.
pub trait MakeValue<V>: Send + Sync {
    fn make_value(&self, key: &KeyValue, opts: &Opts) -> anyhow::Result<V>;
}

impl<V, F> MakeValue<V> for F
where
    F: Fn(&KeyValue, &Opts) -> anyhow::Result<V> + Send + Sync,
{
    fn make_value(&self, key: &KeyValue, opts: &Opts) -> anyhow::Result<V> {
        self(key, opts)
    }
}

/// Produces values for a whole batch of related keys at once.
///
/// The returned batch MUST contain `key`; every entry is stored under the
/// same options.
pub trait MakeBatch<V>: Send + Sync {
    fn make_batch(&self, key: &KeyValue, opts: &Opts) -> anyhow::Result<Batch<V>>;
}

impl<V, F> MakeBatch<V> for F
where
    F: Fn(&KeyValue, &Opts) -> anyhow::Result<Batch<V>> + Send + Sync,
{
    fn make_batch(&self, key: &KeyValue, opts: &Opts) -> anyhow::Result<Batch<V>> {
        self(key, opts)
    }
}

/// How a cache refreshes a missing or expired key.
pub(crate) enum Refresher<V> {
    Single(Box<dyn MakeValue<V>>),
    Batch(Box<dyn MakeBatch<V>>),
}
