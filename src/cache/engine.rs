//! Cache Engine Module
//!
//! The get/refresh/store state machine. Every public operation holds the
//! cache lock for its whole duration, including calls into the value
//! producer; nested internal calls receive a no-op guard.
//!
//! Per key the states are Absent, Fresh and Expired. Expiry is evaluated
//! lazily at read time; nothing runs in the background unless the caller
//! starts the cleanup task.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cache::producer::{Batch, MakeBatch, MakeValue, Refresher};
use crate::cache::{
    create_ttl, CacheStats, CompositeKey, Entry, EntryStore, KeyComposer, KeyValue, Opts, TtlInfo,
};
use crate::config::{CacheConfig, EvictionKind};
use crate::error::{CacheError, Result};
use crate::lock::{CacheLock, Guard, LockKind};
use crate::memoize::{Memoizer, Signature};
use crate::policy::{LruEviction, Policy, RandomReplacement, TimedExpiry, NEVER_EXPIRES};

// == Cache State ==
/// Everything guarded by the cache lock.
struct CacheState<V> {
    store: EntryStore<V>,
    policies: Vec<Box<dyn Policy<V>>>,
    stats: CacheStats,
}

/// Which lookup of a `get` this is.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// May refresh on a miss.
    Refreshable,
    /// Must not refresh.
    CacheOnly,
    /// Re-read right after a refresh; not counted in the stats.
    AfterRefresh,
}

impl<V: 'static> CacheState<V> {
    fn new(policies: Vec<Box<dyn Policy<V>>>) -> Self {
        Self {
            store: EntryStore::new(),
            policies,
            stats: CacheStats::new(),
        }
    }

    /// Smallest TTL any policy reports, or [`NEVER_EXPIRES`].
    fn ttl_for_record(&self, entry: &Entry<V>, now: DateTime<Utc>) -> f64 {
        self.policies
            .iter()
            .filter_map(|policy| policy.ttl_for_record(entry, now))
            .fold(NEVER_EXPIRES, f64::min)
    }

    fn is_expired(&self, entry: &Entry<V>, now: DateTime<Utc>) -> bool {
        self.ttl_for_record(entry, now) <= 0.0
    }

    fn pre_get(&mut self, key: &CompositeKey) {
        for policy in self.policies.iter_mut() {
            policy.pre_get(key);
        }
    }

    /// The payload under `key` if present and fresh.
    fn lookup(&self, key: &CompositeKey) -> Option<V>
    where
        V: Clone,
    {
        self.store
            .get(key)
            .filter(|entry| !self.is_expired(entry, Utc::now()))
            .map(|entry| entry.payload.clone())
    }

    // == Write ==
    /// Runs pre-store hooks (evicting what they ask for), writes the entry,
    /// then runs post-store hooks.
    fn write(&mut self, key: CompositeKey, entry: Entry<V>) {
        for index in 0..self.policies.len() {
            let victims = self.policies[index].pre_store(&key, &entry, &self.store);
            for victim in victims {
                self.evict(&victim);
            }
        }

        let stored = self.store.put(key.clone(), entry);
        for policy in self.policies.iter_mut() {
            policy.post_store(&key, stored);
        }
        self.stats.set_total_entries(self.store.len());
    }

    // == Evict ==
    /// Silent removal used by eviction and `clean`. Absent keys are ignored.
    fn evict(&mut self, key: &CompositeKey) -> Option<Entry<V>> {
        for policy in self.policies.iter_mut() {
            policy.pre_delete(key);
        }
        let removed = self.store.evict(key);
        if removed.is_some() {
            debug!(key = %key, "evicted cache entry");
            self.stats.record_eviction();
            self.stats.set_total_entries(self.store.len());
        }
        removed
    }

    // == Delete ==
    /// Explicit removal; fails with [`CacheError::NotFound`] if absent.
    fn delete(&mut self, key: &CompositeKey) -> Result<Entry<V>> {
        for policy in self.policies.iter_mut() {
            policy.pre_delete(key);
        }
        let removed = self.store.remove(key)?;
        self.stats.set_total_entries(self.store.len());
        Ok(removed)
    }

    fn reset(&mut self) {
        self.store = EntryStore::new();
        for policy in self.policies.iter_mut() {
            policy.post_reset();
        }
        self.stats.set_total_entries(0);
    }
}

// == Cache ==
/// A thread-safe cache that fills itself on a miss.
///
/// Share it between threads behind an `Arc`; all access is linearized by
/// its lock.
pub struct Cache<V> {
    composer: KeyComposer,
    refresher: Refresher<V>,
    state: CacheLock<CacheState<V>>,
}

impl<V> Cache<V>
where
    V: Clone + Send + 'static,
{
    /// Starts configuring a cache.
    pub fn builder() -> CacheBuilder<V> {
        CacheBuilder::new()
    }

    /// Composes the key this cache would use for `key` and `opts`.
    pub fn compose(&self, key: impl Into<KeyValue>, opts: &Opts) -> CompositeKey {
        self.composer.compose(&key.into(), opts)
    }

    // == Get ==
    /// Returns the value for `key`, producing and storing it first if it is
    /// absent or expired.
    ///
    /// Returns `None` when the key is still absent or expired after one
    /// refresh. Producer failures propagate unchanged and leave any previous
    /// entry in place.
    pub fn get(&self, key: impl Into<KeyValue>, opts: &Opts) -> Result<Option<V>> {
        let key = key.into();
        let guard = self.state.acquire()?;
        self.get_inner(guard, &key, opts, Attempt::Refreshable)
    }

    /// Like [`Cache::get`], with `default` in place of `None`.
    pub fn get_or(&self, key: impl Into<KeyValue>, default: V, opts: &Opts) -> Result<V> {
        Ok(self.get(key, opts)?.unwrap_or(default))
    }

    /// Returns the cached value for `key` if present and fresh, without ever
    /// calling the producer.
    pub fn get_cached(&self, key: impl Into<KeyValue>, opts: &Opts) -> Result<Option<V>> {
        let key = key.into();
        let guard = self.state.acquire()?;
        self.get_inner(guard, &key, opts, Attempt::CacheOnly)
    }

    fn get_inner(
        &self,
        mut guard: Guard<'_, CacheState<V>>,
        key: &KeyValue,
        opts: &Opts,
        attempt: Attempt,
    ) -> Result<Option<V>> {
        let full_key = self.composer.compose(key, opts);
        guard.pre_get(&full_key);
        let found = guard.lookup(&full_key);

        if attempt != Attempt::AfterRefresh {
            match found {
                Some(_) => guard.stats.record_hit(),
                None => guard.stats.record_miss(),
            }
        }

        if found.is_some() || attempt != Attempt::Refreshable {
            return Ok(found);
        }

        debug!(key = %full_key, "cache miss, refreshing");
        self.refresh_inner(guard.nested(), key, opts)?;
        self.get_inner(guard.nested(), key, opts, Attempt::AfterRefresh)
    }

    // == Refresh ==
    /// Calls the producer for `key` and stores the result, replacing any
    /// current entry.
    pub fn refresh(&self, key: impl Into<KeyValue>, opts: &Opts) -> Result<()> {
        let key = key.into();
        let guard = self.state.acquire()?;
        self.refresh_inner(guard, &key, opts)
    }

    fn refresh_inner(
        &self,
        mut guard: Guard<'_, CacheState<V>>,
        key: &KeyValue,
        opts: &Opts,
    ) -> Result<()> {
        let full_key = self.composer.compose(key, opts);
        // The producer sees the parts a composite key was built from.
        let (base, producer_opts) = match key.as_composite() {
            Some(composite) if opts.is_empty() => {
                (composite.base_key().clone(), composite.to_opts())
            }
            _ => (key.clone(), opts.clone()),
        };

        match &self.refresher {
            Refresher::Single(producer) => {
                let value = producer
                    .make_value(&base, &producer_opts)
                    .map_err(CacheError::Production)?;
                self.store_inner(guard.nested(), full_key, value, None);
            }
            Refresher::Batch(producer) => {
                let mut batch = producer
                    .make_batch(&base, &producer_opts)
                    .map_err(CacheError::Production)?;
                let requested = batch
                    .remove(&base)
                    .ok_or_else(|| CacheError::BatchContractViolation(full_key.to_string()))?;
                debug!(key = %full_key, extra = batch.len(), "storing batch refresh");
                for (other, value) in batch {
                    let other_key = self.composer.compose(&other, &producer_opts);
                    self.store_inner(guard.nested(), other_key, value, None);
                }
                // Last, so evictions made for the rest of the batch cannot drop it
                self.store_inner(guard.nested(), full_key, requested, None);
            }
        }

        guard.stats.record_refresh();
        Ok(())
    }

    // == Store ==
    /// Stores `value` under `key`, stamped with the current time.
    pub fn store(&self, key: impl Into<KeyValue>, value: V, opts: &Opts) -> Result<()> {
        let full_key = self.compose(key, opts);
        let guard = self.state.acquire()?;
        self.store_inner(guard, full_key, value, None);
        Ok(())
    }

    /// Stores `value` under `key` with caller-supplied TTL metadata.
    pub fn store_with_ttl_info(
        &self,
        key: impl Into<KeyValue>,
        value: V,
        ttl_info: TtlInfo,
        opts: &Opts,
    ) -> Result<()> {
        let full_key = self.compose(key, opts);
        let guard = self.state.acquire()?;
        self.store_inner(guard, full_key, value, Some(ttl_info));
        Ok(())
    }

    fn store_inner(
        &self,
        mut guard: Guard<'_, CacheState<V>>,
        key: CompositeKey,
        value: V,
        ttl_info: Option<TtlInfo>,
    ) {
        let entry = Entry::with_ttl_info(value, ttl_info.unwrap_or_else(create_ttl));
        guard.write(key, entry);
    }

    // == Delete ==
    /// Removes `key`, failing with [`CacheError::NotFound`] if it is absent.
    pub fn delete(&self, key: impl Into<KeyValue>, opts: &Opts) -> Result<()> {
        let full_key = self.compose(key, opts);
        let mut guard = self.state.acquire()?;
        guard.delete(&full_key)?;
        Ok(())
    }

    /// True if an entry exists for `key`, expired or not.
    pub fn exists(&self, key: impl Into<KeyValue>, opts: &Opts) -> Result<bool> {
        let full_key = self.compose(key, opts);
        self.contains_key(&full_key)
    }

    /// True if an entry exists under exactly this composite key.
    pub fn contains_key(&self, key: &CompositeKey) -> Result<bool> {
        let guard = self.state.acquire()?;
        Ok(guard.store.contains(key))
    }

    // == TTL ==
    /// Seconds `key` has left before it expires; `0.0` means expired.
    pub fn ttl(&self, key: impl Into<KeyValue>, opts: &Opts) -> Result<f64> {
        let full_key = self.compose(key, opts);
        let guard = self.state.acquire()?;
        let entry = guard
            .store
            .get(&full_key)
            .ok_or_else(|| CacheError::NotFound(full_key.to_string()))?;
        Ok(guard.ttl_for_record(entry, Utc::now()))
    }

    /// True if `key` is expired or absent.
    pub fn expired(&self, key: impl Into<KeyValue>, opts: &Opts) -> Result<bool> {
        let full_key = self.compose(key, opts);
        let guard = self.state.acquire()?;
        Ok(match guard.store.get(&full_key) {
            Some(entry) => guard.is_expired(entry, Utc::now()),
            None => true,
        })
    }

    // == Clean ==
    /// Removes every expired entry and returns what was removed.
    ///
    /// Scans the whole store; only runs when called.
    pub fn clean(&self) -> Result<Vec<(CompositeKey, Entry<V>)>> {
        let mut guard = self.state.acquire()?;
        let now = Utc::now();
        let expired: Vec<CompositeKey> = guard
            .store
            .iter()
            .filter(|(_, entry)| guard.is_expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for key in expired {
            for policy in guard.policies.iter_mut() {
                policy.pre_delete(&key);
            }
            if let Some(entry) = guard.store.evict(&key) {
                removed.push((key, entry));
            }
        }

        let total = guard.store.len();
        guard.stats.record_expirations(removed.len());
        guard.stats.set_total_entries(total);
        debug!(removed = removed.len(), remaining = total, "cleaned expired entries");
        Ok(removed)
    }

    // == Reset ==
    /// Empties the cache and resets policy tracking state.
    pub fn reset(&self) -> Result<()> {
        let mut guard = self.state.acquire()?;
        guard.reset();
        debug!("cache reset");
        Ok(())
    }

    // == Length ==
    /// Returns the current number of entries, expired ones included.
    pub fn len(&self) -> Result<usize> {
        Ok(self.state.acquire()?.store.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.state.acquire()?.store.is_empty())
    }

    /// Snapshot of all entries in stable key order.
    pub fn entries(&self) -> Result<Vec<(CompositeKey, Entry<V>)>> {
        let guard = self.state.acquire()?;
        Ok(guard
            .store
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect())
    }

    pub fn keys(&self) -> Result<Vec<CompositeKey>> {
        let guard = self.state.acquire()?;
        Ok(guard.store.keys().cloned().collect())
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> Result<CacheStats> {
        Ok(self.state.acquire()?.stats.clone())
    }

    /// Runs `f` on the first registered policy of type `P`.
    ///
    /// Returns `None` if no such policy is registered.
    pub fn with_policy_mut<P, R>(&self, f: impl FnOnce(&mut P) -> R) -> Result<Option<R>>
    where
        P: 'static,
    {
        let mut guard = self.state.acquire()?;
        Ok(guard
            .policies
            .iter_mut()
            .find_map(|policy| policy.as_any_mut().downcast_mut::<P>())
            .map(f))
    }

    /// Changes the lifetime used by the timed expiry policy. Returns false if
    /// the cache has none; invalid lifetimes fail with
    /// [`CacheError::InvalidConfig`].
    pub fn set_expiry_seconds(&self, expiry_seconds: f64) -> Result<bool> {
        let applied = self
            .with_policy_mut(|timed: &mut TimedExpiry| timed.set_expiry_seconds(expiry_seconds))?
            .transpose()?;
        Ok(applied.is_some())
    }

    /// Names of the registered policies, in hook order.
    pub fn policy_names(&self) -> Result<Vec<&'static str>> {
        let guard = self.state.acquire()?;
        Ok(guard.policies.iter().map(|policy| policy.name()).collect())
    }

    pub fn lock_kind(&self) -> LockKind {
        self.state.kind()
    }
}

// == Cache Builder ==
/// Configures and builds a [`Cache`].
///
/// Policies run their hooks in the order they were added.
pub struct CacheBuilder<V> {
    policies: Vec<Box<dyn Policy<V>>>,
    lock: LockKind,
    excluded: BTreeSet<String>,
}

impl<V> Default for CacheBuilder<V>
where
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> CacheBuilder<V>
where
    V: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            policies: Vec::new(),
            lock: LockKind::Blocking,
            excluded: BTreeSet::new(),
        }
    }

    /// Builder preloaded from a [`CacheConfig`].
    pub fn from_config(config: &CacheConfig) -> Self {
        let mut builder = Self::new().expiry_seconds(config.expiry_seconds);
        if let Some(timeout_ms) = config.lock_timeout_ms {
            builder = builder.lock_timeout(Duration::from_millis(timeout_ms));
        }
        if let Some(max_size) = config.max_size {
            builder = match config.eviction {
                EvictionKind::Lru => builder.lru(max_size),
                EvictionKind::Random => builder.random_replacement(max_size),
            };
        }
        builder
    }

    pub fn lock(mut self, kind: LockKind) -> Self {
        self.lock = kind;
        self
    }

    /// Fail operations with [`CacheError::LockTimeout`] instead of waiting
    /// longer than `timeout` for the lock.
    pub fn lock_timeout(self, timeout: Duration) -> Self {
        self.lock(LockKind::Timeout(timeout))
    }

    /// Leaves option `name` out of composite keys. It still reaches the
    /// producer.
    pub fn exclude_option(mut self, name: impl Into<String>) -> Self {
        self.excluded.insert(name.into());
        self
    }

    pub fn expiry_seconds(self, expiry_seconds: f64) -> Self {
        self.policy(TimedExpiry::new(expiry_seconds))
    }

    pub fn lru(self, max_size: usize) -> Self {
        self.policy(LruEviction::new(max_size))
    }

    pub fn random_replacement(self, max_size: usize) -> Self {
        self.policy(RandomReplacement::new(max_size))
    }

    pub fn random_replacement_seeded(self, max_size: usize, seed: u64) -> Self {
        self.policy(RandomReplacement::with_seed(max_size, seed))
    }

    pub fn policy(mut self, policy: impl Policy<V>) -> Self {
        self.policies.push(Box::new(policy));
        self
    }

    // == Build ==
    /// Builds a cache that calls `make_value` for each missing key.
    pub fn build<F>(self, make_value: F) -> Result<Cache<V>>
    where
        F: Fn(&KeyValue, &Opts) -> anyhow::Result<V> + Send + Sync + 'static,
    {
        self.build_with(make_value)
    }

    /// Builds a cache around any [`MakeValue`] implementation.
    pub fn build_with(self, producer: impl MakeValue<V> + 'static) -> Result<Cache<V>> {
        self.finish(Refresher::Single(Box::new(producer)))
    }

    /// Builds a cache that refreshes a whole batch of keys per miss.
    pub fn build_batch<F>(self, make_batch: F) -> Result<Cache<V>>
    where
        F: Fn(&KeyValue, &Opts) -> anyhow::Result<Batch<V>> + Send + Sync + 'static,
    {
        self.build_batch_with(make_batch)
    }

    pub fn build_batch_with(self, producer: impl MakeBatch<V> + 'static) -> Result<Cache<V>> {
        self.finish(Refresher::Batch(Box::new(producer)))
    }

    /// Memoizes `func` under `name`, binding call arguments per `signature`.
    pub fn memoize<F>(
        self,
        name: impl Into<String>,
        signature: Signature,
        func: F,
    ) -> Result<Memoizer<V>>
    where
        F: Fn(&Opts) -> anyhow::Result<V> + Send + Sync + 'static,
    {
        let cache =
            self.build(move |_key: &KeyValue, opts: &Opts| func(&opts.without_namespace()))?;
        Ok(Memoizer::new(name.into(), signature, cache))
    }

    fn finish(self, refresher: Refresher<V>) -> Result<Cache<V>> {
        for policy in &self.policies {
            policy.validate()?;
        }
        debug!(
            policies = ?self.policies.iter().map(|p| p.name()).collect::<Vec<_>>(),
            lock = ?self.lock,
            "building cache"
        );

        Ok(Cache {
            composer: KeyComposer::excluding(self.excluded),
            refresher,
            state: CacheLock::new(CacheState::new(self.policies), self.lock),
        })
    }
}
