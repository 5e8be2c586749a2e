//! LRU Eviction Module
//!
//! Implements Least Recently Used capacity eviction.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::cache::{CompositeKey, Entry, EntryStore};
use crate::error::Result;
use crate::policy::{overflow, validate_max_size, Policy};

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// Every touch stamps the key with a new sequence number:
/// - Lowest sequence = Least recently used
/// - Highest sequence = Most recently used
///
/// The index from key to sequence keeps touch and remove logarithmic.
#[derive(Debug, Default)]
pub struct LruTracker {
    /// Keys by last access sequence
    order: BTreeMap<u64, CompositeKey>,
    /// Last access sequence of each key
    index: HashMap<CompositeKey, u64>,
    next_seq: u64,
}

impl LruTracker {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used.
    ///
    /// If key exists, its old position is dropped first.
    pub fn touch(&mut self, key: &CompositeKey) {
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Some(old) = self.index.insert(key.clone(), seq) {
            self.order.remove(&old);
        }
        self.order.insert(seq, key.clone());
    }

    // == Remove ==
    /// Removes a key from the tracker. Removing an untracked key is a no-op.
    pub fn remove(&mut self, key: &CompositeKey) {
        if let Some(seq) = self.index.remove(key) {
            self.order.remove(&seq);
        }
    }

    // == Pop Oldest ==
    /// Returns and removes the least recently used key.
    ///
    /// Returns None if tracker is empty.
    pub fn pop_oldest(&mut self) -> Option<CompositeKey> {
        let (_, key) = self.order.pop_first()?;
        self.index.remove(&key);
        Some(key)
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&CompositeKey> {
        self.order.values().next()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &CompositeKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.index.clear();
    }
}

// == LRU Eviction Policy ==
/// Keeps at most `max_size` entries, evicting the least recently used.
///
/// Recency is refreshed by gets and stores. Tracked keys are always a subset
/// of the stored keys.
#[derive(Debug)]
pub struct LruEviction {
    max_size: usize,
    tracker: LruTracker,
}

impl LruEviction {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            tracker: LruTracker::new(),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Changes the capacity. Takes effect on the next store; values below 1
    /// are treated as 1.
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
    }

    pub fn tracker(&self) -> &LruTracker {
        &self.tracker
    }
}

impl<V> Policy<V> for LruEviction {
    fn name(&self) -> &'static str {
        "lru"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn validate(&self) -> Result<()> {
        validate_max_size("lru", self.max_size)
    }

    fn pre_get(&mut self, key: &CompositeKey) {
        if self.tracker.contains(key) {
            self.tracker.touch(key);
        }
    }

    fn pre_store(
        &mut self,
        key: &CompositeKey,
        _entry: &Entry<V>,
        store: &EntryStore<V>,
    ) -> Vec<CompositeKey> {
        let needed = overflow(key, store, self.max_size.max(1));
        let victims: Vec<CompositeKey> = std::iter::from_fn(|| self.tracker.pop_oldest())
            .take(needed)
            .collect();
        for victim in &victims {
            debug!(key = %victim, "lru will remove least recently used key");
        }
        victims
    }

    fn post_store(&mut self, key: &CompositeKey, _entry: &Entry<V>) {
        self.tracker.touch(key);
    }

    fn pre_delete(&mut self, key: &CompositeKey) {
        self.tracker.remove(key);
    }

    fn post_reset(&mut self) {
        self.tracker.clear();
    }
}
