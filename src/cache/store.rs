//! Entry Store Module
//!
//! Mapping from composite key to entry. Ordered by key, so enumeration is
//! stable between mutations.

use std::collections::btree_map::{self, BTreeMap};

use crate::cache::{CompositeKey, Entry};
use crate::error::{CacheError, Result};

// == Entry Store ==
/// Storage for cache entries.
#[derive(Debug)]
pub struct EntryStore<V> {
    entries: BTreeMap<CompositeKey, Entry<V>>,
}

impl<V> Default for EntryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> EntryStore<V> {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    // == Put ==
    /// Inserts or replaces the entry for `key`, returning the stored entry.
    pub fn put(&mut self, key: CompositeKey, entry: Entry<V>) -> &Entry<V> {
        match self.entries.entry(key) {
            btree_map::Entry::Occupied(mut occupied) => {
                occupied.insert(entry);
                occupied.into_mut()
            }
            btree_map::Entry::Vacant(vacant) => vacant.insert(entry),
        }
    }

    pub fn get(&self, key: &CompositeKey) -> Option<&Entry<V>> {
        self.entries.get(key)
    }

    // == Remove ==
    /// Removes the entry for `key`, failing with [`CacheError::NotFound`]
    /// if there is none.
    pub fn remove(&mut self, key: &CompositeKey) -> Result<Entry<V>> {
        self.entries
            .remove(key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    // == Evict ==
    /// Removes the entry for `key` if present. Never fails.
    pub fn evict(&mut self, key: &CompositeKey) -> Option<Entry<V>> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &CompositeKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&CompositeKey, &Entry<V>)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CompositeKey> {
        self.entries.keys()
    }

    // == Length ==
    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
