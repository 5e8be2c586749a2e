//! Random replacement: when full, evict uniformly random entries.
//!
//! No access tracking at all, which makes it a useful baseline when
//! comparing hit rates against LRU.

use std::any::Any;

use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::cache::{CompositeKey, Entry, EntryStore};
use crate::error::Result;
use crate::policy::{overflow, validate_max_size, Policy};

#[derive(Debug)]
pub struct RandomReplacement {
    max_size: usize,
    rng: StdRng,
}

impl RandomReplacement {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic victim selection, for reproducible runs.
    pub fn with_seed(max_size: usize, seed: u64) -> Self {
        Self {
            max_size,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
    }
}

impl<V> Policy<V> for RandomReplacement {
    fn name(&self) -> &'static str {
        "random_replacement"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn validate(&self) -> Result<()> {
        validate_max_size("random_replacement", self.max_size)
    }

    fn pre_store(
        &mut self,
        key: &CompositeKey,
        _entry: &Entry<V>,
        store: &EntryStore<V>,
    ) -> Vec<CompositeKey> {
        let needed = overflow(key, store, self.max_size.max(1));
        if needed == 0 {
            return Vec::new();
        }

        let victims = store.keys().cloned().choose_multiple(&mut self.rng, needed);
        for victim in &victims {
            debug!(key = %victim, "random replacement will remove key");
        }
        victims
    }
}
