//! Cache Module
//!
//! Key composition, entry storage and the cache engine that fills itself
//! from a value producer on a miss.

mod engine;
mod entry;
mod key;
mod producer;
mod stats;
mod store;


// Re-export public types
pub use engine::{Cache, CacheBuilder};
pub use entry::{create_ttl, Entry, TtlInfo};
pub use key::{compose, CompositeKey, KeyComposer, KeyValue, Opts, DEFAULT_NAMESPACE};
pub use producer::{Batch, MakeBatch, MakeValue};
pub use stats::CacheStats;
pub use store::EntryStore;
