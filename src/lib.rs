//! Memo Cache - an in-process caching and memoization framework
//!
//! A [`Cache`] composes canonical keys from a base key and options, fills
//! itself from a value producer on a miss, and lets pluggable policies
//! expire and evict entries. A [`Memoizer`] puts a cache in front of a
//! function of named parameters.

pub mod cache;
pub mod config;
pub mod error;
pub mod lock;
pub mod memoize;
pub mod policy;
pub mod tasks;

pub use cache::{Cache, CacheBuilder, CacheStats, CompositeKey, Entry, KeyValue, Opts};
pub use config::{CacheConfig, EvictionKind};
pub use error::{CacheError, Result};
pub use lock::LockKind;
pub use memoize::{CallArgs, Memoizer, Signature};
pub use policy::{LruEviction, Policy, RandomReplacement, TimedExpiry};
pub use tasks::spawn_cleanup_task;
