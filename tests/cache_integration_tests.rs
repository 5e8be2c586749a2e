//! Integration Tests for the Cache API
//!
//! Exercises the public surface end to end: expiry, eviction, batch
//! refresh, memoization and multi-threaded access.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::thread::{self, sleep};
use std::time::Duration;

use memo_cache::cache::Batch;
use memo_cache::{
    Cache, CacheBuilder, CacheConfig, CacheError, CallArgs, EvictionKind, KeyValue, LockKind, Opts,
    Signature,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// == Helper Functions ==

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "memo_cache=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (Arc::clone(&calls), calls)
}

// == Timed Expiry ==

#[test]
fn test_timed_expiry_scenario() {
    init_tracing();
    let cache = Cache::builder()
        .expiry_seconds(1.0)
        .build(|_key: &KeyValue, _opts: &Opts| Ok(0))
        .unwrap();

    cache.store("a", 5, &Opts::new()).unwrap();
    assert_eq!(cache.get("a", &Opts::new()).unwrap(), Some(5));
    let ttl = cache.ttl("a", &Opts::new()).unwrap();
    assert!(ttl > 0.9 && ttl <= 1.0, "fresh ttl should be close to 1s, got {ttl}");

    sleep(Duration::from_millis(1200));

    assert_eq!(cache.ttl("a", &Opts::new()).unwrap(), 0.0);
    assert!(cache.expired("a", &Opts::new()).unwrap());
    assert_eq!(cache.get_cached("a", &Opts::new()).unwrap(), None);
    assert_eq!(cache.get_cached("a", &Opts::new()).unwrap().unwrap_or(-1), -1);

    let removed = cache.clean().unwrap();
    assert_eq!(removed.len(), 1);
    assert!(!cache.exists("a", &Opts::new()).unwrap());

    // Absent again, so the next read produces a fresh 0
    assert_eq!(cache.get_or("a", -1, &Opts::new()).unwrap(), 0);
}

// == LRU Eviction ==

#[test]
fn test_lru_capacity_bound() {
    init_tracing();
    let cache = Cache::builder().lru(3).build(|_key: &KeyValue, _opts: &Opts| Ok(0)).unwrap();

    for (i, key) in ["a", "b", "c", "d"].into_iter().enumerate() {
        cache.store(key, i, &Opts::new()).unwrap();
    }

    assert_eq!(cache.len().unwrap(), 3);
    assert!(!cache.exists("a", &Opts::new()).unwrap());
    assert_eq!(cache.stats().unwrap().evictions, 1);
}

#[test]
fn test_lru_recency() {
    init_tracing();
    let cache = Cache::builder().lru(3).build(|_key: &KeyValue, _opts: &Opts| Ok(0)).unwrap();
    for key in ["a", "b", "c"] {
        cache.store(key, 1, &Opts::new()).unwrap();
    }

    cache.get("a", &Opts::new()).unwrap();
    cache.store("d", 1, &Opts::new()).unwrap();

    assert!(cache.exists("a", &Opts::new()).unwrap());
    assert!(!cache.exists("b", &Opts::new()).unwrap());
    assert!(cache.exists("c", &Opts::new()).unwrap());
    assert!(cache.exists("d", &Opts::new()).unwrap());
}

#[test]
fn test_lru_with_expiry_refreshes_evicted_keys() {
    init_tracing();
    let (calls, seen) = counter();
    let cache = Cache::builder()
        .expiry_seconds(60.0)
        .lru(2)
        .build(move |key: &KeyValue, _opts: &Opts| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(key.as_int().unwrap_or_default() * 10)
        })
        .unwrap();

    assert_eq!(cache.get(1, &Opts::new()).unwrap(), Some(10));
    assert_eq!(cache.get(2, &Opts::new()).unwrap(), Some(20));
    assert_eq!(cache.get(3, &Opts::new()).unwrap(), Some(30));
    assert_eq!(seen.load(Ordering::SeqCst), 3);

    // 1 was evicted, so it is produced again
    assert_eq!(cache.get(1, &Opts::new()).unwrap(), Some(10));
    assert_eq!(seen.load(Ordering::SeqCst), 4);
    assert_eq!(cache.len().unwrap(), 2);
}

// == Random Replacement ==

#[test]
fn test_random_replacement_keeps_capacity() {
    init_tracing();
    let cache = Cache::builder()
        .random_replacement_seeded(5, 99)
        .build(|key: &KeyValue, _opts: &Opts| Ok(key.to_string()))
        .unwrap();

    for i in 0..50 {
        cache.get(i, &Opts::new()).unwrap();
        assert!(cache.len().unwrap() <= 5);
    }
    assert!(cache.exists(49, &Opts::new()).unwrap());
    assert_eq!(cache.stats().unwrap().evictions, 45);
}

// == Batch Refresh ==

#[test]
fn test_batch_refresh_contract() {
    init_tracing();
    let cache = Cache::builder()
        .build_batch(|_key: &KeyValue, _opts: &Opts| {
            Ok(Batch::from([(KeyValue::from("other"), 1)]))
        })
        .unwrap();

    let err = cache.refresh("wanted", &Opts::new()).unwrap_err();
    assert!(matches!(err, CacheError::BatchContractViolation(_)));
    assert!(cache.is_empty().unwrap());
}

#[test]
fn test_batch_refresh_stores_extra_keys() {
    init_tracing();
    let (calls, seen) = counter();
    let cache = Cache::builder()
        .build_batch(move |_key: &KeyValue, opts: &Opts| {
            calls.fetch_add(1, Ordering::SeqCst);
            let region = opts.get("region").and_then(KeyValue::as_str).unwrap_or("none");
            Ok(["alice", "bob", "carol"]
                .into_iter()
                .map(|user| (KeyValue::from(user), format!("{user}@{region}")))
                .collect::<BTreeMap<_, _>>())
        })
        .unwrap();
    let eu = Opts::new().with("region", "eu");

    assert_eq!(cache.get("bob", &eu).unwrap().as_deref(), Some("bob@eu"));
    assert_eq!(cache.get("alice", &eu).unwrap().as_deref(), Some("alice@eu"));
    assert_eq!(cache.get("carol", &eu).unwrap().as_deref(), Some("carol@eu"));
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    // Other options are a separate batch
    let us = Opts::new().with("region", "us");
    assert_eq!(cache.get("alice", &us).unwrap().as_deref(), Some("alice@us"));
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

// == Memoization ==

#[test]
fn test_memoizer_argument_equivalence() {
    init_tracing();
    let (calls, seen) = counter();
    let add = CacheBuilder::new()
        .memoize("add", Signature::new(["x", "y"]), move |opts: &Opts| {
            calls.fetch_add(1, Ordering::SeqCst);
            let x = opts.require("x")?.as_int().unwrap_or_default();
            let y = opts.require("y")?.as_int().unwrap_or_default();
            Ok(x + y)
        })
        .unwrap();

    assert_eq!(add.call(&CallArgs::new().arg(1).arg(2)).unwrap(), Some(3));
    assert_eq!(add.call(&CallArgs::new().arg(1).kwarg("y", 2)).unwrap(), Some(3));
    assert_eq!(add.call(&CallArgs::new().kwarg("x", 1).kwarg("y", 2)).unwrap(), Some(3));
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    let key = add.input_to_full_key(&CallArgs::new().arg(1).arg(2)).unwrap();
    assert_eq!(add.cache().keys().unwrap(), vec![key]);
}

// == Concurrency ==

#[test]
fn test_two_threads_produce_once() {
    init_tracing();
    let (calls, seen) = counter();
    let cache = Cache::builder()
        .build(move |_key: &KeyValue, _opts: &Opts| {
            calls.fetch_add(1, Ordering::SeqCst);
            // Slow producer so the second thread arrives mid-production
            sleep(Duration::from_millis(100));
            Ok("expensive".to_string())
        })
        .unwrap();

    let results: Vec<String> = thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| scope.spawn(|| cache.get_or("shared", String::new(), &Opts::new()).unwrap()))
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert_eq!(results, vec!["expensive", "expensive"]);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn test_lock_timeout_surfaces_slow_producer() {
    init_tracing();
    let cache = Cache::builder()
        .lock_timeout(Duration::from_millis(50))
        .build(|_key: &KeyValue, _opts: &Opts| {
            sleep(Duration::from_millis(300));
            Ok(1)
        })
        .unwrap();
    assert_eq!(cache.lock_kind(), LockKind::Timeout(Duration::from_millis(50)));

    thread::scope(|scope| {
        let slow = scope.spawn(|| cache.get("slow", &Opts::new()));
        sleep(Duration::from_millis(100));
        let blocked = cache.len();
        assert!(matches!(blocked, Err(CacheError::LockTimeout(_))));
        assert_eq!(slow.join().unwrap().unwrap(), Some(1));
    });

    // Lock is free again
    assert_eq!(cache.len().unwrap(), 1);
}

#[test]
fn test_shared_cache_across_spawned_threads() {
    init_tracing();
    let cache = Arc::new(
        Cache::builder()
            .lru(100)
            .build(|key: &KeyValue, _opts: &Opts| Ok(key.as_int().unwrap_or_default() * 2))
            .unwrap(),
    );

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..50i64 {
                    let value = cache.get(i + t * 10, &Opts::new()).unwrap();
                    assert_eq!(value, Some((i + t * 10) * 2));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len().unwrap(), 80);
}

// == Configuration ==

#[test]
fn test_builder_from_config() {
    init_tracing();
    let config = CacheConfig {
        max_size: Some(2),
        eviction: EvictionKind::Lru,
        ..CacheConfig::default()
    };
    let cache = CacheBuilder::from_config(&config)
        .build(|key: &KeyValue, _opts: &Opts| Ok(key.to_string()))
        .unwrap();

    for key in ["a", "b", "c"] {
        cache.get(key, &Opts::new()).unwrap();
    }
    assert_eq!(cache.len().unwrap(), 2);
    assert!(cache.ttl("c", &Opts::new()).unwrap() > 3599.0);
}
