//! Expiry Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::Cache;

/// Spawns a background task that periodically runs [`Cache::clean`].
///
/// The task runs in an infinite loop, sleeping for `interval` between runs.
/// `clean` holds the cache lock for a full scan, so it runs on the blocking
/// pool rather than on a runtime worker.
///
/// Returns a JoinHandle the caller aborts to stop the task.
///
/// # Example
/// ```ignore
/// let config = CacheConfig::from_env();
/// let cache = Arc::new(CacheBuilder::from_config(&config).build(producer)?);
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), config.cleanup_interval());
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task<V>(cache: Arc<Cache<V>>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!("Starting expiry cleanup task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let cache = Arc::clone(&cache);
            let result = tokio::task::spawn_blocking(move || cache.clean()).await;

            match result {
                Ok(Ok(removed)) if !removed.is_empty() => {
                    info!("Expiry cleanup: removed {} expired entries", removed.len());
                }
                Ok(Ok(_)) => debug!("Expiry cleanup: no expired entries found"),
                Ok(Err(err)) => warn!("Expiry cleanup skipped: {}", err),
                Err(err) => warn!("Expiry cleanup task failed: {}", err),
            }
        }
    })
}
