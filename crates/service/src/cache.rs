use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::defaults::{DefaultsLoader, DefaultsMap};
use crate::errors::ServiceError;

/// A populated snapshot plus its absolute deadline. Replaced wholesale
/// on repopulation, never mutated in place.
struct CacheEntry {
    map: DefaultsMap,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-wide cache of defaults snapshots with absolute expiry.
///
/// Created once at startup and shared by every request. Expiry is the
/// only removal mechanism; there is no explicit invalidation. An entry
/// populated at `t` with TTL `d` serves reads until `t + d`, regardless
/// of how often it is read in between.
pub struct DefaultsCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl DefaultsCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
        })
    }

    /// Return the live snapshot for `key`, invoking `loader` to build a
    /// fresh one when the entry is absent or past its deadline.
    ///
    /// Population runs under the write half of the lock with a re-check
    /// after acquisition, so concurrent misses on the same key result
    /// in a single loader invocation per expiry cycle; the losers block
    /// briefly and then read the entry the winner stored.
    ///
    /// If the loader fails and a previous snapshot exists (live or
    /// stale), that snapshot is served instead and the failure is
    /// logged. The stale entry keeps its old deadline, so the next
    /// request retries the loader. With no previous snapshot the error
    /// propagates.
    pub async fn get_or_populate(
        &self,
        key: &str,
        loader: &dyn DefaultsLoader,
        ttl: Duration,
    ) -> Result<DefaultsMap, ServiceError> {
        // Hot path: shared lock only.
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key) {
                if entry.is_live(Instant::now()) {
                    return Ok(entry.map.clone());
                }
            }
        }

        let mut entries = self.entries.write().await;
        // Another task may have repopulated while we waited for the lock.
        if let Some(entry) = entries.get(key) {
            if entry.is_live(Instant::now()) {
                return Ok(entry.map.clone());
            }
        }

        match loader.load().await {
            Ok(map) => {
                debug!(
                    key,
                    entries = map.len(),
                    ttl_secs = ttl.as_secs(),
                    "defaults cache populated"
                );
                let expires_at = Instant::now() + ttl;
                entries.insert(
                    key.to_string(),
                    CacheEntry {
                        map: map.clone(),
                        expires_at,
                    },
                );
                Ok(map)
            }
            Err(e) => {
                if let Some(entry) = entries.get(key) {
                    warn!(key, error = %e, "defaults loader failed; serving last-known-good snapshot");
                    return Ok(entry.map.clone());
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::StaticLoader;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(3600);

    /// Counts invocations so tests can assert how often population ran.
    struct CountingLoader {
        calls: AtomicUsize,
        inner: StaticLoader,
    }

    impl CountingLoader {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                inner: StaticLoader::builtin(),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl DefaultsLoader for CountingLoader {
        async fn load(&self) -> Result<DefaultsMap, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Yield so concurrent callers can pile up on the lock.
            tokio::task::yield_now().await;
            self.inner.load().await
        }
    }

    /// Succeeds `successes` times, then fails every call.
    struct FlakyLoader {
        calls: AtomicUsize,
        successes: usize,
    }

    #[async_trait::async_trait]
    impl DefaultsLoader for FlakyLoader {
        async fn load(&self) -> Result<DefaultsMap, ServiceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.successes {
                StaticLoader::builtin().load().await
            } else {
                Err(ServiceError::Loader("source unavailable".into()))
            }
        }
    }

    #[tokio::test]
    async fn cold_start_invokes_loader_once() {
        let cache = DefaultsCache::new();
        let loader = CountingLoader::new();

        let map = cache.get_or_populate("defaults", &loader, TTL).await.unwrap();
        assert_eq!(loader.calls(), 1);
        assert_eq!(map.get("value2"), Some("hello world"));
    }

    #[tokio::test]
    async fn warm_hit_returns_same_snapshot_without_reloading() {
        let cache = DefaultsCache::new();
        let loader = CountingLoader::new();

        let first = cache.get_or_populate("defaults", &loader, TTL).await.unwrap();
        let second = cache.get_or_populate("defaults", &loader, TTL).await.unwrap();

        assert_eq!(loader.calls(), 1);
        assert!(DefaultsMap::ptr_eq(&first, &second));
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_absolute_ttl() {
        let cache = DefaultsCache::new();
        let loader = CountingLoader::new();

        let first = cache.get_or_populate("defaults", &loader, TTL).await.unwrap();

        // Reads inside the window never extend the deadline.
        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        let still_cached = cache.get_or_populate("defaults", &loader, TTL).await.unwrap();
        assert_eq!(loader.calls(), 1);
        assert!(DefaultsMap::ptr_eq(&first, &still_cached));

        tokio::time::advance(Duration::from_secs(2)).await;
        let reloaded = cache.get_or_populate("defaults", &loader, TTL).await.unwrap();
        assert_eq!(loader.calls(), 2);
        assert!(!DefaultsMap::ptr_eq(&first, &reloaded));
    }

    #[tokio::test]
    async fn concurrent_misses_trigger_single_population() {
        let cache = DefaultsCache::new();
        let loader = Arc::new(CountingLoader::new());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let loader = Arc::clone(&loader);
            handles.push(tokio::spawn(async move {
                cache.get_or_populate("defaults", loader.as_ref(), TTL).await
            }));
        }

        let mut maps = Vec::new();
        for h in handles {
            maps.push(h.await.unwrap().unwrap());
        }

        assert_eq!(loader.calls(), 1);
        for m in &maps[1..] {
            assert!(DefaultsMap::ptr_eq(&maps[0], m));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn loader_failure_serves_last_known_good() {
        let cache = DefaultsCache::new();
        let loader = FlakyLoader {
            calls: AtomicUsize::new(0),
            successes: 1,
        };

        let first = cache.get_or_populate("defaults", &loader, TTL).await.unwrap();

        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        let fallback = cache.get_or_populate("defaults", &loader, TTL).await.unwrap();
        assert!(DefaultsMap::ptr_eq(&first, &fallback));

        // The stale entry was not refreshed, so the loader is retried.
        let retried = cache.get_or_populate("defaults", &loader, TTL).await.unwrap();
        assert!(DefaultsMap::ptr_eq(&first, &retried));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn loader_failure_with_empty_cache_propagates() {
        let cache = DefaultsCache::new();
        let loader = FlakyLoader {
            calls: AtomicUsize::new(0),
            successes: 0,
        };

        let res = cache.get_or_populate("defaults", &loader, TTL).await;
        assert!(matches!(res, Err(ServiceError::Loader(_))));
    }
}
