// =============================================================================
// Computation Cache — Keyed memoization with per-entry time-to-live
// =============================================================================
//
// Every analyzer call is wrapped in this cache so repeated scoring within a
// freshness window never re-derives anything. Values are type-erased behind
// `Arc<dyn Any>` so one cache instance serves every report type; the typed
// accessors downcast on the way out.
//
// The miss path ("miss → compute → store") is NOT single-flight: concurrent
// callers that miss on the same cold key may each invoke their producer.
// Producers are referentially transparent over their freshness window, so
// duplicated invocation wastes work but never produces a wrong answer.
// The lock is never held across an await.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::trace;

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_valid(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Aggregate cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Shared TTL cache. Constructed once at process start and injected into
/// every analyzer; wrap in `Arc` to share.
pub struct ComputationCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ComputationCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up `key`, returning a clone of the stored value if it is present,
    /// unexpired, and of type `T`. Expired entries are treated as absent and
    /// evicted lazily.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let now = Instant::now();

        {
            let entries = self.entries.read();
            if let Some(entry) = entries.get(key) {
                if entry.is_valid(now) {
                    if let Some(value) = entry.value.downcast_ref::<T>() {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        trace!(key = %key, "cache hit");
                        return Some(value.clone());
                    }
                }
            }
        }

        // Evict an expired entry so the map does not accumulate dead keys.
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(key) {
            if !entry.is_valid(now) {
                entries.remove(key);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!(key = %key, "cache miss");
        None
    }

    /// Store `value` under `key` with an absolute expiry of now + `ttl`.
    pub fn set<T>(&self, key: &str, value: T, ttl: Duration)
    where
        T: Send + Sync + 'static,
    {
        let entry = CacheEntry {
            value: Arc::new(value),
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().insert(key.to_string(), entry);
    }

    /// Return the cached value for `key` if valid; otherwise await `producer`,
    /// store its result with `ttl`, and return it.
    ///
    /// No single-flight guarantee: callers must not assume the producer runs
    /// exactly once per expiry window under concurrency.
    pub async fn get_or_compute<T, F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(value) = self.get::<T>(key) {
            return value;
        }
        let value = producer().await;
        self.set(key, value.clone(), ttl);
        value
    }

    /// Remove an entry unconditionally.
    pub fn invalidate(&self, key: &str) {
        self.entries.write().remove(key);
    }

    /// Clear all entries. Counters are preserved.
    pub fn flush(&self) {
        self.entries.write().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for ComputationCache {
    fn default() -> Self {
        Self::new()
    }
}
