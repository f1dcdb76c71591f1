//! Process-local TTL cache for read-heavy aggregate endpoints.
//!
//! Entries expire a fixed time after they are written. `get` never returns
//! an expired value: expired entries are dropped on read and by an optional
//! background sweep. Capacity is bounded; inserting into a full cache first
//! drops expired entries and then the entry closest to expiry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::CacheConfig;

#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub default_ttl: Duration,
    pub max_entries: usize,
    /// Collapse concurrent misses for one key into a single factory call.
    /// When false, every concurrent miss runs the factory.
    pub single_flight: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(5 * 60),
            max_entries: 1024,
            single_flight: false,
        }
    }
}

impl From<&CacheConfig> for CacheOptions {
    fn from(config: &CacheConfig) -> Self {
        Self {
            default_ttl: Duration::from_secs(config.default_ttl_secs),
            max_entries: config.max_entries.max(1),
            single_flight: config.single_flight,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

type FlightMap = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

/// Releases a caller's claim on a single-flight key, including when the
/// `get_or_set` future is dropped while waiting.
struct FlightGuard<'a> {
    in_flight: &'a Mutex<FlightMap>,
    key: &'a str,
    flight: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = lock(self.in_flight);
        let ours = in_flight
            .get(self.key)
            .is_some_and(|current| Arc::ptr_eq(current, &self.flight));
        // map + this handle: nobody else is waiting on the key
        if ours && Arc::strong_count(&self.flight) <= 2 {
            in_flight.remove(self.key);
        }
    }
}

pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    in_flight: Mutex<FlightMap>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    options: CacheOptions,
}

/// Lock, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(options: CacheOptions) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            sweeper: Mutex::new(None),
            options,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = lock(&self.entries);
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Store `value` for `ttl`, or the default TTL when `None`.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let expires_at = Instant::now() + ttl.unwrap_or(self.options.default_ttl);
        let mut entries = lock(&self.entries);
        if !entries.contains_key(&key) && entries.len() >= self.options.max_entries {
            Self::make_room(&mut entries, self.options.max_entries);
        }
        entries.insert(key, CacheEntry { value, expires_at });
    }

    fn make_room(entries: &mut HashMap<String, CacheEntry<V>>, max_entries: usize) {
        let now = Instant::now();
        entries.retain(|_, e| e.expires_at > now);
        if entries.len() < max_entries {
            return;
        }
        let soonest = entries
            .iter()
            .min_by_key(|(_, e)| e.expires_at)
            .map(|(k, _)| k.clone());
        if let Some(key) = soonest {
            entries.remove(&key);
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        lock(&self.entries).remove(key).is_some()
    }

    /// Remove every key starting with `prefix`; returns how many were dropped.
    pub fn delete_prefix(&self, prefix: &str) -> usize {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        before - entries.len()
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    /// Cached value for `key`, or the result of `factory` stored for `ttl`.
    ///
    /// Factory errors are returned as-is and nothing is cached.
    pub async fn get_or_set<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        factory: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        if !self.options.single_flight {
            let value = factory().await?;
            self.set(key, value.clone(), ttl);
            return Ok(value);
        }

        let flight = lock(&self.in_flight)
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let flight = FlightGuard { in_flight: &self.in_flight, key, flight };

        let _turn = flight.flight.lock().await;
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = factory().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// Sweep every `interval` on the current runtime until [`TtlCache::close`]
    /// or until the cache is dropped.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else { break };
                let removed = cache.sweep();
                if removed > 0 {
                    tracing::debug!(removed, "cache sweep");
                }
            }
        });
        if let Some(previous) = lock(&self.sweeper).replace(handle) {
            previous.abort();
        }
    }

    /// Stop the sweeper and drop all entries.
    pub fn close(&self) {
        if let Some(handle) = lock(&self.sweeper).take() {
            handle.abort();
        }
        self.clear();
    }
}

impl<V> Drop for TtlCache<V> {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.sweeper).take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache(single_flight: bool) -> TtlCache<i64> {
        TtlCache::new(CacheOptions {
            default_ttl: Duration::from_secs(60),
            max_entries: 8,
            single_flight,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_ttl() {
        let cache = cache(false);
        cache.set("k", 1, Some(Duration::from_millis(50)));
        assert_eq!(cache.get("k"), Some(1));

        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0, "expired entry is evicted on read");
    }

    #[tokio::test(start_paused = true)]
    async fn get_or_set_calls_factory_once_within_ttl() {
        let cache = cache(false);
        let calls = AtomicUsize::new(0);
        let ttl = Some(Duration::from_millis(100));

        for _ in 0..2 {
            let v = cache
                .get_or_set("stats", ttl, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(7)
                })
                .await;
            assert_eq!(v, Ok(7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(150)).await;
        cache
            .get_or_set("stats", ttl, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(8)
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.get("stats"), Some(8));
    }

    #[tokio::test]
    async fn factory_error_is_not_cached() {
        let cache = cache(false);
        let err = cache.get_or_set("k", None, || async { Err::<i64, _>("boom") }).await;
        assert_eq!(err, Err("boom"));
        assert!(!cache.has("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_expired_entries() {
        let cache = cache(false);
        cache.set("short", 1, Some(Duration::from_secs(1)));
        cache.set("long", 2, Some(Duration::from_secs(10)));
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn background_sweeper_runs_until_closed() {
        let cache = Arc::new(cache(false));
        cache.set("k", 1, Some(Duration::from_secs(1)));
        cache.start_sweeper(Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;
        assert_eq!(cache.len(), 0);

        cache.close();
        assert!(lock(&cache.sweeper).is_none());
    }

    #[tokio::test]
    async fn full_cache_evicts_soonest_expiry() {
        let cache = TtlCache::new(CacheOptions {
            default_ttl: Duration::from_secs(60),
            max_entries: 2,
            single_flight: false,
        });
        cache.set("a", 1, Some(Duration::from_secs(5)));
        cache.set("b", 2, Some(Duration::from_secs(50)));
        cache.set("c", 3, None);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[tokio::test]
    async fn delete_prefix_invalidates_family() {
        let cache = cache(false);
        cache.set("visits:stats:7", 1, None);
        cache.set("visits:stats:30", 2, None);
        cache.set("dashboard", 3, None);
        assert_eq!(cache.delete_prefix("visits:"), 2);
        assert!(cache.has("dashboard"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn single_flight_collapses_concurrent_misses() {
        let cache = Arc::new(cache(true));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            tasks.push(tokio::spawn(async move {
                cache
                    .get_or_set("slow", None, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, ()>(42)
                    })
                    .await
            }));
        }
        for t in tasks {
            assert_eq!(t.await.unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(lock(&cache.in_flight).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiters_release_their_keys() {
        let cache = cache(true);

        for i in 0..100 {
            let key = format!("slow:{}", i);
            let pending = cache.get_or_set(&key, None, || std::future::pending::<Result<i64, ()>>());
            let timed_out = tokio::time::timeout(Duration::from_millis(1), pending).await;
            assert!(timed_out.is_err());
        }
        assert!(lock(&cache.in_flight).is_empty());

        let value = cache.get_or_set("slow:0", None, || async { Ok::<_, ()>(5) }).await;
        assert_eq!(value, Ok(5));
        assert!(lock(&cache.in_flight).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_leaves_running_flight_in_place() {
        let cache = Arc::new(cache(true));
        let (release, released) = tokio::sync::oneshot::channel::<()>();

        let leader = tokio::spawn({
            let cache = cache.clone();
            async move {
                cache
                    .get_or_set("slow", None, || async move {
                        let _ = released.await;
                        Ok::<_, ()>(9)
                    })
                    .await
            }
        });
        tokio::task::yield_now().await;
        assert_eq!(lock(&cache.in_flight).len(), 1);

        let follower = cache.get_or_set("slow", None, || async { Ok::<_, ()>(0) });
        assert!(tokio::time::timeout(Duration::from_millis(1), follower).await.is_err());
        assert_eq!(lock(&cache.in_flight).len(), 1, "leader still owns the key");

        release.send(()).unwrap();
        assert_eq!(leader.await.unwrap(), Ok(9));
        assert!(lock(&cache.in_flight).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn without_single_flight_each_concurrent_miss_runs_factory() {
        let cache = Arc::new(cache(false));
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(tokio::sync::Barrier::new(4));

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            let calls = calls.clone();
            let barrier = barrier.clone();
            tasks.push(tokio::spawn(async move {
                cache
                    .get_or_set("slow", None, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        barrier.wait().await;
                        Ok::<_, ()>(1)
                    })
                    .await
            }));
        }
        for t in tasks {
            t.await.unwrap().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
