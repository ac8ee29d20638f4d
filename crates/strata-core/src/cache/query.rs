//! Stale-while-revalidate query cache.

use super::entry::{CacheRead, CacheStatus, EntryState, InFlight, Slot};
use crate::config::CachePolicy;
use crate::error::{Result, StrataError};
use crate::network::retry_async;
use futures::future::BoxFuture;
use futures::FutureExt;
use mini_moka::sync::Cache;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

type Fetcher<K, V> = Arc<dyn Fn(K) -> BoxFuture<'static, Result<V>> + Send + Sync>;

/// Entry counts by status for one cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub name: String,
    pub entries: usize,
    pub fetching: usize,
    pub fresh: usize,
    pub stale: usize,
    pub failed: usize,
}

/// A keyed cache whose values come from an async fetcher.
///
/// - Consumers of a key share one in-flight fetch.
/// - Fresh data is served without fetching. Stale data is served as is while
///   one background refresh runs; a failed refresh is not retried until the
///   key is mounted again or refetched.
/// - Every fetch bumps the entry's generation and only the latest
///   generation's response is written.
/// - Entries idle for longer than the policy's `gc_after` are evicted.
///
/// Background work is spawned on the ambient tokio runtime.
pub struct QueryCache<K, V> {
    name: &'static str,
    policy: CachePolicy,
    fetcher: Fetcher<K, V>,
    entries: Cache<K, Arc<Slot<V>>>,
    insert_lock: Mutex<()>,
    updates: broadcast::Sender<K>,
}

impl<K, V> QueryCache<K, V>
where
    K: Clone + Eq + Hash + Display + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn new<F, Fut>(name: &'static str, policy: CachePolicy, fetcher: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let entries = Cache::builder()
            .time_to_idle(policy.gc_after)
            .max_capacity(policy.max_entries)
            .build();
        let (updates, _) = broadcast::channel(64);
        Self {
            name,
            fetcher: Arc::new(move |key: K| fetcher(key).boxed()),
            policy,
            entries,
            insert_lock: Mutex::new(()),
            updates,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Keys whose entry changed (fetch started or finished).
    pub fn subscribe(&self) -> broadcast::Receiver<K> {
        self.updates.subscribe()
    }

    /// Current state of `key` without triggering anything.
    pub fn peek(&self, key: &K) -> CacheRead<V> {
        match self.entries.get(key) {
            Some(slot) => slot.lock().read(self.policy.stale_after),
            None => CacheRead::absent(),
        }
    }

    /// Serve `key`, starting a fetch if the entry is absent or a background
    /// refresh if it just went stale. Never waits.
    pub fn ensure(&self, key: &K) -> CacheRead<V> {
        self.ensure_inner(key, false).0
    }

    /// Like [`ensure`](Self::ensure), and also re-arms an entry whose last
    /// fetch failed. Called when a consumer starts watching `key`.
    pub fn mount(&self, key: &K) -> CacheRead<V> {
        self.ensure_inner(key, true).0
    }

    /// Data for `key`, waiting for a fetch if there is nothing cached.
    /// Stale data is returned at once while it refreshes.
    pub async fn get(&self, key: &K) -> Result<Arc<V>> {
        let (read, in_flight) = self.ensure_inner(key, true);
        if let Some(data) = read.data {
            return Ok(data);
        }
        match in_flight {
            Some(in_flight) => in_flight.await,
            None => Err(read.error.unwrap_or_else(|| {
                StrataError::Other(format!("{} {}: no data", self.name, key))
            })),
        }
    }

    /// Wait for any running fetch of `key`, then return its state.
    pub async fn settle(&self, key: &K) -> CacheRead<V> {
        let in_flight = self
            .entries
            .get(key)
            .and_then(|slot| slot.lock().in_flight.clone());
        if let Some(in_flight) = in_flight {
            // The outcome is read back from the entry.
            let _ = in_flight.await;
        }
        self.peek(key)
    }

    /// Start a new fetch of `key` regardless of staleness. A fetch already
    /// running is superseded: its response will not be written.
    ///
    /// The fetch runs even if the returned future is dropped.
    pub fn refetch(&self, key: &K) -> InFlight<V> {
        let slot = self.slot(key);
        let mut state = slot.lock();
        self.start_fetch(key, &slot, &mut state)
    }

    /// Mark `key` stale so the next `ensure` refreshes it.
    pub fn invalidate(&self, key: &K) {
        if let Some(slot) = self.entries.get(key) {
            let mut state = slot.lock();
            state.invalidated = true;
            state.refresh_armed = true;
            debug!("{} {}: invalidated", self.name, key);
        }
    }

    /// Drop `key` entirely.
    pub fn remove(&self, key: &K) {
        self.entries.invalidate(key);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.invalidate_all();
        info!("{} cache cleared", self.name);
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            name: self.name.to_string(),
            ..CacheStats::default()
        };
        for entry in self.entries.iter() {
            stats.entries += 1;
            let read = entry.value().lock().read(self.policy.stale_after);
            if read.is_fetching {
                stats.fetching += 1;
            }
            match read.status {
                CacheStatus::Fresh => stats.fresh += 1,
                CacheStatus::Stale => stats.stale += 1,
                CacheStatus::Failed => stats.failed += 1,
                CacheStatus::Absent | CacheStatus::Fetching => {}
            }
        }
        stats
    }

    // Internal methods

    fn slot(&self, key: &K) -> Arc<Slot<V>> {
        if let Some(slot) = self.entries.get(key) {
            return slot;
        }
        let _guard = self.insert_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = self.entries.get(key) {
            return slot;
        }
        let slot = Arc::new(Slot::new());
        self.entries.insert(key.clone(), Arc::clone(&slot));
        slot
    }

    fn ensure_inner(&self, key: &K, mount: bool) -> (CacheRead<V>, Option<InFlight<V>>) {
        let slot = self.slot(key);
        let mut state = slot.lock();
        if mount {
            state.refresh_armed = true;
        }

        if state.in_flight.is_none() && state.refresh_armed {
            if state.data.is_none() {
                debug!("{} {}: miss", self.name, key);
                let _ = self.start_fetch(key, &slot, &mut state);
            } else if state.is_stale(self.policy.stale_after) {
                debug!("{} {}: stale, refreshing in background", self.name, key);
                let _ = self.start_fetch(key, &slot, &mut state);
            }
        }

        (state.read(self.policy.stale_after), state.in_flight.clone())
    }

    fn start_fetch(
        &self,
        key: &K,
        slot: &Arc<Slot<V>>,
        state: &mut EntryState<V>,
    ) -> InFlight<V> {
        state.generation += 1;
        state.refresh_armed = false;
        let generation = state.generation;

        let label = format!("{} {}", self.name, key);
        let fetcher = Arc::clone(&self.fetcher);
        let retry = self.policy.retry_config();
        let slot = Arc::clone(slot);
        let updates = self.updates.clone();
        let fetch_key = key.clone();

        let in_flight: InFlight<V> = async move {
            let started = Instant::now();
            let (result, stats) = retry_async(
                &label,
                &retry,
                || fetcher(fetch_key.clone()),
                StrataError::is_retryable,
            )
            .await;
            let result = result.map(Arc::new);

            if slot.apply(generation, &result) {
                match &result {
                    Ok(_) => info!(
                        "{}: fetched in {:?} ({} attempt(s))",
                        label,
                        started.elapsed(),
                        stats.attempts
                    ),
                    Err(e) => warn!("{}: fetch failed: {}", label, e),
                }
                let _ = updates.send(fetch_key);
            } else {
                debug!("{}: dropping superseded response (generation {})", label, generation);
            }
            result
        }
        .boxed()
        .shared();

        state.in_flight = Some(in_flight.clone());
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(in_flight.clone());
            }
            Err(_) => warn!("{} {}: no runtime, fetch runs when awaited", self.name, key),
        }
        let _ = self.updates.send(key.clone());
        in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const LATENCY: Duration = Duration::from_millis(100);

    fn policy() -> CachePolicy {
        CachePolicy::new(Duration::from_secs(60)).with_retry_delay(Duration::from_millis(10))
    }

    /// A cache over `String` keys whose fetcher counts calls, sleeps and
    /// returns `"{key}#{call}"`, failing with `error` while it is set.
    struct Harness {
        cache: QueryCache<String, String>,
        calls: Arc<AtomicUsize>,
        error: Arc<Mutex<Option<StrataError>>>,
    }

    fn harness(policy: CachePolicy) -> Harness {
        let calls = Arc::new(AtomicUsize::new(0));
        let error: Arc<Mutex<Option<StrataError>>> = Arc::new(Mutex::new(None));
        let (c, e) = (Arc::clone(&calls), Arc::clone(&error));
        let cache = QueryCache::new("test", policy, move |key: String| {
            let call = c.fetch_add(1, Ordering::SeqCst) + 1;
            let error = e.lock().unwrap().clone();
            async move {
                tokio::time::sleep(LATENCY).await;
                match error {
                    Some(error) => Err(error),
                    None => Ok(format!("{}#{}", key, call)),
                }
            }
        });
        Harness { cache, calls, error }
    }

    fn network_error() -> StrataError {
        StrataError::Network {
            message: "connection refused".into(),
            cause: None,
        }
    }

    impl Harness {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn fail_with(&self, error: Option<StrataError>) {
            *self.error.lock().unwrap() = error;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_consumers_share_one_fetch() {
        let h = harness(policy());
        let key = "icons".to_string();

        let (a, b, c) = tokio::join!(h.cache.get(&key), h.cache.get(&key), h.cache.get(&key));
        assert_eq!(h.calls(), 1);
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(*c.unwrap(), "icons#1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_is_served_without_fetch() {
        let h = harness(policy());
        let key = "icons".to_string();
        h.cache.get(&key).await.unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        let read = h.cache.ensure(&key);
        assert_eq!(read.status, CacheStatus::Fresh);
        assert!(!read.is_fetching);
        assert_eq!(h.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_refreshes_once_in_background() {
        let h = harness(policy());
        let key = "icons".to_string();
        h.cache.get(&key).await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        let read = h.cache.ensure(&key);
        assert_eq!(read.status, CacheStatus::Stale);
        assert_eq!(read.data.as_deref().map(String::as_str), Some("icons#1"));
        assert!(read.is_fetching);

        // Repeated reads while the refresh runs do not start another.
        h.cache.ensure(&key);
        h.cache.mount(&key);
        tokio::task::yield_now().await;
        assert_eq!(h.calls(), 2);

        let read = h.cache.settle(&key).await;
        assert_eq!(read.status, CacheStatus::Fresh);
        assert_eq!(read.data.as_deref().map(String::as_str), Some("icons#2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_revalidation_keeps_data_until_remount() {
        let h = harness(policy().with_retries(0));
        let key = "icons".to_string();
        h.cache.get(&key).await.unwrap();

        h.fail_with(Some(network_error()));
        tokio::time::advance(Duration::from_secs(61)).await;
        h.cache.ensure(&key);
        let read = h.cache.settle(&key).await;
        assert_eq!(read.status, CacheStatus::Failed);
        assert_eq!(read.data.as_deref().map(String::as_str), Some("icons#1"));
        assert!(read.is_error());

        // No automatic retry after a failed revalidation.
        h.cache.ensure(&key);
        assert_eq!(h.calls(), 2);

        h.fail_with(None);
        h.cache.mount(&key);
        let read = h.cache.settle(&key).await;
        assert_eq!(h.calls(), 3);
        assert_eq!(read.status, CacheStatus::Fresh);
        assert!(read.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_errors_are_retried_once() {
        let h = harness(policy());
        h.fail_with(Some(network_error()));
        let err = h.cache.get(&"icons".to_string()).await.unwrap_err();
        assert!(matches!(err, StrataError::Network { .. }));
        assert_eq!(h.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_fails_at_once() {
        let h = harness(policy());
        h.fail_with(Some(StrataError::Store {
            status: 400,
            message: "bad filter".into(),
            code: None,
        }));
        let key = "icons".to_string();
        assert!(h.cache.get(&key).await.is_err());
        assert_eq!(h.calls(), 1);

        // Terminal until mounted again.
        let read = h.cache.ensure(&key);
        assert_eq!(read.status, CacheStatus::Failed);
        assert!(!read.is_fetching);
        assert_eq!(h.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_supersedes_running_fetch() {
        let h = harness(policy());
        let key = "icons".to_string();

        let first = h.cache.refetch(&key);
        tokio::time::advance(LATENCY / 2).await;
        let second = h.cache.refetch(&key);

        // The first response still reaches its own awaiters but is not stored.
        assert_eq!(*first.await.unwrap(), "icons#1");
        assert_eq!(h.cache.peek(&key).status, CacheStatus::Fetching);

        assert_eq!(*second.await.unwrap(), "icons#2");
        let read = h.cache.peek(&key);
        assert_eq!(read.data.as_deref().map(String::as_str), Some("icons#2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let h = harness(policy());
        let a = h.cache.get(&"icons".to_string()).await.unwrap();
        let b = h.cache.get(&"forms".to_string()).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(h.calls(), 2);

        let stats = h.cache.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.fresh, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_and_clear() {
        let h = harness(policy());
        let key = "icons".to_string();
        h.cache.get(&key).await.unwrap();

        h.cache.invalidate(&key);
        assert_eq!(h.cache.peek(&key).status, CacheStatus::Stale);
        h.cache.ensure(&key);
        h.cache.settle(&key).await;
        assert_eq!(h.calls(), 2);
        assert_eq!(h.cache.peek(&key).status, CacheStatus::Fresh);

        h.cache.clear();
        assert_eq!(h.cache.peek(&key).status, CacheStatus::Absent);
    }

    #[tokio::test]
    async fn test_idle_entries_are_evicted() {
        let h = harness(policy().with_gc_after(Duration::from_millis(50)));
        let key = "icons".to_string();
        h.cache.get(&key).await.unwrap();
        assert!(h.cache.peek(&key).data.is_some());

        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(h.cache.peek(&key).status, CacheStatus::Absent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_updates_are_broadcast() {
        let h = harness(policy());
        let mut updates = h.cache.subscribe();
        let key = "icons".to_string();
        h.cache.get(&key).await.unwrap();

        // Fetch start and completion.
        assert_eq!(updates.recv().await.unwrap(), key);
        assert_eq!(updates.recv().await.unwrap(), key);
    }
}
