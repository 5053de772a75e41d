// Response cache - TTL store with single-flight computation per fingerprint
// Author: kelexine (https://github.com/kelexine)

use super::clock::Clock;
use super::models::{CacheEntry, CacheError, CacheSource, CacheStats, Lookup};
use crate::config::CacheConfig;
use crate::fingerprint::Fingerprint;
use crate::metrics;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type Outcome<V, E> = Option<Result<V, E>>;

struct InFlight<V, E> {
    rx: watch::Receiver<Outcome<V, E>>,
    waiters: u32,
}

struct CacheState<V, E> {
    entries: LruCache<Fingerprint, CacheEntry<V>>,
    inflight: HashMap<Fingerprint, InFlight<V, E>>,
    stats: CacheStats,
}

/// Keyed store of generated payloads.
///
/// State lives behind one short-held mutex that is never held across an await, so
/// computations for different fingerprints run fully in parallel. Each computation runs
/// on its own task: a caller that goes away does not cancel an upstream call that is
/// already in progress, and its result is still stored for later callers.
pub struct ResponseCache<V, E> {
    name: &'static str,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<CacheState<V, E>>>,
}

/// Removes the in-flight marker if the computing task ends without reporting back.
struct FlightGuard<V, E> {
    state: Arc<Mutex<CacheState<V, E>>>,
    fingerprint: Fingerprint,
    armed: bool,
}

impl<V, E> FlightGuard<V, E> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<V, E> Drop for FlightGuard<V, E> {
    fn drop(&mut self) {
        if self.armed {
            self.state.lock().inflight.remove(&self.fingerprint);
        }
    }
}

impl<V, E> ResponseCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a cache named `name` (used in logs and metrics labels).
    pub fn new(name: &'static str, config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            clock,
            state: Arc::new(Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                inflight: HashMap::new(),
                stats: CacheStats::default(),
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Return the live entry for `fingerprint`, or run `compute` to produce one.
    ///
    /// At most one computation per fingerprint runs at a time; concurrent callers wait
    /// for it and receive the same outcome. Failures reach every current waiter but are
    /// never stored, so the next request computes afresh.
    pub async fn get_or_compute<F, Fut>(
        &self,
        fingerprint: Fingerprint,
        ttl: Duration,
        compute: F,
    ) -> Result<Lookup<V>, CacheError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let (mut rx, source, pending) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let now = self.clock.now();

            let cached = state
                .entries
                .get(&fingerprint)
                .map(|entry| entry.is_live(now).then(|| entry.payload.clone()));
            match cached {
                Some(Some(value)) => {
                    state.stats.hits += 1;
                    metrics::record_cache_operation(self.name, "hit");
                    debug!("{} cache hit: {}", self.name, fingerprint.short());
                    return Ok(Lookup {
                        value,
                        source: CacheSource::Hit,
                    });
                }
                Some(None) => {
                    state.entries.pop(&fingerprint);
                    state.stats.expirations += 1;
                    metrics::record_cache_operation(self.name, "expire");
                    debug!("{} cache entry expired: {}", self.name, fingerprint.short());
                }
                None => {}
            }

            if let Some(flight) = state.inflight.get_mut(&fingerprint) {
                flight.waiters += 1;
                state.stats.joined += 1;
                metrics::record_cache_operation(self.name, "join");
                debug!(
                    "{} joining in-flight computation: {}",
                    self.name,
                    fingerprint.short()
                );
                (flight.rx.clone(), CacheSource::Joined, None)
            } else {
                let (tx, rx) = watch::channel(None);
                state.inflight.insert(
                    fingerprint,
                    InFlight {
                        rx: rx.clone(),
                        waiters: 0,
                    },
                );
                state.stats.misses += 1;
                metrics::record_cache_operation(self.name, "miss");
                debug!("{} cache miss: {}", self.name, fingerprint.short());
                (rx, CacheSource::Computed, Some(tx))
            }
        };

        // The lock is released before any caller code runs.
        if let Some(tx) = pending {
            let guard = FlightGuard {
                state: Arc::clone(&self.state),
                fingerprint,
                armed: true,
            };
            let fut = compute();
            self.spawn_computation(fingerprint, ttl, tx, guard, fut);
        }

        let outcome = match rx.wait_for(|outcome| outcome.is_some()).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };

        match outcome {
            Some(Ok(value)) => Ok(Lookup { value, source }),
            Some(Err(e)) => Err(CacheError::Compute(e)),
            None => {
                warn!(
                    "{} computation for {} ended without a result",
                    self.name,
                    fingerprint.short()
                );
                Err(CacheError::Unavailable(format!(
                    "computation for {} ended without a result",
                    fingerprint.short()
                )))
            }
        }
    }

    fn spawn_computation<Fut>(
        &self,
        fingerprint: Fingerprint,
        ttl: Duration,
        tx: watch::Sender<Outcome<V, E>>,
        guard: FlightGuard<V, E>,
        fut: Fut,
    ) where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let clock = Arc::clone(&self.clock);
        let name = self.name;

        tokio::spawn(async move {
            // Bind the whole guard so the task owns it, not just its flag.
            let mut guard = guard;
            let outcome = fut.await;

            {
                let mut locked = state.lock();
                let state = &mut *locked;
                let waiters = state
                    .inflight
                    .remove(&fingerprint)
                    .map(|flight| flight.waiters)
                    .unwrap_or(0);
                guard.disarm();

                if let Ok(value) = &outcome {
                    let now = clock.now();
                    let entry = CacheEntry {
                        fingerprint,
                        payload: value.clone(),
                        created_at: now,
                        expires_at: now + ttl,
                        waiters,
                    };
                    if let Some((evicted, _)) = state.entries.push(fingerprint, entry) {
                        if evicted != fingerprint {
                            state.stats.capacity_evictions += 1;
                            metrics::record_cache_operation(name, "evict");
                            debug!("{} evicted least-recently-used {}", name, evicted.short());
                        }
                    }
                    metrics::update_cache_entries(name, state.entries.len());
                } else {
                    debug!("{} computation failed for {}, not cached", name, fingerprint.short());
                }
            }

            // Receivers may all be gone; the entry is stored regardless.
            let _ = tx.send(Some(outcome));
        });
    }

    /// Non-counting lookup of a live entry.
    pub fn peek(&self, fingerprint: &Fingerprint) -> Option<V> {
        let state = self.state.lock();
        let now = self.clock.now();
        state
            .entries
            .peek(fingerprint)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.payload.clone())
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let mut state = self.state.lock();
        let now = self.clock.now();
        let expired: Vec<Fingerprint> = state
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(fp, _)| *fp)
            .collect();

        for fp in &expired {
            state.entries.pop(fp);
        }
        state.stats.expirations += expired.len() as u64;
        metrics::update_cache_entries(self.name, state.entries.len());

        if !expired.is_empty() {
            debug!("{} sweep removed {} expired entries", self.name, expired.len());
        }
        expired.len()
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `interval` until the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(cache) => {
                        cache.sweep_expired();
                    }
                    None => break,
                }
            }
        })
    }

    /// Remove one entry. Returns whether it existed.
    pub fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        let mut state = self.state.lock();
        let removed = state.entries.pop(fingerprint).is_some();
        metrics::update_cache_entries(self.name, state.entries.len());
        removed
    }

    /// Clear all cached entries. In-flight computations are unaffected.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        metrics::update_cache_entries(self.name, 0);
        debug!("{} cache cleared", self.name);
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entry_count: state.entries.len(),
            in_flight: state.inflight.len(),
            ..state.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::{ManualClock, SystemClock};
    use crate::fingerprint::fingerprint_voice;

    fn cache(max_entries: usize, clock: Arc<dyn Clock>) -> ResponseCache<String, String> {
        let config = CacheConfig {
            max_entries,
            ..CacheConfig::default()
        };
        ResponseCache::new("test", &config, clock)
    }

    fn key(n: u32) -> Fingerprint {
        fingerprint_voice(&format!("script number {}", n), "alloy")
    }

    #[tokio::test]
    async fn test_hit_after_compute() {
        let cache = cache(10, Arc::new(SystemClock));
        let ttl = Duration::from_secs(60);

        let first = cache
            .get_or_compute(key(1), ttl, || async { Ok("copy".to_string()) })
            .await
            .unwrap();
        assert_eq!(first.source, CacheSource::Computed);
        assert!(!first.is_cache_hit());

        let second = cache
            .get_or_compute(key(1), ttl, || async { panic!("must not recompute") })
            .await
            .unwrap();
        assert_eq!(second.source, CacheSource::Hit);
        assert_eq!(second.value, "copy");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache = cache(10, Arc::new(SystemClock));
        let ttl = Duration::from_secs(60);

        let err = cache
            .get_or_compute(key(1), ttl, || async { Err("upstream down".to_string()) })
            .await
            .unwrap_err();
        assert_eq!(err, CacheError::Compute("upstream down".to_string()));
        assert!(cache.peek(&key(1)).is_none());

        let ok = cache
            .get_or_compute(key(1), ttl, || async { Ok("recovered".to_string()) })
            .await
            .unwrap();
        assert_eq!(ok.source, CacheSource::Computed);
    }

    #[tokio::test]
    async fn test_lru_eviction_at_capacity() {
        let cache = cache(2, Arc::new(SystemClock));
        let ttl = Duration::from_secs(60);

        for n in 1..=2 {
            cache
                .get_or_compute(key(n), ttl, move || async move { Ok(format!("v{}", n)) })
                .await
                .unwrap();
        }
        // Touch key 1 so key 2 becomes least recently used.
        cache
            .get_or_compute(key(1), ttl, || async { Ok(String::new()) })
            .await
            .unwrap();
        cache
            .get_or_compute(key(3), ttl, || async { Ok("v3".to_string()) })
            .await
            .unwrap();

        assert!(cache.peek(&key(1)).is_some());
        assert!(cache.peek(&key(2)).is_none());
        assert!(cache.peek(&key(3)).is_some());
        assert_eq!(cache.stats().capacity_evictions, 1);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_entries() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(10, clock.clone());

        cache
            .get_or_compute(key(1), Duration::from_secs(10), || async { Ok("a".into()) })
            .await
            .unwrap();
        cache
            .get_or_compute(key(2), Duration::from_secs(100), || async { Ok("b".into()) })
            .await
            .unwrap();

        clock.advance(Duration::from_secs(50));
        assert_eq!(cache.sweep_expired(), 1);

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.eviction_count(), 1);
    }

    #[tokio::test]
    async fn test_panicking_computation_reports_unavailable() {
        let cache = cache(10, Arc::new(SystemClock));
        let result = cache
            .get_or_compute(key(1), Duration::from_secs(60), || async {
                if true {
                    panic!("boom");
                }
                Ok(String::new())
            })
            .await;
        assert!(matches!(result, Err(CacheError::Unavailable(_))));
        assert_eq!(cache.stats().in_flight, 0);
    }

    #[tokio::test]
    async fn test_in_flight_marker_held_until_compute_finishes() {
        let cache = Arc::new(cache(10, Arc::new(SystemClock)));
        let ttl = Duration::from_secs(60);
        let (release, gate) = tokio::sync::oneshot::channel::<()>();

        let leader = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_compute(key(1), ttl, move || async move {
                        let _ = gate.await;
                        Ok("shared".to_string())
                    })
                    .await
            })
        };
        while cache.stats().misses == 0 {
            tokio::task::yield_now().await;
        }
        tokio::task::yield_now().await;
        assert_eq!(cache.stats().in_flight, 1);

        let follower = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_compute(key(1), ttl, || async { panic!("must join the leader") })
                    .await
            })
        };
        while cache.stats().joined == 0 {
            tokio::task::yield_now().await;
        }
        release.send(()).unwrap();

        assert_eq!(leader.await.unwrap().unwrap().source, CacheSource::Computed);
        let joined = follower.await.unwrap().unwrap();
        assert_eq!(joined.source, CacheSource::Joined);
        assert_eq!(joined.value, "shared");

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_on_interval() {
        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(cache(10, clock.clone()));

        cache
            .get_or_compute(key(1), Duration::from_secs(10), || async { Ok("a".into()) })
            .await
            .unwrap();
        cache
            .get_or_compute(key(2), Duration::from_secs(600), || async { Ok("b".into()) })
            .await
            .unwrap();

        let sweeper = cache.spawn_sweeper(Duration::from_secs(30));
        clock.advance(Duration::from_secs(20));
        assert_eq!(cache.stats().entry_count, 2);

        tokio::time::sleep(Duration::from_secs(31)).await;
        let stats = cache.stats();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.expirations, 1);
        assert!(cache.peek(&key(2)).is_some());

        // The sweeper exits once the cache is gone.
        drop(cache);
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(sweeper.is_finished());
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = cache(10, Arc::new(SystemClock));
        let ttl = Duration::from_secs(60);
        for n in 1..=3 {
            cache
                .get_or_compute(key(n), ttl, || async { Ok("x".to_string()) })
                .await
                .unwrap();
        }
        assert!(cache.invalidate(&key(1)));
        assert!(!cache.invalidate(&key(1)));
        assert_eq!(cache.stats().entry_count, 2);
        cache.clear();
        assert_eq!(cache.stats().entry_count, 0);
    }
}
