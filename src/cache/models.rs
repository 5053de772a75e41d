//! Cache entries, lookup results and statistics.

// Author: kelexine (https://github.com/kelexine)

use crate::fingerprint::Fingerprint;
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;

/// A stored result. Only successful computations ever become entries.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub fingerprint: Fingerprint,
    pub payload: V,
    pub created_at: Instant,
    pub expires_at: Instant,
    /// Callers that joined the computation besides the one that started it.
    pub waiters: u32,
}

impl<V> CacheEntry<V> {
    /// Visible strictly before `expires_at`.
    pub fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// How a lookup was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSource {
    /// Served from a stored entry.
    Hit,
    /// This caller ran the computation.
    Computed,
    /// This caller waited on a computation another caller started.
    Joined,
}

#[derive(Debug, Clone)]
pub struct Lookup<V> {
    pub value: V,
    pub source: CacheSource,
}

impl<V> Lookup<V> {
    /// True when no upstream work was started on behalf of this caller.
    pub fn is_cache_hit(&self) -> bool {
        self.source != CacheSource::Computed
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CacheError<E> {
    /// The computation ran and failed; the failure was not cached.
    #[error("computation failed")]
    Compute(E),

    /// The computation ended without producing a result (it panicked or was aborted).
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Statistics for cache operations.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CacheStats {
    /// Lookups served from a live entry.
    pub hits: u64,
    /// Lookups that started a computation.
    pub misses: u64,
    /// Lookups that waited on an in-flight computation.
    pub joined: u64,
    /// Entries dropped to respect the capacity cap.
    pub capacity_evictions: u64,
    /// Entries dropped because their TTL elapsed.
    pub expirations: u64,
    /// Entries currently stored (expired ones awaiting the sweep included).
    pub entry_count: usize,
    /// Computations currently running.
    pub in_flight: usize,
}

impl CacheStats {
    /// Share of lookups that did not start upstream work.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.joined;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    /// All removals, capacity and TTL combined.
    pub fn eviction_count(&self) -> u64 {
        self.capacity_evictions + self.expirations
    }
}
