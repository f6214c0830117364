//! Process-lifetime counters for upstream calls and cache effectiveness.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Upstream call, cache hit/miss, and latency counters. Never persisted.
#[derive(Debug, Default)]
pub struct CostTracker {
    upstream_calls: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    upstream_latency_ms: AtomicU64,
}

/// Point-in-time copy of a [`CostTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostSummary {
    /// Upstream fetches issued
    pub upstream_calls: u64,
    /// Queries served from cache
    pub cache_hits: u64,
    /// Queries that missed the cache
    pub cache_misses: u64,
    /// Total time spent waiting on the upstream
    pub upstream_latency_ms: u64,
    /// Hits as a percentage of lookups (0-100)
    pub hit_rate: f64,
    /// Mean upstream latency
    pub mean_latency_ms: f64,
}

impl CostTracker {
    /// Fresh counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a cache hit.
    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a cache miss.
    pub fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts an upstream call and its latency, successful or not.
    pub fn record_upstream(&self, elapsed: Duration) {
        self.upstream_calls.fetch_add(1, Ordering::Relaxed);
        self.upstream_latency_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    /// Current values with derived rates.
    pub fn snapshot(&self) -> CostSummary {
        let upstream_calls = self.upstream_calls.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let upstream_latency_ms = self.upstream_latency_ms.load(Ordering::Relaxed);

        let lookups = cache_hits + cache_misses;
        CostSummary {
            upstream_calls,
            cache_hits,
            cache_misses,
            upstream_latency_ms,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                cache_hits as f64 / lookups as f64 * 100.0
            },
            mean_latency_ms: if upstream_calls == 0 {
                0.0
            } else {
                upstream_latency_ms as f64 / upstream_calls as f64
            },
        }
    }
}
