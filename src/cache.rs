//! TTL cache of context results over a [`KvStore`].
//!
//! Entries are JSON records `{data, timestamp, tier, sourceFingerprint}`
//! stored under `"{namespace}:{key}"`. Writes persist the compressed tier,
//! falling back to the ultra tier when the compressed record is too large or
//! the backend runs out of room. No storage failure ever escapes this module:
//! the worst outcome is a miss on the next read.

use crate::compress::{CachedPayload, Tier};
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::store::KvStore;
use crate::types::{ContextResult, Facility, Location};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Source of the current time in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Clock starting at `now_millis`.
    pub fn new(now_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(now_millis),
        }
    }

    /// Moves the clock to `now_millis`.
    pub fn set(&self, now_millis: i64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }

    /// Moves the clock forward.
    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A persisted cache record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Tier tag and tier-shaped data
    #[serde(flatten)]
    pub payload: CachedPayload,
    /// Creation time in epoch milliseconds
    pub timestamp: i64,
    /// Query that produced the entry
    pub source_fingerprint: String,
}

#[derive(Deserialize)]
struct EntryHeader {
    timestamp: i64,
}

/// Diagnostic record for one stored entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryDiagnostic {
    /// Key without namespace
    pub key: String,
    /// Age in milliseconds, `None` for corrupt entries
    pub age_ms: Option<i64>,
    /// Readable and younger than the TTL
    pub valid: bool,
    /// Stored tier, `None` for corrupt entries
    pub tier: Option<Tier>,
}

/// Summary returned by [`ContextCache::stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Entries in this namespace
    pub entry_count: usize,
    /// Configured TTL
    pub ttl_hours: u64,
    /// One record per entry, sorted by key
    pub entries: Vec<EntryDiagnostic>,
}

/// Derives the cache key for a query.
///
/// Coordinates are rounded to four decimals; facilities contribute a sorted
/// histogram of their category labels, so facility order does not matter and
/// queries with the same rounded center, location, and histogram share a key.
pub fn cache_key(center: &Location, location_id: Option<&str>, facilities: &[Facility]) -> String {
    format!(
        "{:.4}_{:.4}_{}_{}",
        round4(center.latitude),
        round4(center.longitude),
        location_id.filter(|id| !id.is_empty()).unwrap_or("default"),
        facility_signature(facilities)
    )
}

fn round4(value: f64) -> f64 {
    // Adding 0.0 turns -0.0 into 0.0 so both format the same.
    (value * 10_000.0).round() / 10_000.0 + 0.0
}

/// `"category:count|..."` over the facility labels, or `"no_serp"` when empty.
pub fn facility_signature(facilities: &[Facility]) -> String {
    if facilities.is_empty() {
        return "no_serp".to_string();
    }
    let mut histogram: BTreeMap<&str, usize> = BTreeMap::new();
    for facility in facilities {
        *histogram.entry(facility.category.as_str()).or_default() += 1;
    }
    histogram
        .iter()
        .map(|(category, count)| format!("{category}:{count}"))
        .collect::<Vec<_>>()
        .join("|")
}

/// Entries stamped in the future are treated as stale.
fn is_live(age_ms: i64, ttl_ms: i64) -> bool {
    (0..ttl_ms).contains(&age_ms)
}

/// Namespaced, TTL-bounded cache of context results.
pub struct ContextCache {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl ContextCache {
    /// Creates a cache handle over `store` using the wall clock.
    pub fn init(config: CacheConfig, store: Arc<dyn KvStore>) -> Self {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    /// Creates a cache handle with an explicit clock.
    pub fn with_clock(config: CacheConfig, store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        info!(
            namespace = %config.namespace,
            ttl_hours = config.ttl_hours,
            max_entry_bytes = config.max_entry_bytes,
            "context cache initialized"
        );
        Self {
            store,
            clock,
            config,
        }
    }

    /// Sweeps expired entries and releases the handle.
    pub fn teardown(self) {
        let removed = self.sweep();
        info!(namespace = %self.config.namespace, removed, "context cache torn down");
    }

    /// The active configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn ttl_millis(&self) -> i64 {
        i64::try_from(self.config.ttl().as_millis()).unwrap_or(i64::MAX)
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.config.namespace, key)
    }

    fn prefix(&self) -> String {
        format!("{}:", self.config.namespace)
    }

    fn namespace_keys(&self) -> Vec<String> {
        let prefix = self.prefix();
        match self.store.keys() {
            Ok(keys) => keys.into_iter().filter(|k| k.starts_with(&prefix)).collect(),
            Err(err) => {
                warn!(error = %err, "failed to list cache keys");
                Vec::new()
            }
        }
    }

    fn remove_quietly(&self, full_key: &str) {
        if let Err(err) = self.store.remove(full_key) {
            warn!(key = full_key, error = %err, "failed to remove cache entry");
        }
    }

    fn decode(full_key: &str, raw: &str) -> Result<CacheEntry> {
        serde_json::from_str(raw).map_err(|e| Error::CorruptEntry {
            key: full_key.to_string(),
            message: e.to_string(),
        })
    }

    /// Reads a live entry. Expired and corrupt entries are deleted and read as a miss.
    pub fn get(&self, key: &str) -> Option<CachedPayload> {
        let full_key = self.namespaced(key);
        let raw = match self.store.get(&full_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "cache miss");
                return None;
            }
            Err(err) => {
                warn!(key, error = %err, "cache read failed");
                return None;
            }
        };

        let entry = match Self::decode(&full_key, &raw) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "removing corrupt cache entry");
                self.remove_quietly(&full_key);
                return None;
            }
        };

        let age = self.clock.now_millis().saturating_sub(entry.timestamp);
        if !is_live(age, self.ttl_millis()) {
            debug!(key, age_ms = age, "cache entry expired");
            self.remove_quietly(&full_key);
            return None;
        }

        debug!(key, tier = %entry.payload.tier(), age_ms = age, "cache hit");
        Some(entry.payload)
    }

    fn encode(&self, result: &ContextResult, tier: Tier, fingerprint: &str) -> Result<String> {
        let entry = CacheEntry {
            payload: CachedPayload::project(result, tier),
            timestamp: self.clock.now_millis(),
            source_fingerprint: fingerprint.to_string(),
        };
        serde_json::to_string(&entry).map_err(|e| Error::storage(e.to_string()))
    }

    /// Persists `result`, returning the tier actually written, or `None` if the
    /// write was dropped.
    pub fn put(&self, key: &str, result: &ContextResult, fingerprint: &str) -> Option<Tier> {
        let full_key = self.namespaced(key);

        let first = self
            .encode(result, Tier::Compressed, fingerprint)
            .and_then(|json| {
                if json.len() > self.config.max_entry_bytes {
                    info!(
                        key,
                        bytes = json.len(),
                        "compressed entry too large, storing ultra tier"
                    );
                    Ok((Tier::Ultra, self.encode(result, Tier::Ultra, fingerprint)?))
                } else {
                    Ok((Tier::Compressed, json))
                }
            });
        let (tier, json) = match first {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(key, error = %err, "failed to serialize cache entry");
                return None;
            }
        };

        match self.store.set(&full_key, &json) {
            Ok(()) => {
                debug!(key, %tier, bytes = json.len(), "cache entry written");
                return Some(tier);
            }
            Err(err) if err.is_quota_exceeded() => {
                warn!(key, error = %err, "storage quota exceeded, evicting oldest entries");
            }
            Err(err) => {
                warn!(key, error = %err, "cache write failed");
                return None;
            }
        }

        self.evict_oldest(self.config.eviction_batch);

        let retry = self
            .encode(result, Tier::Ultra, fingerprint)
            .and_then(|json| self.store.set(&full_key, &json));
        match retry {
            Ok(()) => {
                info!(key, "cache entry written as ultra tier after eviction");
                Some(Tier::Ultra)
            }
            Err(err) => {
                warn!(key, error = %err, "cache write dropped after eviction retry");
                None
            }
        }
    }

    /// Deletes the `count` oldest entries in the namespace. Corrupt entries
    /// count as oldest.
    pub fn evict_oldest(&self, count: usize) -> usize {
        let mut aged: Vec<(i64, String)> = self
            .namespace_keys()
            .into_iter()
            .map(|key| {
                let timestamp = self
                    .store
                    .get(&key)
                    .ok()
                    .flatten()
                    .and_then(|raw| serde_json::from_str::<EntryHeader>(&raw).ok())
                    .map_or(0, |header| header.timestamp);
                (timestamp, key)
            })
            .collect();
        aged.sort();

        let mut evicted = 0;
        for (_, key) in aged.into_iter().take(count) {
            self.remove_quietly(&key);
            evicted += 1;
        }
        debug!(evicted, "evicted oldest cache entries");
        evicted
    }

    /// Deletes expired and corrupt entries, returning how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let ttl = self.ttl_millis();
        let mut removed = 0;

        for key in self.namespace_keys() {
            let stale = match self.store.get(&key) {
                Ok(Some(raw)) => match serde_json::from_str::<EntryHeader>(&raw) {
                    Ok(header) => !is_live(now.saturating_sub(header.timestamp), ttl),
                    Err(_) => true,
                },
                Ok(None) => false,
                Err(err) => {
                    warn!(key = %key, error = %err, "cache read failed during sweep");
                    false
                }
            };
            if stale {
                self.remove_quietly(&key);
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed, "swept stale cache entries");
        }
        removed
    }

    /// Deletes every entry in the namespace.
    pub fn clear(&self) -> usize {
        let keys = self.namespace_keys();
        for key in &keys {
            self.remove_quietly(key);
        }
        info!(namespace = %self.config.namespace, removed = keys.len(), "cache cleared");
        keys.len()
    }

    /// Entry count, TTL, and per-entry diagnostics.
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now_millis();
        let ttl = self.ttl_millis();
        let prefix = self.prefix();

        let mut entries: Vec<EntryDiagnostic> = self
            .namespace_keys()
            .into_iter()
            .filter_map(|full_key| {
                let raw = self.store.get(&full_key).ok().flatten()?;
                let key = full_key.strip_prefix(&prefix).unwrap_or(&full_key).to_string();
                Some(match Self::decode(&full_key, &raw) {
                    Ok(entry) => {
                        let age = now.saturating_sub(entry.timestamp);
                        EntryDiagnostic {
                            key,
                            age_ms: Some(age),
                            valid: is_live(age, ttl),
                            tier: Some(entry.payload.tier()),
                        }
                    }
                    Err(_) => EntryDiagnostic {
                        key,
                        age_ms: None,
                        valid: false,
                        tier: None,
                    },
                })
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        CacheStats {
            entry_count: entries.len(),
            ttl_hours: self.config.ttl_hours,
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{RiskAssessment, SpatialAnalysis};

    const HOUR: i64 = 3600 * 1000;

    fn result() -> ContextResult {
        ContextResult {
            features: Vec::new(),
            spatial_analysis: SpatialAnalysis::default(),
            risk_assessment: RiskAssessment::default(),
            feature_count: 0,
        }
    }

    fn cache_with(store: Arc<dyn KvStore>, clock: Arc<ManualClock>) -> ContextCache {
        ContextCache::with_clock(CacheConfig::default(), store, clock)
    }

    #[test]
    fn key_rounds_and_defaults() {
        let key = cache_key(&Location::new(31.93154, -97.34696), None, &[]);
        assert_eq!(key, "31.9315_-97.3470_default_no_serp");

        let key = cache_key(&Location::new(-0.00001, 0.0), Some("waco"), &[]);
        assert_eq!(key, "0.0000_0.0000_waco_no_serp");
    }

    #[test]
    fn key_ignores_facility_order() {
        let at = Location::new(31.0, -97.0);
        let a = Facility::new("A", "data_center", at);
        let b = Facility::new("B", "substation", at);
        let c = Facility::new("C", "data_center", at);

        let one = cache_key(&at, None, &[a.clone(), b.clone(), c.clone()]);
        let two = cache_key(&at, None, &[c, b, a]);
        assert_eq!(one, two);
        assert!(one.ends_with("data_center:2|substation:1"));
    }

    #[test]
    fn expiry_is_exact_at_ttl() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = cache_with(Arc::new(MemoryStore::new()), clock.clone());

        cache.put("k", &result(), "fp");
        clock.set(1_000 + 24 * HOUR - 1);
        assert!(cache.get("k").is_some());

        clock.set(1_000 + 24 * HOUR);
        assert!(cache.get("k").is_none());
        assert_eq!(cache.stats().entry_count, 0);
    }

    #[test]
    fn corrupt_entry_reads_as_miss_and_is_removed() {
        let store = Arc::new(MemoryStore::new());
        store.set("geo_context:bad", "{not json").unwrap();
        let cache = cache_with(store.clone(), Arc::new(ManualClock::new(0)));

        assert!(cache.get("bad").is_none());
        assert_eq!(store.get("geo_context:bad").unwrap(), None);
    }

    #[test]
    fn out_of_range_timestamps_read_as_miss() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(5 * HOUR));
        let cache = cache_with(store.clone(), clock);

        for (key, timestamp) in [("ancient", i64::MIN), ("future", i64::MAX), ("ahead", 6 * HOUR)] {
            cache.put(key, &result(), "fp");
            let full_key = format!("geo_context:{key}");
            let raw = store.get(&full_key).unwrap().unwrap();
            let mut entry: serde_json::Value = serde_json::from_str(&raw).unwrap();
            entry["timestamp"] = timestamp.into();
            store.set(&full_key, &entry.to_string()).unwrap();
        }

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 3);
        assert!(stats.entries.iter().all(|e| !e.valid));

        assert!(cache.get("ancient").is_none());
        assert_eq!(cache.sweep(), 2);
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn huge_ttl_does_not_overflow() {
        let config = CacheConfig {
            ttl_hours: u64::MAX,
            ..CacheConfig::default()
        };
        let clock = Arc::new(ManualClock::new(0));
        let cache = ContextCache::with_clock(config, Arc::new(MemoryStore::new()), clock.clone());

        cache.put("k", &result(), "fp");
        clock.set(i64::MAX - 1);
        assert!(cache.get("k").is_some());
        assert_eq!(cache.sweep(), 0);
    }

    #[test]
    fn sweep_removes_only_stale_and_corrupt_entries() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_with(store.clone(), clock.clone());

        cache.put("old", &result(), "fp");
        clock.advance(23 * HOUR);
        cache.put("new", &result(), "fp");
        store.set("geo_context:broken", "###").unwrap();
        store.set("other:old", "###").unwrap();
        clock.advance(2 * HOUR);

        assert_eq!(cache.sweep(), 2);
        let stats = cache.stats();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.entries[0].key, "new");
        assert!(store.get("other:old").unwrap().is_some());
    }

    #[test]
    fn eviction_removes_globally_oldest() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_with(store, clock.clone());

        for key in ["a", "b", "c", "d", "e"] {
            cache.put(key, &result(), "fp");
            clock.advance(1_000);
        }

        assert_eq!(cache.evict_oldest(3), 3);
        let keys: Vec<_> = cache.stats().entries.into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["d", "e"]);
    }

    #[test]
    fn oversized_entries_fall_back_to_ultra() {
        let config = CacheConfig {
            max_entry_bytes: 10,
            ..CacheConfig::default()
        };
        let cache = ContextCache::with_clock(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(0)),
        );

        assert_eq!(cache.put("k", &result(), "fp"), Some(Tier::Ultra));
        assert_eq!(cache.get("k").map(|p| p.tier()), Some(Tier::Ultra));
    }

    #[test]
    fn clear_only_touches_namespace() {
        let store = Arc::new(MemoryStore::new());
        store.set("elsewhere:x", "1").unwrap();
        let cache = cache_with(store.clone(), Arc::new(ManualClock::new(0)));
        cache.put("a", &result(), "fp");
        cache.put("b", &result(), "fp");

        assert_eq!(cache.clear(), 2);
        assert_eq!(store.keys().unwrap(), vec!["elsewhere:x".to_string()]);
    }

    #[test]
    fn entries_use_the_documented_layout() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store.clone(), Arc::new(ManualClock::new(42)));
        cache.put("k", &result(), "31.9315,-97.3470@5km");

        let raw = store.get("geo_context:k").unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["tier"], "compressed");
        assert_eq!(value["timestamp"], 42);
        assert_eq!(value["sourceFingerprint"], "31.9315,-97.3470@5km");
        assert!(value["data"]["features"].is_array());
    }
}
