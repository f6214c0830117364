//! Geographic context cache and spatial relevance engine.
//!
//! `geocontext` answers one question for a coordinate: what power, land-use,
//! water, and transport infrastructure surrounds it, and what does that imply
//! for flood risk, site access, and land availability? Raw map elements are
//! fetched from an Overpass-style upstream, classified and scored, trimmed to a
//! fixed budget, analyzed against optional facilities, and cached under a byte
//! quota with lossy fallback tiers.
//!
//! # Features
//!
//! - **Single entry point** - [`Engine::query`] returns a [`QueryOutcome`], never a panic
//! - **Typed classification** - Tag predicates map elements to [`FeatureCategory`] and [`Importance`]
//! - **Bounded results** - Per-category and global caps via [`RetentionLimits`]
//! - **Tiered cache** - Full, compressed, and ultra-compressed [`CachedPayload`] variants
//! - **Quota aware** - Oversized or rejected writes degrade to the ultra tier after evicting the oldest entries
//! - **Injectable state** - Cache, store, clock, and fetcher are all passed in explicitly
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use geocontext::{
//!     ContextCache, Engine, EngineConfig, FetchRequest, Fetcher, Location, MemoryStore,
//!     RawElement,
//! };
//!
//! struct Offline;
//!
//! impl Fetcher for Offline {
//!     fn fetch(&self, _request: &FetchRequest) -> geocontext::Result<Vec<RawElement>> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! let config = EngineConfig::default();
//! let cache = ContextCache::init(config.cache.clone(), Arc::new(MemoryStore::new()));
//! let engine = Engine::new(config, cache, Offline);
//!
//! let center = Location::new(31.9315, -97.347);
//! let first = engine.query(center, 5.0, None, &[]);
//! assert!(!first.success().unwrap().cached);
//!
//! let second = engine.query(center, 5.0, None, &[]);
//! assert!(second.success().unwrap().cached);
//! ```
//!
//! # Pipeline
//!
//! 1. Validate the center coordinate
//! 2. Sweep expired entries and look up the cache key
//! 3. On a miss, fetch raw elements (bounded by the upstream timeout)
//! 4. Classify elements into features ([`classify`])
//! 5. Apply retention budgets ([`retention`])
//! 6. Build sub-records, facility proximity, and risk ([`analysis`])
//! 7. Persist the compressed tier, or the ultra tier if needed ([`cache`])
//!
//! # Cache Keys
//!
//! Keys combine the center rounded to four decimals (~11 m), a location
//! identifier (or `default`), and a histogram of facility categories (or
//! `no_serp`). Near-duplicate queries deliberately share an entry.
//!
//! # Tiers
//!
//! | Tier | Features | Sub-records | Display count |
//! |---|---|---|---|
//! | Full | all retained | all | exact |
//! | Compressed | trimmed attributes | capped 20/50/30/40 | at most 200 |
//! | Ultra | none | stripped, capped 10/20/15 | at most 100 |
//!
//! A fresh query always returns [`CachedPayload::Full`]. A cache hit returns
//! whatever tier was stored, and smaller tiers are never expanded, so callers
//! branch on [`CachedPayload::tier`].
//!
//! # Modules
//!
//! - [`types`] - Core data structures
//! - [`geo`] - Haversine and vertex-based polyline distance
//! - [`classify`] - Raw elements and classification rules
//! - [`analysis`] - Facility proximity and risk derivation
//! - [`retention`] - Feature budgets
//! - [`compress`] - Cache tiers
//! - [`store`] - Key-value backends
//! - [`cache`] - TTL cache
//! - [`fetch`] - Upstream contract and Overpass client
//! - [`engine`] - Query orchestration

#![warn(missing_docs)]

pub mod analysis;
pub mod cache;
pub mod classify;
pub mod compress;
pub mod config;
pub mod cost;
mod error;
pub mod engine;
pub mod fetch;
pub mod geo;
pub mod retention;
pub mod store;
pub mod types;

pub use cache::{cache_key, CacheStats, Clock, ContextCache, ManualClock, SystemClock};
pub use classify::{RawElement, Tags};
pub use compress::{CachedPayload, Tier, UltraResult};
pub use config::EngineConfig;
pub use cost::{CostSummary, CostTracker};
pub use engine::{Engine, QueryFailure, QueryOutcome, QuerySuccess};
pub use error::{Error, Result};
pub use fetch::{FetchRequest, Fetcher};
pub use retention::RetentionLimits;
pub use store::{FileStore, KvStore, MemoryStore};
pub use types::{
    ContextResult, Facility, FeatureCategory, GeographicFeature, Geometry, Importance, Location,
    RiskAssessment, RiskLevel, SpatialAnalysis,
};

#[cfg(feature = "fetch")]
pub use fetch::OverpassFetcher;
