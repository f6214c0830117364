//! Engine configuration, loadable from TOML.
//!
//! Every section and field has a default, so an empty file is valid:
//!
//! ```toml
//! [cache]
//! namespace = "geo_context"
//! ttl_hours = 24
//!
//! [upstream]
//! timeout_secs = 35
//! ```

use crate::error::{Error, Result};
use crate::retention::RetentionLimits;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Longest accepted `cache.ttl_hours`, one year.
pub const MAX_TTL_HOURS: u64 = 24 * 365;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cache behaviour
    pub cache: CacheConfig,
    /// Upstream fetcher
    pub upstream: UpstreamConfig,
    /// Retention budgets
    pub limits: RetentionLimits,
}

/// Cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Prefix for every persisted key
    pub namespace: String,
    /// Entry lifetime
    pub ttl_hours: u64,
    /// Serialized compressed entries above this size are stored ultra-compressed
    pub max_entry_bytes: usize,
    /// Entries evicted when the backend runs out of room
    pub eviction_batch: usize,
    /// Quota for stores the CLI opens
    pub capacity_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: "geo_context".to_string(),
            ttl_hours: 24,
            max_entry_bytes: 1024 * 1024,
            eviction_batch: 3,
            capacity_bytes: 5 * 1024 * 1024,
        }
    }
}

impl CacheConfig {
    /// Entry lifetime as a duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours.saturating_mul(3600))
    }
}

/// Upstream fetcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Overpass interpreter URL
    pub endpoint: String,
    /// Request bound, 30 to 40 seconds
    pub timeout_secs: u64,
    /// Radius used when the caller gives none
    pub default_radius_km: f64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://overpass-api.de/api/interpreter".to_string(),
            timeout_secs: 35,
            default_radius_km: 5.0,
        }
    }
}

impl UpstreamConfig {
    /// Request bound as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.cache.namespace.is_empty() {
            return Err(Error::config("cache.namespace must not be empty"));
        }
        if !(1..=MAX_TTL_HOURS).contains(&self.cache.ttl_hours) {
            return Err(Error::config(format!(
                "cache.ttl_hours must be between 1 and {MAX_TTL_HOURS}, got {}",
                self.cache.ttl_hours
            )));
        }
        if self.cache.max_entry_bytes == 0 {
            return Err(Error::config("cache.max_entry_bytes must be positive"));
        }
        if !(30..=40).contains(&self.upstream.timeout_secs) {
            return Err(Error::config(format!(
                "upstream.timeout_secs must be between 30 and 40, got {}",
                self.upstream.timeout_secs
            )));
        }
        if !(self.upstream.default_radius_km > 0.0) {
            return Err(Error::config("upstream.default_radius_km must be positive"));
        }
        let limits = &self.limits;
        if [
            limits.transmission_corridors,
            limits.land_use_zones,
            limits.water_features,
            limits.transportation_corridors,
            limits.total,
        ]
        .contains(&0)
        {
            return Err(Error::config("retention limits must be positive"));
        }
        Ok(())
    }
}
