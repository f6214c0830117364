//! The query pipeline: cache lookup, fetch, classify, retain, analyze, persist.

use crate::analysis::{analyze, assess_risk};
use crate::cache::{cache_key, ContextCache};
use crate::classify::classify;
use crate::compress::CachedPayload;
use crate::config::EngineConfig;
use crate::cost::{CostSummary, CostTracker};
use crate::error::{Error, Result};
use crate::fetch::{FetchRequest, Fetcher};
use crate::types::{ContextResult, Facility, FeatureCategory, Location};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// Successful query payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySuccess {
    /// Full result on a fresh computation, the stored tier on a hit
    pub result: CachedPayload,
    /// Whether the result came from the cache
    pub cached: bool,
}

/// Structured query failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryFailure {
    /// The upstream timed out; callers can show a fallback state
    pub is_timeout: bool,
    /// Machine-readable error kind
    pub kind: &'static str,
    /// Human-readable detail
    pub message: String,
}

impl From<Error> for QueryFailure {
    fn from(err: Error) -> Self {
        Self {
            is_timeout: err.is_timeout(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of [`Engine::query`]. Failures are values, never panics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum QueryOutcome {
    /// A result was produced or found
    Success(QuerySuccess),
    /// Input was invalid or the upstream failed
    Failure(QueryFailure),
}

impl QueryOutcome {
    /// The success payload, if any.
    pub fn success(&self) -> Option<&QuerySuccess> {
        match self {
            QueryOutcome::Success(success) => Some(success),
            QueryOutcome::Failure(_) => None,
        }
    }

    /// The failure, if any.
    pub fn failure(&self) -> Option<&QueryFailure> {
        match self {
            QueryOutcome::Success(_) => None,
            QueryOutcome::Failure(failure) => Some(failure),
        }
    }
}

/// Orchestrates one query at a time against an injected cache and fetcher.
pub struct Engine<F> {
    cache: ContextCache,
    fetcher: F,
    costs: CostTracker,
    config: EngineConfig,
}

impl<F: Fetcher> Engine<F> {
    /// Builds an engine from its collaborators.
    pub fn new(config: EngineConfig, cache: ContextCache, fetcher: F) -> Self {
        Self {
            cache,
            fetcher,
            costs: CostTracker::new(),
            config,
        }
    }

    /// The cache handle.
    pub fn cache(&self) -> &ContextCache {
        &self.cache
    }

    /// Current cost counters.
    pub fn costs(&self) -> CostSummary {
        self.costs.snapshot()
    }

    /// Tears down the cache and returns the final counters.
    pub fn shutdown(self) -> CostSummary {
        let summary = self.costs.snapshot();
        self.cache.teardown();
        summary
    }

    /// Runs the pipeline for `center`.
    ///
    /// A non-positive or non-finite `radius_km` falls back to the configured
    /// default radius.
    pub fn query(
        &self,
        center: Location,
        radius_km: f64,
        location_id: Option<&str>,
        facilities: &[Facility],
    ) -> QueryOutcome {
        match self.run(center, radius_km, location_id, facilities) {
            Ok(success) => QueryOutcome::Success(success),
            Err(err) => {
                warn!(error = %err, timeout = err.is_timeout(), "context query failed");
                QueryOutcome::Failure(err.into())
            }
        }
    }

    fn run(
        &self,
        center: Location,
        radius_km: f64,
        location_id: Option<&str>,
        facilities: &[Facility],
    ) -> Result<QuerySuccess> {
        if !center.is_valid() {
            return Err(Error::InvalidCoordinate {
                latitude: center.latitude,
                longitude: center.longitude,
            });
        }
        let radius_km = if radius_km.is_finite() && radius_km > 0.0 {
            radius_km
        } else {
            self.config.upstream.default_radius_km
        };

        self.cache.sweep();

        let key = cache_key(&center, location_id, facilities);
        if let Some(payload) = self.cache.get(&key) {
            self.costs.record_hit();
            info!(key = %key, tier = %payload.tier(), "serving cached context");
            return Ok(QuerySuccess {
                result: payload,
                cached: true,
            });
        }
        self.costs.record_miss();

        let request = FetchRequest {
            center,
            radius_km,
            hints: Vec::new(),
        };
        let started = Instant::now();
        let fetched = self.fetcher.fetch(&request);
        let elapsed = started.elapsed();
        self.costs.record_upstream(elapsed);
        let elements = fetched?;
        info!(
            elements = elements.len(),
            latency_ms = elapsed.as_millis() as u64,
            "upstream fetch complete"
        );

        let result = self.build(&center, &elements, facilities);
        let fingerprint = format!(
            "{:.4},{:.4}@{}km",
            center.latitude, center.longitude, radius_km
        );
        self.cache.put(&key, &result, &fingerprint);

        Ok(QuerySuccess {
            result: CachedPayload::Full(result),
            cached: false,
        })
    }

    fn build(
        &self,
        center: &Location,
        elements: &[crate::classify::RawElement],
        facilities: &[Facility],
    ) -> ContextResult {
        let limits = &self.config.limits;
        let features = limits.apply(classify(elements));
        let spatial_analysis = analyze(&features, facilities, limits.facilities);
        let risk_assessment = assess_risk(&spatial_analysis, center);

        let transmission = features
            .iter()
            .filter(|f| f.category == FeatureCategory::TransmissionCorridor)
            .count();
        info!(
            features = features.len(),
            transmission,
            facilities = spatial_analysis.facility_proximity.len(),
            "context computed"
        );

        ContextResult {
            feature_count: features.len(),
            features,
            spatial_analysis,
            risk_assessment,
        }
    }
}
