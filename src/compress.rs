//! Lossy cache tiers.
//!
//! A [`ContextResult`] can be stored as-is ([`Tier::Full`]), with trimmed
//! features and capped sub-records ([`Tier::Compressed`]), or as an
//! [`UltraResult`] that drops the feature list entirely ([`Tier::Ultra`]).
//! Every projection is one-way: nothing is ever reconstructed from a smaller
//! tier, so readers branch on [`CachedPayload`] to know what is available.

use crate::types::{
    ContextResult, FacilityProximity, GeographicFeature, Importance, Location, RiskAssessment,
    SpatialAnalysis,
};
use serde::{Deserialize, Serialize};
use std::fmt;

const COMPRESSED_ATTRIBUTES: &[&str] = &["voltage", "landuse", "highway"];

const COMPRESSED_TRANSMISSION: usize = 20;
const COMPRESSED_LAND_USE: usize = 50;
const COMPRESSED_WATER: usize = 30;
const COMPRESSED_TRANSPORT: usize = 40;
const COMPRESSED_DISPLAY_COUNT: usize = 200;

const ULTRA_TRANSMISSION: usize = 10;
const ULTRA_TRANSMISSION_POINTS: usize = 10;
const ULTRA_LAND_USE: usize = 20;
const ULTRA_WATER: usize = 15;
const ULTRA_TRANSPORT: usize = 20;
const ULTRA_DISPLAY_COUNT: usize = 100;

/// Level of detail a cached result was stored at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Unmodified result
    Full,
    /// Trimmed features, capped sub-records
    Compressed,
    /// No features, stripped sub-records
    Ultra,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::Full => "full",
            Tier::Compressed => "compressed",
            Tier::Ultra => "ultra",
        })
    }
}

/// Power line reduced to geometry, voltage, and importance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UltraTransmissionLine {
    /// At most ten leading vertices
    pub geometry: Vec<Location>,
    /// Voltage in kV
    pub voltage_kv: Option<f64>,
    /// Importance
    pub importance: Importance,
}

/// Land-use zone reduced to its code and importance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UltraLandUse {
    /// Value of the `landuse` tag
    pub landuse: String,
    /// Importance
    pub importance: Importance,
}

/// Water feature reduced to its type and importance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UltraWater {
    /// Kind of water
    pub water_type: String,
    /// Importance
    pub importance: Importance,
}

/// Transport segment reduced to its class and importance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UltraTransport {
    /// Highway class or railway kind
    pub class: String,
    /// Importance
    pub importance: Importance,
}

/// Stripped-down sub-records kept by the ultra tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UltraAnalysis {
    /// Power lines
    pub transmission_lines: Vec<UltraTransmissionLine>,
    /// Land-use zones
    pub land_use: Vec<UltraLandUse>,
    /// Water features
    pub water_features: Vec<UltraWater>,
    /// Roads and railways
    pub transportation: Vec<UltraTransport>,
    /// Facility proximity, unmodified
    pub facility_proximity: Vec<FacilityProximity>,
}

/// Result shape persisted by the ultra tier. `features` is always empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UltraResult {
    /// Always empty
    pub features: Vec<GeographicFeature>,
    /// Stripped sub-records
    pub spatial_analysis: UltraAnalysis,
    /// Risk levels, unmodified
    pub risk_assessment: RiskAssessment,
    /// Feature count capped for display
    pub feature_count: usize,
}

/// A result tagged with the tier it was projected to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tier", content = "data", rename_all = "lowercase")]
pub enum CachedPayload {
    /// Unmodified result
    Full(ContextResult),
    /// Result-shaped, with trimmed features and capped sub-records
    Compressed(ContextResult),
    /// Feature list dropped
    Ultra(UltraResult),
}

impl CachedPayload {
    /// Projects `result` to `tier`.
    pub fn project(result: &ContextResult, tier: Tier) -> Self {
        match tier {
            Tier::Full => CachedPayload::Full(result.clone()),
            Tier::Compressed => CachedPayload::Compressed(compress(result)),
            Tier::Ultra => CachedPayload::Ultra(ultra_compress(result)),
        }
    }

    /// The tier of this payload.
    pub fn tier(&self) -> Tier {
        match self {
            CachedPayload::Full(_) => Tier::Full,
            CachedPayload::Compressed(_) => Tier::Compressed,
            CachedPayload::Ultra(_) => Tier::Ultra,
        }
    }

    /// Features carried by the payload; empty for the ultra tier.
    pub fn features(&self) -> &[GeographicFeature] {
        match self {
            CachedPayload::Full(result) | CachedPayload::Compressed(result) => &result.features,
            CachedPayload::Ultra(result) => &result.features,
        }
    }

    /// Reported feature count.
    pub fn feature_count(&self) -> usize {
        match self {
            CachedPayload::Full(result) | CachedPayload::Compressed(result) => result.feature_count,
            CachedPayload::Ultra(result) => result.feature_count,
        }
    }

    /// Risk levels, present in every tier.
    pub fn risk_assessment(&self) -> &RiskAssessment {
        match self {
            CachedPayload::Full(result) | CachedPayload::Compressed(result) => {
                &result.risk_assessment
            }
            CachedPayload::Ultra(result) => &result.risk_assessment,
        }
    }

    /// Facility proximity, present in every tier.
    pub fn facility_proximity(&self) -> &[FacilityProximity] {
        match self {
            CachedPayload::Full(result) | CachedPayload::Compressed(result) => {
                &result.spatial_analysis.facility_proximity
            }
            CachedPayload::Ultra(result) => &result.spatial_analysis.facility_proximity,
        }
    }

    /// The typed sub-records, for full and compressed tiers only.
    pub fn spatial_analysis(&self) -> Option<&SpatialAnalysis> {
        match self {
            CachedPayload::Full(result) | CachedPayload::Compressed(result) => {
                Some(&result.spatial_analysis)
            }
            CachedPayload::Ultra(_) => None,
        }
    }
}

/// Returns the payload as stored. Smaller tiers are never expanded.
pub fn decompress(payload: CachedPayload) -> CachedPayload {
    payload
}

fn capped<T: Clone>(items: &[T], limit: usize) -> Vec<T> {
    items.iter().take(limit).cloned().collect()
}

/// Keeps identity, geometry, and up to three category fields per feature and
/// caps each sub-record list.
pub fn compress(result: &ContextResult) -> ContextResult {
    let features = result
        .features
        .iter()
        .map(|feature| GeographicFeature {
            attributes: feature
                .attributes
                .iter()
                .filter(|(key, _)| COMPRESSED_ATTRIBUTES.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            ..feature.clone()
        })
        .collect();

    let analysis = &result.spatial_analysis;
    ContextResult {
        features,
        spatial_analysis: SpatialAnalysis {
            transmission_lines: capped(&analysis.transmission_lines, COMPRESSED_TRANSMISSION),
            land_use: capped(&analysis.land_use, COMPRESSED_LAND_USE),
            water_features: capped(&analysis.water_features, COMPRESSED_WATER),
            transportation: capped(&analysis.transportation, COMPRESSED_TRANSPORT),
            facility_proximity: analysis.facility_proximity.clone(),
        },
        risk_assessment: result.risk_assessment,
        feature_count: result.feature_count.min(COMPRESSED_DISPLAY_COUNT),
    }
}

/// Drops the feature list and strips sub-records to category field and importance.
pub fn ultra_compress(result: &ContextResult) -> UltraResult {
    let analysis = &result.spatial_analysis;

    UltraResult {
        features: Vec::new(),
        spatial_analysis: UltraAnalysis {
            transmission_lines: analysis
                .transmission_lines
                .iter()
                .take(ULTRA_TRANSMISSION)
                .map(|line| UltraTransmissionLine {
                    geometry: capped(&line.geometry, ULTRA_TRANSMISSION_POINTS),
                    voltage_kv: line.voltage_kv,
                    importance: line.importance,
                })
                .collect(),
            land_use: analysis
                .land_use
                .iter()
                .take(ULTRA_LAND_USE)
                .map(|zone| UltraLandUse {
                    landuse: zone.landuse.clone(),
                    importance: zone.importance,
                })
                .collect(),
            water_features: analysis
                .water_features
                .iter()
                .take(ULTRA_WATER)
                .map(|water| UltraWater {
                    water_type: water.water_type.clone(),
                    importance: water.importance,
                })
                .collect(),
            transportation: analysis
                .transportation
                .iter()
                .take(ULTRA_TRANSPORT)
                .map(|segment| UltraTransport {
                    class: segment.class.clone(),
                    importance: segment.importance,
                })
                .collect(),
            facility_proximity: analysis.facility_proximity.clone(),
        },
        risk_assessment: result.risk_assessment,
        feature_count: result.feature_count.min(ULTRA_DISPLAY_COUNT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        FeatureCategory, Geometry, LandUseZone, RiskLevel, TransmissionLine, TransportSegment,
        WaterFeature,
    };

    fn sample(scale: usize) -> ContextResult {
        let points: Vec<Location> = (0..25)
            .map(|i| Location::new(30.0 + i as f64 * 0.001, -97.0))
            .collect();
        let features = (0..scale as i64)
            .map(|id| GeographicFeature {
                id,
                category: FeatureCategory::TransmissionCorridor,
                name: Some(format!("Line {id}")),
                importance: Importance::High,
                geometry: Geometry::LineString(points.clone()),
                attributes: [
                    ("voltage", "138000"),
                    ("operator", "Oncor"),
                    ("power", "line"),
                ]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            })
            .collect();

        ContextResult {
            features,
            spatial_analysis: SpatialAnalysis {
                transmission_lines: (0..scale as i64)
                    .map(|id| TransmissionLine {
                        id,
                        name: None,
                        voltage_kv: Some(138.0),
                        operator: Some("Oncor".into()),
                        importance: Importance::High,
                        geometry: points.clone(),
                    })
                    .collect(),
                land_use: (0..scale as i64)
                    .map(|id| LandUseZone {
                        id,
                        name: None,
                        landuse: "industrial".into(),
                        importance: Importance::Critical,
                        geometry: points.clone(),
                    })
                    .collect(),
                water_features: (0..scale as i64)
                    .map(|id| WaterFeature {
                        id,
                        name: None,
                        water_type: "river".into(),
                        importance: Importance::High,
                        geometry: points.clone(),
                    })
                    .collect(),
                transportation: (0..scale as i64)
                    .map(|id| TransportSegment {
                        id,
                        name: None,
                        class: "primary".into(),
                        is_rail: false,
                        importance: Importance::High,
                        geometry: points.clone(),
                    })
                    .collect(),
                facility_proximity: Vec::new(),
            },
            risk_assessment: RiskAssessment {
                flood_risk: RiskLevel::High,
                access_risk: RiskLevel::Low,
                land_availability: RiskLevel::High,
            },
            feature_count: scale,
        }
    }

    fn size<T: Serialize>(value: &T) -> usize {
        serde_json::to_vec(value).map(|bytes| bytes.len()).unwrap_or(0)
    }

    #[test]
    fn tiers_shrink_monotonically() {
        for scale in [0, 1, 60, 400] {
            let full = sample(scale);
            let compressed = compress(&full);
            let ultra = ultra_compress(&full);

            assert!(size(&ultra) <= size(&compressed), "scale {scale}");
            assert!(size(&compressed) <= size(&full), "scale {scale}");
            assert!(ultra.feature_count <= compressed.feature_count);
            assert!(compressed.feature_count <= full.feature_count);
        }
    }

    #[test]
    fn compressed_keeps_only_three_attributes() {
        let compressed = compress(&sample(3));
        let attrs = &compressed.features[0].attributes;
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get("voltage").map(String::as_str), Some("138000"));
    }

    #[test]
    fn compressed_caps_sub_records_and_display_count() {
        let compressed = compress(&sample(400));
        let analysis = &compressed.spatial_analysis;
        assert_eq!(analysis.transmission_lines.len(), 20);
        assert_eq!(analysis.land_use.len(), 50);
        assert_eq!(analysis.water_features.len(), 30);
        assert_eq!(analysis.transportation.len(), 40);
        assert_eq!(compressed.feature_count, 200);
        assert_eq!(compressed.features.len(), 400);
    }

    #[test]
    fn ultra_drops_features_and_truncates_geometry() {
        let ultra = ultra_compress(&sample(400));
        assert!(ultra.features.is_empty());
        assert_eq!(ultra.feature_count, 100);
        assert_eq!(ultra.spatial_analysis.transmission_lines.len(), 10);
        assert!(ultra
            .spatial_analysis
            .transmission_lines
            .iter()
            .all(|line| line.geometry.len() == 10));
        assert_eq!(ultra.spatial_analysis.land_use.len(), 20);
        assert_eq!(ultra.spatial_analysis.water_features.len(), 15);
        assert_eq!(ultra.risk_assessment.flood_risk, RiskLevel::High);
    }

    #[test]
    fn decompress_does_not_expand_ultra() {
        let payload = CachedPayload::project(&sample(5), Tier::Ultra);
        let restored = decompress(payload.clone());
        assert_eq!(restored, payload);
        assert_eq!(restored.tier(), Tier::Ultra);
        assert!(restored.features().is_empty());
        assert!(restored.spatial_analysis().is_none());
    }
}
