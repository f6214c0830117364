//! Spatial analysis: typed sub-records, facility proximity, and risk.

use crate::geo::{distance, min_distance_to_polyline};
use crate::types::{
    Facility, FacilityProximity, FeatureCategory, GeographicFeature, LandUseZone, Location,
    NearbyFeature, RiskAssessment, RiskLevel, SpatialAnalysis, TransmissionLine,
    TransportSegment, WaterFeature,
};

/// Radius for transmission lines near a facility, in km.
pub const TRANSMISSION_RADIUS_KM: f64 = 5.0;
/// Radius for water features near a facility, in km.
pub const WATER_RADIUS_KM: f64 = 10.0;
/// Radius for access roads near a facility, in km.
pub const ROAD_RADIUS_KM: f64 = 2.0;
/// Water closer than this to the center raises flood risk, in km.
pub const FLOOD_RADIUS_KM: f64 = 2.0;
/// A major road closer than this to the center lowers access risk, in km.
pub const ACCESS_RADIUS_KM: f64 = 1.0;

/// Builds the typed sub-records from classified features and computes
/// proximity for at most `max_facilities` facilities.
///
/// Point features do not produce sub-records.
pub fn analyze(
    features: &[GeographicFeature],
    facilities: &[Facility],
    max_facilities: usize,
) -> SpatialAnalysis {
    let mut analysis = SpatialAnalysis::default();

    for feature in features.iter().filter(|f| !f.geometry.is_point()) {
        let geometry = feature.geometry.points().to_vec();
        let name = feature.name.clone();
        let (id, importance) = (feature.id, feature.importance);

        match feature.category {
            FeatureCategory::TransmissionCorridor => {
                analysis.transmission_lines.push(TransmissionLine {
                    id,
                    name,
                    voltage_kv: feature
                        .attribute("voltage")
                        .and_then(crate::classify::parse_voltage_kv),
                    operator: feature.attribute("operator").map(str::to_string),
                    importance,
                    geometry,
                })
            }
            FeatureCategory::LandUseZone => analysis.land_use.push(LandUseZone {
                id,
                name,
                landuse: feature.attribute("landuse").unwrap_or_default().to_string(),
                importance,
                geometry,
            }),
            FeatureCategory::WaterFeature => analysis.water_features.push(WaterFeature {
                id,
                name,
                water_type: feature
                    .attribute("waterway")
                    .or_else(|| feature.attribute("water"))
                    .unwrap_or("water")
                    .to_string(),
                importance,
                geometry,
            }),
            FeatureCategory::TransportationCorridor => {
                let highway = feature.attribute("highway");
                analysis.transportation.push(TransportSegment {
                    id,
                    name,
                    class: highway
                        .or_else(|| feature.attribute("railway"))
                        .unwrap_or_default()
                        .to_string(),
                    is_rail: highway.is_none(),
                    importance,
                    geometry,
                })
            }
            _ => {}
        }
    }

    analysis.facility_proximity = facilities
        .iter()
        .take(max_facilities)
        .map(|facility| facility_proximity(&analysis, facility))
        .collect();

    analysis
}

fn nearest<T>(
    items: &[T],
    limit: usize,
    radius_km: f64,
    measure: impl Fn(&T) -> Option<(f64, NearbyFeature)>,
) -> Vec<NearbyFeature> {
    let mut hits: Vec<NearbyFeature> = items
        .iter()
        .filter_map(|item| measure(item))
        .filter(|(d, _)| *d < radius_km)
        .map(|(d, mut near)| {
            near.distance_km = d;
            near
        })
        .collect();
    hits.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    hits.truncate(limit);
    hits
}

/// Nearest transmission lines, water, and roads around one facility.
pub fn facility_proximity(analysis: &SpatialAnalysis, facility: &Facility) -> FacilityProximity {
    let at = &facility.location;

    let transmission_lines = nearest(&analysis.transmission_lines, 3, TRANSMISSION_RADIUS_KM, |line| {
        Some((
            min_distance_to_polyline(&line.geometry, at),
            NearbyFeature {
                id: line.id,
                name: line.name.clone(),
                kind: line
                    .voltage_kv
                    .map(|kv| format!("{kv} kV"))
                    .unwrap_or_else(|| "unknown voltage".to_string()),
                distance_km: 0.0,
            },
        ))
    });

    let water_features = nearest(&analysis.water_features, 3, WATER_RADIUS_KM, |water| {
        let first = water.geometry.first()?;
        Some((
            distance(at, first),
            NearbyFeature {
                id: water.id,
                name: water.name.clone(),
                kind: water.water_type.clone(),
                distance_km: 0.0,
            },
        ))
    });

    let access_roads = nearest(&analysis.transportation, 2, ROAD_RADIUS_KM, |segment| {
        if segment.is_rail {
            return None;
        }
        Some((
            min_distance_to_polyline(&segment.geometry, at),
            NearbyFeature {
                id: segment.id,
                name: segment.name.clone(),
                kind: segment.class.clone(),
                distance_km: 0.0,
            },
        ))
    });

    FacilityProximity {
        facility: facility.name.clone(),
        location: facility.location,
        transmission_lines,
        water_features,
        access_roads,
    }
}

/// Derives flood, access, and land-availability levels.
pub fn assess_risk(analysis: &SpatialAnalysis, center: &Location) -> RiskAssessment {
    let nearby_water: Vec<&WaterFeature> = analysis
        .water_features
        .iter()
        .filter(|water| min_distance_to_polyline(&water.geometry, center) < FLOOD_RADIUS_KM)
        .collect();

    let flood_risk = if nearby_water.is_empty() {
        RiskLevel::Low
    } else if nearby_water.iter().any(|water| water.is_river()) {
        RiskLevel::High
    } else {
        RiskLevel::Medium
    };

    let access_risk = if analysis.transportation.iter().any(|segment| {
        segment.is_major_road()
            && min_distance_to_polyline(&segment.geometry, center) < ACCESS_RADIUS_KM
    }) {
        RiskLevel::Low
    } else {
        RiskLevel::Medium
    };

    let land_availability = if analysis
        .land_use
        .iter()
        .any(|zone| zone.landuse == "industrial")
    {
        RiskLevel::High
    } else {
        RiskLevel::Medium
    };

    RiskAssessment {
        flood_risk,
        access_risk,
        land_availability,
    }
}
