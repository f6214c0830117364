//! Core data structures for geographic context.
//!
//! This module defines the fundamental types used throughout the library:
//!
//! - [`Location`] - Coordinate pair with distance calculations
//! - [`GeographicFeature`] - A classified point, line, or polygon with category and importance
//! - [`SpatialAnalysis`] - Typed sub-records derived from the features plus facility proximity
//! - [`RiskAssessment`] - Flood, access, and land-availability levels derived from an analysis
//! - [`ContextResult`] - The unit of work and of caching

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A coordinate pair with distance calculation capabilities.
///
/// Serialized as a compact `[longitude, latitude]` pair so that geometries stay
/// small in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Location {
    /// Latitude in decimal degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in decimal degrees (-180 to 180)
    pub longitude: f64,
}

impl Location {
    /// Constructs a new Location from coordinates.
    ///
    /// # Examples
    ///
    /// ```
    /// use geocontext::Location;
    ///
    /// let loc = Location::new(31.9315, -97.347);
    /// assert_eq!(loc.latitude, 31.9315);
    /// assert_eq!(loc.longitude, -97.347);
    /// ```
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to another location in kilometers.
    ///
    /// See [`geo::distance`](crate::geo::distance).
    pub fn distance_to(&self, other: &Location) -> f64 {
        crate::geo::distance(self, other)
    }

    /// Whether the coordinate lies inside `[-90, 90] x [-180, 180]`.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl From<[f64; 2]> for Location {
    fn from([longitude, latitude]: [f64; 2]) -> Self {
        Self::new(latitude, longitude)
    }
}

impl From<Location> for [f64; 2] {
    fn from(location: Location) -> Self {
        [location.longitude, location.latitude]
    }
}

/// Category a classified feature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureCategory {
    /// Electrical substation or transformer
    PowerSubstation,
    /// Power plant
    PowerPlant,
    /// Individual generator
    PowerGenerator,
    /// Overhead or underground power line
    TransmissionCorridor,
    /// Land-use polygon
    LandUseZone,
    /// River, canal, lake, or other water body
    WaterFeature,
    /// Road, railway, or transit station
    TransportationCorridor,
    /// Hospital, university, fire station
    CriticalInfrastructure,
    /// Administrative boundary relation
    AdministrativeBoundary,
}

impl FeatureCategory {
    /// The snake_case label used in serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PowerSubstation => "power_substation",
            Self::PowerPlant => "power_plant",
            Self::PowerGenerator => "power_generator",
            Self::TransmissionCorridor => "transmission_corridor",
            Self::LandUseZone => "land_use_zone",
            Self::WaterFeature => "water_feature",
            Self::TransportationCorridor => "transportation_corridor",
            Self::CriticalInfrastructure => "critical_infrastructure",
            Self::AdministrativeBoundary => "administrative_boundary",
        }
    }
}

impl fmt::Display for FeatureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordinal importance score. Variants are declared in ascending order so the
/// derived `Ord` ranks `Critical` highest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    /// Score 0
    #[default]
    Unknown,
    /// Score 1
    Low,
    /// Score 2
    Medium,
    /// Score 3
    High,
    /// Score 4
    Critical,
}

impl Importance {
    /// Numeric score in `0..=4`.
    pub fn score(&self) -> u8 {
        *self as u8
    }
}

/// Feature geometry. Polygons are closed: the first coordinate is repeated as the last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    /// A single coordinate
    Point(Location),
    /// An open polyline
    LineString(Vec<Location>),
    /// A closed ring
    Polygon(Vec<Location>),
}

impl Geometry {
    /// All coordinates of the geometry in order.
    pub fn points(&self) -> &[Location] {
        match self {
            Geometry::Point(point) => std::slice::from_ref(point),
            Geometry::LineString(points) | Geometry::Polygon(points) => points,
        }
    }

    /// First coordinate, if any.
    pub fn first(&self) -> Option<&Location> {
        self.points().first()
    }

    /// Whether the geometry is a single point.
    pub fn is_point(&self) -> bool {
        matches!(self, Geometry::Point(_))
    }
}

/// A single classified geographic entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeographicFeature {
    /// Stable identifier from the upstream source
    pub id: i64,
    /// Classified category
    pub category: FeatureCategory,
    /// Display name, when the source carries one
    pub name: Option<String>,
    /// Relevance score used by retention
    pub importance: Importance,
    /// Point, line, or polygon geometry
    pub geometry: Geometry,
    /// Category-specific fields (voltage, landuse, highway, ...)
    pub attributes: BTreeMap<String, String>,
}

impl GeographicFeature {
    /// Looks up a category-specific attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// A power line with its parsed voltage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransmissionLine {
    /// Source identifier
    pub id: i64,
    /// Display name
    pub name: Option<String>,
    /// Highest rated voltage in kV, if tagged
    pub voltage_kv: Option<f64>,
    /// Operating company, if tagged
    pub operator: Option<String>,
    /// Importance derived from voltage
    pub importance: Importance,
    /// Line geometry
    pub geometry: Vec<Location>,
}

/// A land-use polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandUseZone {
    /// Source identifier
    pub id: i64,
    /// Display name
    pub name: Option<String>,
    /// Value of the `landuse` tag
    pub landuse: String,
    /// Importance derived from the land-use code
    pub importance: Importance,
    /// Closed ring
    pub geometry: Vec<Location>,
}

/// A river, canal, lake, or other water body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterFeature {
    /// Source identifier
    pub id: i64,
    /// Display name
    pub name: Option<String>,
    /// Kind of water (river, canal, lake, stream, water, ...)
    pub water_type: String,
    /// Importance derived from the water type
    pub importance: Importance,
    /// Line or closed ring
    pub geometry: Vec<Location>,
}

impl WaterFeature {
    /// Whether this feature is a river.
    pub fn is_river(&self) -> bool {
        self.water_type == "river"
    }
}

/// A road or rail segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportSegment {
    /// Source identifier
    pub id: i64,
    /// Display name
    pub name: Option<String>,
    /// Highway class, or railway kind for rail segments
    pub class: String,
    /// Whether this is a railway rather than a road
    pub is_rail: bool,
    /// Importance derived from the class
    pub importance: Importance,
    /// Line geometry
    pub geometry: Vec<Location>,
}

impl TransportSegment {
    /// Motorway, trunk, or primary road.
    pub fn is_major_road(&self) -> bool {
        !self.is_rail && matches!(self.class.as_str(), "motorway" | "trunk" | "primary")
    }
}

/// An externally supplied point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    /// Display name
    pub name: String,
    /// Category label, used for the cache signature histogram
    pub category: String,
    /// Position
    pub location: Location,
}

impl Facility {
    /// Creates a facility.
    pub fn new(name: impl Into<String>, category: impl Into<String>, location: Location) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            location,
        }
    }
}

/// A feature near a facility with its distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyFeature {
    /// Source identifier
    pub id: i64,
    /// Display name
    pub name: Option<String>,
    /// Voltage, water type, or road class
    pub kind: String,
    /// Distance from the facility in kilometers
    pub distance_km: f64,
}

/// Nearest corridors, water, and access roads around one facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityProximity {
    /// Facility name
    pub facility: String,
    /// Facility position
    pub location: Location,
    /// Up to 3 transmission lines closer than 5 km, nearest first
    pub transmission_lines: Vec<NearbyFeature>,
    /// Up to 3 water features closer than 10 km, nearest first
    pub water_features: Vec<NearbyFeature>,
    /// Up to 2 roads closer than 2 km, nearest first
    pub access_roads: Vec<NearbyFeature>,
}

/// Typed sub-records derived from the classified features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialAnalysis {
    /// Power lines
    pub transmission_lines: Vec<TransmissionLine>,
    /// Land-use zones
    pub land_use: Vec<LandUseZone>,
    /// Water features
    pub water_features: Vec<WaterFeature>,
    /// Roads and railways
    pub transportation: Vec<TransportSegment>,
    /// One record per facility, in input order
    pub facility_proximity: Vec<FacilityProximity>,
}

/// Ordinal risk level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Low
    Low,
    /// Medium
    Medium,
    /// High
    High,
    /// Not assessed
    #[default]
    Unknown,
}

/// Risk levels derived from a [`SpatialAnalysis`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Proximity to water
    pub flood_risk: RiskLevel,
    /// Distance to a major road
    pub access_risk: RiskLevel,
    /// Presence of industrial land
    pub land_availability: RiskLevel,
}

/// The result of one context computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextResult {
    /// Retained features
    pub features: Vec<GeographicFeature>,
    /// Typed sub-records and facility proximity
    pub spatial_analysis: SpatialAnalysis,
    /// Derived risk levels
    pub risk_assessment: RiskAssessment,
    /// Number of features reported for display
    pub feature_count: usize,
}
