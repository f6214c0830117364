//! Upstream feature source.
//!
//! The engine only depends on the [`Fetcher`] trait. [`OverpassFetcher`]
//! (behind the `fetch` feature) talks to an Overpass API interpreter; the
//! query builder and response parser are always available so they can be
//! used and tested without network access.

use crate::classify::{RawElement, Tags};
use crate::error::Result;
use crate::types::{FeatureCategory, Location};
use serde::Deserialize;
use std::fmt::Write as _;
use tracing::warn;

/// Parameters of one upstream call.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Search center
    pub center: Location,
    /// Search radius in kilometers
    pub radius_km: f64,
    /// Categories to ask for; empty means all
    pub hints: Vec<FeatureCategory>,
}

/// Returns raw elements around a coordinate.
///
/// Implementations report a timed-out call as
/// [`Error::UpstreamTimeout`](crate::Error::UpstreamTimeout) and any other
/// failure as [`Error::UpstreamFailure`](crate::Error::UpstreamFailure). A
/// missing or malformed element list is an empty result, not an error.
pub trait Fetcher {
    /// Performs the blocking call.
    fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawElement>>;
}

#[derive(Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Option<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct Center {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OverpassElement {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
        #[serde(default)]
        tags: Tags,
    },
    Way {
        id: i64,
        #[serde(default)]
        nodes: Vec<i64>,
        #[serde(default)]
        tags: Tags,
    },
    Relation {
        id: i64,
        #[serde(default)]
        tags: Tags,
        center: Option<Center>,
    },
}

impl OverpassElement {
    fn into_raw(self) -> RawElement {
        match self {
            OverpassElement::Node { id, lat, lon, tags } => RawElement::Node {
                id,
                location: Location::new(lat, lon),
                tags,
            },
            OverpassElement::Way { id, nodes, tags } => RawElement::Way { id, nodes, tags },
            OverpassElement::Relation { id, tags, center } => RawElement::Relation {
                id,
                tags,
                center: center.map(|c| Location::new(c.lat, c.lon)),
            },
        }
    }
}

/// Parses an Overpass JSON body. Malformed bodies and elements are skipped.
pub fn parse_overpass(body: &str) -> Vec<RawElement> {
    let response: OverpassResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "malformed upstream response, treating as empty");
            return Vec::new();
        }
    };

    response
        .elements
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| serde_json::from_value::<OverpassElement>(value).ok())
        .map(OverpassElement::into_raw)
        .collect()
}

fn selectors(category: FeatureCategory) -> &'static [&'static str] {
    match category {
        FeatureCategory::PowerSubstation
        | FeatureCategory::PowerPlant
        | FeatureCategory::PowerGenerator => {
            &[r#"node["power"~"^(substation|plant|generator|transformer)$"]"#]
        }
        FeatureCategory::TransmissionCorridor => &[r#"way["power"="line"]"#],
        FeatureCategory::LandUseZone => &[r#"way["landuse"]"#],
        FeatureCategory::WaterFeature => &[r#"way["natural"="water"]"#, r#"way["waterway"]"#],
        FeatureCategory::TransportationCorridor => &[
            r#"way["highway"~"^(motorway|trunk|primary|secondary|tertiary)$"]"#,
            r#"way["railway"="rail"]"#,
            r#"node["railway"="station"]"#,
            r#"node["public_transport"="station"]"#,
            r#"node["aeroway"="aerodrome"]"#,
        ],
        FeatureCategory::CriticalInfrastructure => {
            &[r#"node["amenity"~"^(hospital|university|fire_station)$"]"#]
        }
        FeatureCategory::AdministrativeBoundary => &[],
    }
}

const ALL_CATEGORIES: &[FeatureCategory] = &[
    FeatureCategory::PowerSubstation,
    FeatureCategory::TransmissionCorridor,
    FeatureCategory::LandUseZone,
    FeatureCategory::WaterFeature,
    FeatureCategory::TransportationCorridor,
    FeatureCategory::CriticalInfrastructure,
    FeatureCategory::AdministrativeBoundary,
];

/// Builds an Overpass QL query for the request.
pub fn build_query(request: &FetchRequest, timeout_secs: u64) -> String {
    let categories: &[FeatureCategory] = if request.hints.is_empty() {
        ALL_CATEGORIES
    } else {
        &request.hints
    };
    let around = format!(
        "(around:{:.0},{},{})",
        request.radius_km * 1000.0,
        request.center.latitude,
        request.center.longitude
    );

    let mut seen: Vec<&str> = Vec::new();
    let mut query = format!("[out:json][timeout:{timeout_secs}];\n(\n");
    for selector in categories.iter().flat_map(|c| selectors(*c).iter().copied()) {
        if seen.contains(&selector) {
            continue;
        }
        seen.push(selector);
        let _ = writeln!(query, "  {selector}{around};");
    }
    query.push_str(");\nout body;\n>;\nout skel qt;\n");

    if categories.contains(&FeatureCategory::AdministrativeBoundary) {
        let _ = writeln!(
            query,
            "relation[\"boundary\"=\"administrative\"]{around};\nout center;"
        );
    }
    query
}

#[cfg(feature = "fetch")]
pub use http::OverpassFetcher;

#[cfg(feature = "fetch")]
mod http {
    use super::{build_query, parse_overpass, FetchRequest, Fetcher};
    use crate::classify::RawElement;
    use crate::config::UpstreamConfig;
    use crate::error::{Error, Result};
    use std::time::Duration;
    use tracing::debug;

    /// Blocking Overpass API client.
    pub struct OverpassFetcher {
        client: reqwest::blocking::Client,
        endpoint: String,
        timeout: Duration,
    }

    impl OverpassFetcher {
        /// Client bounded by the configured timeout.
        pub fn new(config: &UpstreamConfig) -> Result<Self> {
            let client = reqwest::blocking::Client::builder()
                .timeout(config.timeout())
                .user_agent(concat!("geocontext/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| Error::upstream(e.to_string()))?;
            Ok(Self {
                client,
                endpoint: config.endpoint.clone(),
                timeout: config.timeout(),
            })
        }

        fn map_error(&self, err: reqwest::Error) -> Error {
            if err.is_timeout() {
                Error::UpstreamTimeout {
                    seconds: self.timeout.as_secs(),
                }
            } else {
                Error::upstream(err.to_string())
            }
        }
    }

    impl Fetcher for OverpassFetcher {
        fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawElement>> {
            let query = build_query(request, self.timeout.as_secs());
            debug!(endpoint = %self.endpoint, bytes = query.len(), "sending overpass query");

            let response = self
                .client
                .post(&self.endpoint)
                .body(query)
                .send()
                .map_err(|e| self.map_error(e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::upstream(format!("overpass returned status {status}")));
            }

            let body = response.text().map_err(|e| self.map_error(e))?;
            Ok(parse_overpass(&body))
        }
    }
}
