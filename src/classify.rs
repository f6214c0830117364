//! Classification of raw upstream elements into typed features.
//!
//! Points, ways, and relations carry free-form string tags. Each element kind
//! runs through an ordered chain of rules; the first rule whose predicate
//! matches decides the category, and a category-specific scorer assigns the
//! importance. Elements no rule matches are dropped.

use crate::types::{FeatureCategory, GeographicFeature, Geometry, Importance, Location};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form tag payload of a raw element.
pub type Tags = FxHashMap<String, String>;

/// A raw element as returned by the upstream fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawElement {
    /// A tagged or untagged point. Untagged nodes only resolve way geometry.
    Node {
        /// Source identifier
        id: i64,
        /// Position
        location: Location,
        /// Tags
        tags: Tags,
    },
    /// An ordered list of node references.
    Way {
        /// Source identifier
        id: i64,
        /// Node identifiers, resolved through the node table
        nodes: Vec<i64>,
        /// Tags
        tags: Tags,
    },
    /// A relation; only its tags and optional center are available.
    Relation {
        /// Source identifier
        id: i64,
        /// Tags
        tags: Tags,
        /// Center point, when the upstream computed one
        center: Option<Location>,
    },
}

struct Rule {
    category: FeatureCategory,
    matches: fn(&Tags) -> bool,
    score: fn(&Tags) -> Importance,
}

fn tag<'a>(tags: &'a Tags, key: &str) -> Option<&'a str> {
    tags.get(key).map(String::as_str)
}

fn tag_is(tags: &Tags, key: &str, value: &str) -> bool {
    tag(tags, key) == Some(value)
}

/// Highest voltage in kV from an OSM-style `voltage` tag.
///
/// Multiple values are `;`-separated. Values of 1000 or more are volts.
pub fn parse_voltage_kv(raw: &str) -> Option<f64> {
    raw.split(';')
        .filter_map(|part| part.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value > 0.0)
        .map(|value| if value >= 1000.0 { value / 1000.0 } else { value })
        .reduce(f64::max)
}

fn voltage_importance(tags: &Tags) -> Importance {
    match tag(tags, "voltage").and_then(parse_voltage_kv) {
        Some(kv) if kv >= 345.0 => Importance::Critical,
        Some(kv) if kv >= 138.0 => Importance::High,
        Some(kv) if kv >= 69.0 => Importance::Medium,
        Some(_) => Importance::Low,
        None => Importance::Unknown,
    }
}

fn landuse_importance(tags: &Tags) -> Importance {
    match tag(tags, "landuse") {
        Some("industrial") => Importance::Critical,
        Some("commercial") | Some("retail") => Importance::High,
        Some("farmland") | Some("farmyard") | Some("agricultural") | Some("orchard") => {
            Importance::Medium
        }
        _ => Importance::Low,
    }
}

/// Normalized kind of water for a water-bearing tag set.
pub fn water_type(tags: &Tags) -> String {
    tag(tags, "waterway")
        .or_else(|| tag(tags, "water"))
        .unwrap_or("water")
        .to_string()
}

fn water_importance(tags: &Tags) -> Importance {
    match water_type(tags).as_str() {
        "river" => Importance::High,
        "canal" | "lake" | "reservoir" | "water" => Importance::Medium,
        _ => Importance::Low,
    }
}

fn transport_importance(tags: &Tags) -> Importance {
    if let Some(highway) = tag(tags, "highway") {
        return match highway {
            "motorway" | "trunk" => Importance::Critical,
            "primary" => Importance::High,
            "secondary" => Importance::Medium,
            _ => Importance::Low,
        };
    }
    match tag(tags, "railway") {
        Some("rail") => Importance::High,
        Some(_) => Importance::Medium,
        None => Importance::Unknown,
    }
}

const POINT_RULES: &[Rule] = &[
    Rule {
        category: FeatureCategory::PowerSubstation,
        matches: |t| tag_is(t, "power", "substation"),
        score: voltage_importance,
    },
    Rule {
        category: FeatureCategory::PowerPlant,
        matches: |t| tag_is(t, "power", "plant"),
        score: |_| Importance::Critical,
    },
    Rule {
        category: FeatureCategory::PowerGenerator,
        matches: |t| tag_is(t, "power", "generator"),
        score: |_| Importance::Medium,
    },
    Rule {
        category: FeatureCategory::PowerSubstation,
        matches: |t| tag_is(t, "power", "transformer"),
        score: |_| Importance::Low,
    },
    Rule {
        category: FeatureCategory::CriticalInfrastructure,
        matches: |t| tag_is(t, "amenity", "hospital"),
        score: |_| Importance::Critical,
    },
    Rule {
        category: FeatureCategory::CriticalInfrastructure,
        matches: |t| tag_is(t, "amenity", "university"),
        score: |_| Importance::High,
    },
    Rule {
        category: FeatureCategory::CriticalInfrastructure,
        matches: |t| tag_is(t, "amenity", "fire_station"),
        score: |_| Importance::High,
    },
    Rule {
        category: FeatureCategory::TransportationCorridor,
        matches: |t| {
            tag_is(t, "railway", "station")
                || tag_is(t, "public_transport", "station")
                || tag_is(t, "aeroway", "aerodrome")
        },
        score: |_| Importance::Medium,
    },
];

const WAY_RULES: &[Rule] = &[
    Rule {
        category: FeatureCategory::TransmissionCorridor,
        matches: |t| tag_is(t, "power", "line"),
        score: voltage_importance,
    },
    Rule {
        category: FeatureCategory::LandUseZone,
        matches: |t| t.contains_key("landuse"),
        score: landuse_importance,
    },
    Rule {
        category: FeatureCategory::WaterFeature,
        matches: |t| tag_is(t, "natural", "water") || t.contains_key("waterway"),
        score: water_importance,
    },
    Rule {
        category: FeatureCategory::TransportationCorridor,
        matches: |t| t.contains_key("highway") || t.contains_key("railway"),
        score: transport_importance,
    },
];

const RELATION_RULES: &[Rule] = &[Rule {
    category: FeatureCategory::AdministrativeBoundary,
    matches: |t| tag_is(t, "boundary", "administrative"),
    score: |_| Importance::Low,
}];

const KEPT_ATTRIBUTES: &[&str] = &[
    "voltage",
    "operator",
    "landuse",
    "waterway",
    "water",
    "natural",
    "highway",
    "railway",
    "power",
    "amenity",
    "admin_level",
];

fn first_match(rules: &[Rule], tags: &Tags) -> Option<(FeatureCategory, Importance)> {
    rules
        .iter()
        .find(|rule| (rule.matches)(tags))
        .map(|rule| (rule.category, (rule.score)(tags)))
}

fn attributes(tags: &Tags) -> BTreeMap<String, String> {
    KEPT_ATTRIBUTES
        .iter()
        .filter_map(|key| tags.get(*key).map(|value| (key.to_string(), value.clone())))
        .collect()
}

fn feature(
    id: i64,
    category: FeatureCategory,
    importance: Importance,
    geometry: Geometry,
    tags: &Tags,
) -> GeographicFeature {
    GeographicFeature {
        id,
        category,
        name: tags.get("name").cloned(),
        importance,
        geometry,
        attributes: attributes(tags),
    }
}

/// Classifies a flat element list into features, preserving input order.
pub fn classify(elements: &[RawElement]) -> Vec<GeographicFeature> {
    let nodes: FxHashMap<i64, Location> = elements
        .iter()
        .filter_map(|element| match element {
            RawElement::Node { id, location, .. } => Some((*id, *location)),
            _ => None,
        })
        .collect();

    elements
        .iter()
        .filter_map(|element| classify_element(element, &nodes))
        .collect()
}

fn classify_element(
    element: &RawElement,
    nodes: &FxHashMap<i64, Location>,
) -> Option<GeographicFeature> {
    match element {
        RawElement::Node { id, location, tags } => {
            if tags.is_empty() {
                return None;
            }
            let (category, importance) = first_match(POINT_RULES, tags)?;
            Some(feature(*id, category, importance, Geometry::Point(*location), tags))
        }
        RawElement::Way {
            id,
            nodes: refs,
            tags,
        } => {
            let (category, importance) = first_match(WAY_RULES, tags)?;
            let mut points: Vec<Location> =
                refs.iter().filter_map(|node| nodes.get(node).copied()).collect();
            if points.len() < 2 {
                return None;
            }

            let closed_ref = refs.len() > 2 && refs.first() == refs.last();
            let polygon = match category {
                FeatureCategory::LandUseZone => true,
                FeatureCategory::WaterFeature => tag_is(tags, "natural", "water") || closed_ref,
                _ => false,
            };

            let geometry = if polygon {
                close_ring(&mut points);
                Geometry::Polygon(points)
            } else {
                Geometry::LineString(points)
            };
            Some(feature(*id, category, importance, geometry, tags))
        }
        RawElement::Relation { id, tags, center } => {
            let (category, importance) = first_match(RELATION_RULES, tags)?;
            Some(feature(*id, category, importance, Geometry::Point((*center)?), tags))
        }
    }
}

fn close_ring(points: &mut Vec<Location>) {
    if let (Some(first), Some(last)) = (points.first().copied(), points.last()) {
        if first != *last {
            points.push(first);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn node(id: i64, lat: f64, lon: f64, pairs: &[(&str, &str)]) -> RawElement {
        RawElement::Node {
            id,
            location: Location::new(lat, lon),
            tags: tags(pairs),
        }
    }

    fn way(id: i64, nodes: &[i64], pairs: &[(&str, &str)]) -> RawElement {
        RawElement::Way {
            id,
            nodes: nodes.to_vec(),
            tags: tags(pairs),
        }
    }

    fn square() -> Vec<RawElement> {
        vec![
            node(1, 0.0, 0.0, &[]),
            node(2, 0.0, 0.01, &[]),
            node(3, 0.01, 0.01, &[]),
            node(4, 0.01, 0.0, &[]),
        ]
    }

    #[test]
    fn power_tags_take_precedence_over_amenities() {
        let features = classify(&[node(
            10,
            1.0,
            1.0,
            &[("power", "substation"), ("amenity", "hospital"), ("voltage", "138000")],
        )]);

        assert_eq!(features.len(), 1);
        assert_eq!(features[0].category, FeatureCategory::PowerSubstation);
        assert_eq!(features[0].importance, Importance::High);
    }

    #[test]
    fn unclassifiable_and_untagged_points_are_dropped() {
        let features = classify(&[
            node(1, 0.0, 0.0, &[]),
            node(2, 0.0, 0.0, &[("shop", "bakery")]),
        ]);
        assert!(features.is_empty());
    }

    #[test]
    fn voltage_ladder() {
        assert_eq!(parse_voltage_kv("345000"), Some(345.0));
        assert_eq!(parse_voltage_kv("69000;138000"), Some(138.0));
        assert_eq!(parse_voltage_kv("115"), Some(115.0));
        assert_eq!(parse_voltage_kv("unknown"), None);

        let score = |v: &str| voltage_importance(&tags(&[("voltage", v)]));
        assert_eq!(score("500000"), Importance::Critical);
        assert_eq!(score("138000"), Importance::High);
        assert_eq!(score("69000"), Importance::Medium);
        assert_eq!(score("34500"), Importance::Low);
        assert_eq!(voltage_importance(&Tags::default()), Importance::Unknown);
    }

    #[test]
    fn way_precedence_prefers_power_line() {
        let mut elements = square();
        elements.push(way(
            20,
            &[1, 2],
            &[("power", "line"), ("highway", "service"), ("voltage", "230000")],
        ));

        let features = classify(&elements);
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].category, FeatureCategory::TransmissionCorridor);
        assert_eq!(features[0].importance, Importance::High);
        assert!(matches!(features[0].geometry, Geometry::LineString(_)));
    }

    #[test]
    fn land_use_is_closed_into_a_polygon() {
        let mut elements = square();
        elements.push(way(30, &[1, 2, 3, 4], &[("landuse", "industrial")]));

        let features = classify(&elements);
        let Geometry::Polygon(ring) = &features[0].geometry else {
            panic!("expected polygon");
        };
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
        assert_eq!(features[0].importance, Importance::Critical);
    }

    #[test]
    fn already_closed_rings_are_not_duplicated() {
        let mut elements = square();
        elements.push(way(31, &[1, 2, 3, 4, 1], &[("natural", "water"), ("water", "lake")]));

        let features = classify(&elements);
        assert_eq!(features[0].geometry.points().len(), 5);
        assert_eq!(features[0].importance, Importance::Medium);
    }

    #[test]
    fn ways_without_two_resolvable_nodes_are_dropped() {
        let mut elements = square();
        elements.push(way(40, &[1, 999], &[("highway", "primary")]));
        elements.push(way(41, &[998, 999], &[("waterway", "river")]));

        assert!(classify(&elements).is_empty());
    }

    #[test]
    fn transport_and_water_scores() {
        let mut elements = square();
        elements.push(way(50, &[1, 2], &[("highway", "motorway")]));
        elements.push(way(51, &[1, 2], &[("railway", "rail")]));
        elements.push(way(52, &[1, 2], &[("waterway", "river")]));
        elements.push(way(53, &[1, 2], &[("waterway", "stream")]));

        let scores: Vec<_> = classify(&elements).iter().map(|f| f.importance).collect();
        assert_eq!(
            scores,
            vec![
                Importance::Critical,
                Importance::High,
                Importance::High,
                Importance::Low
            ]
        );
    }

    #[test]
    fn administrative_relations_need_a_center() {
        let boundary = tags(&[("boundary", "administrative"), ("name", "Hill County")]);
        let features = classify(&[
            RawElement::Relation {
                id: 60,
                tags: boundary.clone(),
                center: Some(Location::new(32.0, -97.1)),
            },
            RawElement::Relation {
                id: 61,
                tags: boundary,
                center: None,
            },
        ]);

        assert_eq!(features.len(), 1);
        assert_eq!(features[0].category, FeatureCategory::AdministrativeBoundary);
        assert_eq!(features[0].name.as_deref(), Some("Hill County"));
    }
}
