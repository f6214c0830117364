//! Great-circle distance helpers.
//!
//! Both functions assume a spherical Earth with radius 6371 km, which is
//! accurate enough for kilometer-scale filtering.

use crate::types::Location;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two locations in kilometers.
///
/// # Examples
///
/// ```
/// use geocontext::{geo, Location};
///
/// let nyc = Location::new(40.7128, -74.0060);
/// let la = Location::new(34.0522, -118.2437);
///
/// let d = geo::distance(&nyc, &la);
/// assert!(d > 3900.0 && d < 4000.0);
/// assert_eq!(geo::distance(&nyc, &nyc), 0.0);
/// ```
pub fn distance(a: &Location, b: &Location) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Minimum distance from `target` to any vertex of the polyline, in kilometers.
///
/// Segment interiors are not projected onto; a target beside the middle of a
/// long straight segment measures to the nearer endpoint. Polylines with fewer
/// than two points return `f64::INFINITY`.
///
/// # Examples
///
/// ```
/// use geocontext::{geo, Location};
///
/// let line = [Location::new(0.0, 0.0), Location::new(0.0, 1.0)];
/// let d = geo::min_distance_to_polyline(&line, &Location::new(0.0, 1.0));
/// assert_eq!(d, 0.0);
///
/// assert!(geo::min_distance_to_polyline(&line[..1], &line[0]).is_infinite());
/// ```
pub fn min_distance_to_polyline(points: &[Location], target: &Location) -> f64 {
    if points.len() < 2 {
        return f64::INFINITY;
    }

    points
        .iter()
        .map(|vertex| distance(vertex, target))
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (Location::new(31.9315, -97.347), Location::new(32.7767, -96.797)),
            (Location::new(-33.8688, 151.2093), Location::new(51.5074, -0.1278)),
            (Location::new(0.0, 179.9), Location::new(0.0, -179.9)),
        ];

        for (a, b) in pairs {
            assert_eq!(distance(&a, &b), distance(&b, &a));
            assert_eq!(distance(&a, &a), 0.0);
        }
    }

    #[test]
    fn distance_crosses_antimeridian_short_way() {
        let d = distance(&Location::new(0.0, 179.9), &Location::new(0.0, -179.9));
        assert!(d < 25.0, "expected ~22 km, got {d}");
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = distance(&Location::new(10.0, 20.0), &Location::new(11.0, 20.0));
        assert!((d - 111.19).abs() < 0.1, "got {d}");
    }

    #[test]
    fn polyline_distance_uses_vertices_only() {
        // A 2-degree segment along the equator with the target just north of its midpoint.
        let line = [Location::new(0.0, -1.0), Location::new(0.0, 1.0)];
        let target = Location::new(0.01, 0.0);

        let vertex_only = min_distance_to_polyline(&line, &target);
        let perpendicular = distance(&target, &Location::new(0.0, 0.0));

        assert!(perpendicular < 2.0);
        assert!(vertex_only > 100.0, "vertex distance was {vertex_only}");
    }

    #[test]
    fn degenerate_polylines_are_infinitely_far() {
        let target = Location::new(1.0, 1.0);
        assert!(min_distance_to_polyline(&[], &target).is_infinite());
        assert!(min_distance_to_polyline(&[target], &target).is_infinite());
    }
}
