//! Spherical geometry along a route: great-circle distance, route length,
//! and initial bearing between consecutive points.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A single coordinate along a route (WGS84 degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrackPoint {
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lon: f64,
}

impl TrackPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Whether both coordinates are finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Great-circle distance between two points in kilometres.
pub fn haversine_distance_km(p1: &TrackPoint, p2: &TrackPoint) -> f64 {
    let d_lat = (p2.lat - p1.lat).to_radians();
    let d_lon = (p2.lon - p1.lon).to_radians();
    let lat1 = p1.lat.to_radians();
    let lat2 = p2.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Sum of great-circle distances between consecutive points.
///
/// Returns 0.0 for fewer than two points.
pub fn route_length_km(points: &[TrackPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance_km(&pair[0], &pair[1]))
        .sum()
}

/// Initial compass bearing from `p1` to `p2`, normalized to `[0, 360)`.
pub fn bearing_degrees(p1: &TrackPoint, p2: &TrackPoint) -> f64 {
    let lat1 = p1.lat.to_radians();
    let lat2 = p2.lat.to_radians();
    let d_lon = (p2.lon - p1.lon).to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();
    let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can return exactly 360.0 for tiny negative inputs
    if bearing >= 360.0 {
        0.0
    } else {
        bearing
    }
}

/// Arithmetic midpoint of a segment. Adequate for the short segments of a
/// GPS track.
pub fn midpoint(p1: &TrackPoint, p2: &TrackPoint) -> TrackPoint {
    TrackPoint {
        lat: (p1.lat + p2.lat) / 2.0,
        lon: (p1.lon + p2.lon) / 2.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point() {
        let p = TrackPoint::new(59.91, 10.75);
        assert_eq!(haversine_distance_km(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        // One degree of latitude is ~111.19 km on a 6371 km sphere
        let d = haversine_distance_km(&TrackPoint::new(0.0, 0.0), &TrackPoint::new(1.0, 0.0));
        assert!((d - 111.19).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn test_haversine_oslo_bergen() {
        let oslo = TrackPoint::new(59.9139, 10.7522);
        let bergen = TrackPoint::new(60.3913, 5.3221);
        let d = haversine_distance_km(&oslo, &bergen);
        assert!(d > 300.0 && d < 310.0, "Oslo-Bergen should be ~305 km, got {}", d);
    }

    #[test]
    fn test_route_length_short_routes() {
        assert_eq!(route_length_km(&[]), 0.0);
        assert_eq!(route_length_km(&[TrackPoint::new(60.0, 10.0)]), 0.0);
    }

    #[test]
    fn test_route_length_is_reversal_invariant() {
        let points = vec![
            TrackPoint::new(59.91, 10.75),
            TrackPoint::new(59.95, 10.80),
            TrackPoint::new(60.02, 10.71),
            TrackPoint::new(60.10, 10.90),
        ];
        let mut reversed = points.clone();
        reversed.reverse();
        let forward = route_length_km(&points);
        let backward = route_length_km(&reversed);
        assert!(forward > 0.0);
        assert!((forward - backward).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = TrackPoint::new(0.0, 0.0);
        assert!((bearing_degrees(&origin, &TrackPoint::new(1.0, 0.0)) - 0.0).abs() < 1e-9);
        assert!((bearing_degrees(&origin, &TrackPoint::new(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((bearing_degrees(&origin, &TrackPoint::new(-1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((bearing_degrees(&origin, &TrackPoint::new(0.0, -1.0)) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_range() {
        let a = TrackPoint::new(60.0, 10.0);
        let b = TrackPoint::new(59.5, 9.0);
        let bearing = bearing_degrees(&a, &b);
        assert!((0.0..360.0).contains(&bearing));
        assert!(bearing > 180.0 && bearing < 270.0, "south-west, got {}", bearing);
    }

    #[test]
    fn test_point_validity() {
        assert!(TrackPoint::new(60.0, 10.0).is_valid());
        assert!(!TrackPoint::new(91.0, 10.0).is_valid());
        assert!(!TrackPoint::new(60.0, 181.0).is_valid());
        assert!(!TrackPoint::new(f64::NAN, 10.0).is_valid());
    }

    #[test]
    fn test_midpoint() {
        let m = midpoint(&TrackPoint::new(60.0, 10.0), &TrackPoint::new(61.0, 12.0));
        assert_eq!(m, TrackPoint::new(60.5, 11.0));
    }
}
