//! Route resolution from the supported route sources.
//!
//! A route arrives either as an uploaded GPX document or as a Strava route
//! description. Strava routes can carry their geometry at several levels of
//! detail, so they are resolved by an ordered list of strategies: the full
//! polyline, then the summary polyline, then just the start and end points.
//! The first strategy that yields a valid route wins.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::ForecastError;
use crate::services::geo::{route_length_km, TrackPoint};
use crate::services::{gpx, polyline};

/// Name used when neither the input nor the GPX document names the route.
pub const DEFAULT_ROUTE_NAME: &str = "Unnamed route";

/// A route as submitted by a client.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RouteInput {
    /// An uploaded GPX document
    Gpx(GpxRoute),
    /// A route imported from Strava's route API
    Strava(StravaRoute),
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GpxRoute {
    /// Full GPX XML
    pub gpx: String,
    /// Overrides the name found in the document
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct StravaRoute {
    pub name: Option<String>,
    /// Full-resolution encoded polyline (`map.polyline`)
    pub polyline: Option<String>,
    /// Simplified encoded polyline (`map.summary_polyline`)
    pub summary_polyline: Option<String>,
    /// `[lat, lon]` of the route start
    pub start_latlng: Option<[f64; 2]>,
    /// `[lat, lon]` of the route end
    pub end_latlng: Option<[f64; 2]>,
    /// Total route distance in metres as reported by the source
    pub distance_m: Option<f64>,
}

/// An ordered, validated sequence of route points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Route {
    pub name: String,
    pub points: Vec<TrackPoint>,
    /// Distance reported by the route source, in metres
    pub distance_m: Option<f64>,
}

impl Route {
    /// Build a route, rejecting empty point lists and invalid coordinates.
    pub fn new(
        name: String,
        points: Vec<TrackPoint>,
        distance_m: Option<f64>,
    ) -> Result<Self, ForecastError> {
        if points.is_empty() {
            return Err(ForecastError::Parse("route has no usable points".to_string()));
        }
        if let Some((i, p)) = points.iter().enumerate().find(|(_, p)| !p.is_valid()) {
            return Err(ForecastError::Geometry(format!(
                "point {} has invalid coordinates ({}, {})",
                i, p.lat, p.lon
            )));
        }
        Ok(Self {
            name,
            points,
            distance_m: distance_m.filter(|d| d.is_finite() && *d > 0.0),
        })
    }

    /// Route length in km: the source's reported distance when present,
    /// otherwise the sum of segment lengths.
    pub fn length_km(&self) -> f64 {
        self.distance_m
            .map(|m| m / 1000.0)
            .unwrap_or_else(|| route_length_km(&self.points))
    }
}

/// One way of extracting points from a Strava route.
pub trait RouteResolver: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Points for the route, or `None` if this strategy cannot produce any.
    fn resolve(&self, route: &StravaRoute) -> Option<Vec<TrackPoint>>;
}

/// Decodes `polyline`.
pub struct FullPolyline;

/// Decodes `summary_polyline`.
pub struct SummaryPolyline;

/// Uses `start_latlng` and `end_latlng` as a two-point route.
pub struct StartEndPoints;

fn decode_non_empty(encoded: Option<&str>, strategy: &str) -> Option<Vec<TrackPoint>> {
    let encoded = encoded.map(str::trim).filter(|s| !s.is_empty())?;
    match polyline::decode(encoded) {
        Ok(points) if !points.is_empty() => Some(points),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("{} could not be decoded, trying next strategy: {}", strategy, e);
            None
        }
    }
}

impl RouteResolver for FullPolyline {
    fn name(&self) -> &'static str {
        "full polyline"
    }

    fn resolve(&self, route: &StravaRoute) -> Option<Vec<TrackPoint>> {
        decode_non_empty(route.polyline.as_deref(), self.name())
    }
}

impl RouteResolver for SummaryPolyline {
    fn name(&self) -> &'static str {
        "summary polyline"
    }

    fn resolve(&self, route: &StravaRoute) -> Option<Vec<TrackPoint>> {
        decode_non_empty(route.summary_polyline.as_deref(), self.name())
    }
}

impl RouteResolver for StartEndPoints {
    fn name(&self) -> &'static str {
        "start/end points"
    }

    fn resolve(&self, route: &StravaRoute) -> Option<Vec<TrackPoint>> {
        let [start_lat, start_lon] = route.start_latlng?;
        let [end_lat, end_lon] = route.end_latlng?;
        Some(vec![
            TrackPoint::new(start_lat, start_lon),
            TrackPoint::new(end_lat, end_lon),
        ])
    }
}

/// Strategies in the order they are tried.
pub fn default_resolvers() -> Vec<Box<dyn RouteResolver>> {
    vec![
        Box::new(FullPolyline),
        Box::new(SummaryPolyline),
        Box::new(StartEndPoints),
    ]
}

/// Resolve a Strava route with the given strategies; first success wins.
pub fn resolve_strava_route(
    route: &StravaRoute,
    resolvers: &[Box<dyn RouteResolver>],
) -> Result<Route, ForecastError> {
    let name = route
        .name
        .clone()
        .unwrap_or_else(|| DEFAULT_ROUTE_NAME.to_string());

    let mut last_error = None;
    for resolver in resolvers {
        let Some(points) = resolver.resolve(route) else {
            continue;
        };
        let count = points.len();
        match Route::new(name.clone(), points, route.distance_m) {
            Ok(resolved) => {
                tracing::debug!(
                    "Resolved route '{}' via {} ({} points)",
                    name,
                    resolver.name(),
                    count
                );
                return Ok(resolved);
            }
            Err(e) => {
                tracing::warn!("{} rejected, trying next strategy: {}", resolver.name(), e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        ForecastError::Parse(format!(
            "route '{}' has no polyline or start/end coordinates",
            name
        ))
    }))
}

/// Resolve any route input into a validated route.
pub fn resolve_route(input: &RouteInput) -> Result<Route, ForecastError> {
    match input {
        RouteInput::Gpx(upload) => {
            let parsed = gpx::parse_gpx(&upload.gpx)?;
            if parsed.points.is_empty() {
                return Err(ForecastError::Parse(
                    "GPX document contains no track points".to_string(),
                ));
            }
            let name = upload
                .name
                .clone()
                .or(parsed.name)
                .unwrap_or_else(|| DEFAULT_ROUTE_NAME.to_string());
            Route::new(name, parsed.points, None)
        }
        RouteInput::Strava(route) => resolve_strava_route(route, &default_resolvers()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOGLE_EXAMPLE: &str = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";

    #[test]
    fn test_full_polyline_wins() {
        let route = StravaRoute {
            name: Some("Coastal".to_string()),
            polyline: Some(GOOGLE_EXAMPLE.to_string()),
            summary_polyline: Some("_p~iF~ps|U".to_string()),
            start_latlng: Some([1.0, 2.0]),
            end_latlng: Some([3.0, 4.0]),
            distance_m: Some(12_500.0),
        };
        let resolved = resolve_strava_route(&route, &default_resolvers()).unwrap();
        assert_eq!(resolved.points.len(), 3);
        assert_eq!(resolved.name, "Coastal");
        assert_eq!(resolved.length_km(), 12.5);
    }

    #[test]
    fn test_falls_back_to_summary_polyline() {
        let route = StravaRoute {
            polyline: Some("_p~iF~ps".to_string()), // truncated
            summary_polyline: Some("_p~iF~ps|U".to_string()),
            ..Default::default()
        };
        let resolved = resolve_strava_route(&route, &default_resolvers()).unwrap();
        assert_eq!(resolved.points.len(), 1);
        assert_eq!(resolved.name, DEFAULT_ROUTE_NAME);
    }

    #[test]
    fn test_out_of_range_polyline_falls_back_to_summary() {
        let route = StravaRoute {
            polyline: Some(polyline::encode(&[
                TrackPoint::new(100.0, 0.0),
                TrackPoint::new(101.0, 0.0),
            ])),
            summary_polyline: Some(GOOGLE_EXAMPLE.to_string()),
            ..Default::default()
        };
        let resolved = resolve_strava_route(&route, &default_resolvers()).unwrap();
        assert_eq!(resolved.points.len(), 3);
        assert!((resolved.points[0].lat - 38.5).abs() < 1e-9);
    }

    #[test]
    fn test_only_invalid_geometry_reports_geometry_error() {
        let route = StravaRoute {
            start_latlng: Some([95.0, 10.0]),
            end_latlng: Some([60.0, 10.0]),
            ..Default::default()
        };
        let err = resolve_strava_route(&route, &default_resolvers()).unwrap_err();
        assert!(matches!(err, ForecastError::Geometry(_)));
    }

    #[test]
    fn test_falls_back_to_start_end_points() {
        let route = StravaRoute {
            polyline: Some("".to_string()),
            start_latlng: Some([59.91, 10.75]),
            end_latlng: Some([60.01, 10.70]),
            ..Default::default()
        };
        let resolved = resolve_strava_route(&route, &default_resolvers()).unwrap();
        assert_eq!(
            resolved.points,
            vec![TrackPoint::new(59.91, 10.75), TrackPoint::new(60.01, 10.70)]
        );
    }

    #[test]
    fn test_no_strategy_succeeds() {
        let route = StravaRoute {
            name: Some("Empty".to_string()),
            start_latlng: Some([59.91, 10.75]),
            ..Default::default()
        };
        let err = resolve_strava_route(&route, &default_resolvers()).unwrap_err();
        assert!(matches!(err, ForecastError::Parse(_)));
        assert!(err.to_string().contains("Empty"));
    }

    #[test]
    fn test_custom_resolver_order() {
        let route = StravaRoute {
            polyline: Some(GOOGLE_EXAMPLE.to_string()),
            start_latlng: Some([1.0, 2.0]),
            end_latlng: Some([3.0, 4.0]),
            ..Default::default()
        };
        let resolvers: Vec<Box<dyn RouteResolver>> = vec![Box::new(StartEndPoints), Box::new(FullPolyline)];
        let resolved = resolve_strava_route(&route, &resolvers).unwrap();
        assert_eq!(resolved.points.len(), 2);
    }

    #[test]
    fn test_route_rejects_invalid_coordinates() {
        let err = Route::new(
            "Bad".to_string(),
            vec![TrackPoint::new(60.0, 10.0), TrackPoint::new(f64::NAN, 10.0)],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ForecastError::Geometry(_)));
    }

    #[test]
    fn test_route_rejects_empty() {
        let err = Route::new("Empty".to_string(), vec![], None).unwrap_err();
        assert!(matches!(err, ForecastError::Parse(_)));
    }

    #[test]
    fn test_length_from_points_when_no_distance() {
        let route = Route::new(
            "Meridian".to_string(),
            vec![TrackPoint::new(0.0, 0.0), TrackPoint::new(1.0, 0.0)],
            None,
        )
        .unwrap();
        assert!((route.length_km() - 111.19).abs() < 0.01);
    }

    #[test]
    fn test_resolve_gpx_input() {
        let input = RouteInput::Gpx(GpxRoute {
            gpx: r#"<gpx version="1.1"><metadata><name>Tur</name></metadata>
                <trk><trkseg><trkpt lat="60.0" lon="10.0"/><trkpt lat="60.1" lon="10.1"/></trkseg></trk></gpx>"#
                .to_string(),
            name: None,
        });
        let route = resolve_route(&input).unwrap();
        assert_eq!(route.name, "Tur");
        assert_eq!(route.points.len(), 2);
    }

    #[test]
    fn test_resolve_gpx_without_points() {
        let input = RouteInput::Gpx(GpxRoute {
            gpx: r#"<gpx version="1.1"><metadata><name>Nothing</name></metadata></gpx>"#.to_string(),
            name: None,
        });
        let err = resolve_route(&input).unwrap_err();
        assert!(matches!(err, ForecastError::Parse(_)));
    }

    #[test]
    fn test_route_input_deserialization() {
        let input: RouteInput = serde_json::from_value(serde_json::json!({
            "source": "strava",
            "name": "Morning loop",
            "summary_polyline": GOOGLE_EXAMPLE,
            "distance_m": 42000.0
        }))
        .unwrap();
        let route = resolve_route(&input).unwrap();
        assert_eq!(route.name, "Morning loop");
        assert_eq!(route.points.len(), 3);
    }
}
