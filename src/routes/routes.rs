//! Route HTTP endpoints.
//!
//! - POST /api/v1/routes/parse
//! - POST /api/v1/routes/gpx
//! - GET /api/v1/routes/last

use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;
use crate::db::keys;
use crate::errors::{AppError, ErrorResponse};
use crate::helpers::round_1dp;
use crate::services::geo::TrackPoint;
use crate::services::gpx::create_gpx_from_coordinates;
use crate::services::polyline;
use crate::services::route_source::{resolve_route, Route, RouteInput};

/// A resolved route.
#[derive(Debug, Serialize, ToSchema)]
pub struct RouteResponse {
    pub name: String,
    /// Route length in km (1 dp)
    pub distance_km: f64,
    pub point_count: usize,
    pub points: Vec<TrackPoint>,
    /// The points as an encoded polyline
    pub polyline: String,
}

impl From<Route> for RouteResponse {
    fn from(route: Route) -> Self {
        Self {
            distance_km: round_1dp(route.length_km()),
            point_count: route.points.len(),
            polyline: polyline::encode(&route.points),
            name: route.name,
            points: route.points,
        }
    }
}

/// Parse a route and remember it as the last route.
#[utoipa::path(
    post,
    path = "/api/v1/routes/parse",
    tag = "Routes",
    request_body = RouteInput,
    responses(
        (status = 200, description = "Resolved route", body = RouteResponse),
        (status = 422, description = "Route could not be parsed", body = ErrorResponse),
    )
)]
pub async fn parse_route(
    State(state): State<AppState>,
    Json(input): Json<RouteInput>,
) -> Result<Json<RouteResponse>, AppError> {
    let route = resolve_route(&input)?;
    state.store.set_json(keys::LAST_ROUTE, &route).await?;
    Ok(Json(RouteResponse::from(route)))
}

/// Export a route as a GPX 1.1 document.
#[utoipa::path(
    post,
    path = "/api/v1/routes/gpx",
    tag = "Routes",
    request_body = RouteInput,
    responses(
        (status = 200, description = "GPX document", content_type = "application/gpx+xml", body = String),
        (status = 422, description = "Route could not be parsed", body = ErrorResponse),
    )
)]
pub async fn export_gpx(Json(input): Json<RouteInput>) -> Result<impl IntoResponse, AppError> {
    let route = resolve_route(&input)?;
    let gpx = create_gpx_from_coordinates(&route.points, &route.name)?;

    let disposition = format!("attachment; filename=\"{}.gpx\"", file_stem(&route.name));
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| AppError::InternalError(format!("Invalid Content-Disposition: {}", e)))?;

    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/gpx+xml")),
            (CONTENT_DISPOSITION, disposition),
        ],
        gpx,
    ))
}

/// The last route parsed by `/routes/parse`.
#[utoipa::path(
    get,
    path = "/api/v1/routes/last",
    tag = "Routes",
    responses(
        (status = 200, description = "Last parsed route", body = RouteResponse),
        (status = 404, description = "No route parsed yet", body = ErrorResponse),
    )
)]
pub async fn get_last_route(State(state): State<AppState>) -> Result<Json<RouteResponse>, AppError> {
    let route: Route = state
        .store
        .get_json(keys::LAST_ROUTE)
        .await?
        .ok_or_else(|| AppError::NotFound("No route has been parsed yet".to_string()))?;
    Ok(Json(RouteResponse::from(route)))
}

/// Route name reduced to characters safe in a file name.
fn file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "route".to_string()
    } else {
        stem
    }
}
