//! Forecast HTTP endpoints.
//!
//! - POST /api/v1/forecasts
//! - GET /api/v1/forecasts/last
//! - GET /api/v1/forecasts/:id

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::Json;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::AppState;
use crate::db::{keys, Store};
use crate::errors::{AppError, ErrorResponse};
use crate::services::forecast::RouteForecast;
use crate::services::route_source::{resolve_route, Route, RouteInput};
use crate::services::sampling::TripWindow;

/// Naive start time formats accepted besides RFC 3339.
const NAIVE_START_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Request body for POST /api/v1/forecasts.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ForecastRequest {
    pub route: RouteInput,
    /// Trip start: RFC 3339 (its offset is used), or local `YYYY-MM-DDTHH:MM[:SS]`
    pub start_time: String,
    /// Planned riding time in hours (0 < d ≤ 72)
    pub duration_hours: f64,
    /// UTC offset for a local start time; defaults to the server setting
    pub utc_offset_minutes: Option<i32>,
}

/// Build the trip window from a request's start time and duration.
fn parse_trip(
    start_time: &str,
    duration_hours: f64,
    utc_offset_minutes: Option<i32>,
    default_offset: FixedOffset,
) -> Result<TripWindow, AppError> {
    let start_time = start_time.trim();

    let (start_local, offset) = match DateTime::parse_from_rfc3339(start_time) {
        Ok(dt) => (dt.naive_local(), *dt.offset()),
        Err(_) => {
            let local = NAIVE_START_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(start_time, fmt).ok())
                .ok_or_else(|| {
                    AppError::BadRequest(format!("Invalid start_time: '{}'", start_time))
                })?;
            let offset = match utc_offset_minutes {
                Some(minutes) => minutes
                    .checked_mul(60)
                    .and_then(FixedOffset::east_opt)
                    .ok_or_else(|| {
                        AppError::BadRequest(format!(
                            "utc_offset_minutes out of range: {}",
                            minutes
                        ))
                    })?,
                None => default_offset,
            };
            (local, offset)
        }
    };

    Ok(TripWindow::new(start_local, offset, duration_hours)?)
}

/// Compute a forecast along a route.
///
/// The route is resolved and the trip validated before anything is fetched.
/// When some sample points could not be resolved the response carries
/// `partial: true` and the `X-Forecast-Partial: true` header.
#[utoipa::path(
    post,
    path = "/api/v1/forecasts",
    tag = "Forecasts",
    request_body = ForecastRequest,
    responses(
        (status = 200, description = "Forecast along the route", body = RouteForecast,
         headers(
             ("X-Forecast-Partial" = String, description = "Set to 'true' when some sample points have no forecast")
         )),
        (status = 400, description = "Invalid start time or offset", body = ErrorResponse),
        (status = 422, description = "Route could not be parsed or trip window is invalid", body = ErrorResponse),
        (status = 502, description = "No sample point could be forecast", body = ErrorResponse),
    )
)]
pub async fn create_forecast(
    State(state): State<AppState>,
    Json(request): Json<ForecastRequest>,
) -> Result<(HeaderMap, Json<RouteForecast>), AppError> {
    let route = resolve_route(&request.route)?;
    let trip = parse_trip(
        &request.start_time,
        request.duration_hours,
        request.utc_offset_minutes,
        state.default_utc_offset,
    )?;

    let forecast = state
        .forecasts
        .forecast_route(&route, &trip, Utc::now())
        .await?;

    remember_forecast(&state.store, &route, &forecast).await;

    let mut headers = HeaderMap::new();
    if forecast.partial {
        headers.insert("X-Forecast-Partial", HeaderValue::from_static("true"));
    }

    Ok((headers, Json(forecast)))
}

/// Store a computed forecast and its route. A failed write is logged and
/// the forecast is still returned to the caller.
async fn remember_forecast(store: &Store, route: &Route, forecast: &RouteForecast) {
    let forecast_key = keys::forecast(forecast.id);
    let writes = [
        (forecast_key.as_str(), store.set_json(&forecast_key, forecast).await),
        (keys::LAST_FORECAST, store.set_json(keys::LAST_FORECAST, forecast).await),
        (keys::LAST_ROUTE, store.set_json(keys::LAST_ROUTE, route).await),
    ];
    for (key, result) in writes {
        if let Err(e) = result {
            tracing::warn!("Failed to store {}: {}", key, e);
        }
    }
}

/// The most recently computed forecast.
#[utoipa::path(
    get,
    path = "/api/v1/forecasts/last",
    tag = "Forecasts",
    responses(
        (status = 200, description = "Last computed forecast", body = RouteForecast),
        (status = 404, description = "No forecast computed yet", body = ErrorResponse),
    )
)]
pub async fn get_last_forecast(
    State(state): State<AppState>,
) -> Result<Json<RouteForecast>, AppError> {
    state
        .store
        .get_json(keys::LAST_FORECAST)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No forecast has been computed yet".to_string()))
}

/// A previously computed forecast by id.
#[utoipa::path(
    get,
    path = "/api/v1/forecasts/{id}",
    tag = "Forecasts",
    params(
        ("id" = Uuid, Path, description = "Forecast UUID"),
    ),
    responses(
        (status = 200, description = "Computed forecast", body = RouteForecast),
        (status = 404, description = "Forecast not found", body = ErrorResponse),
    )
)]
pub async fn get_forecast(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RouteForecast>, AppError> {
    state
        .store
        .get_json(&keys::forecast(id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Forecast {} not found", id)))
}
