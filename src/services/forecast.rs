//! Route forecast orchestration.
//!
//! Takes a validated route and trip window through the pipeline:
//! sample the route, give each sample a target time, fetch (cached) yr.no
//! timeseries and a place name per sample concurrently, match each target
//! against its timeseries and derive the display values. A sample that fails
//! is kept in the output, flagged unavailable with its error, rather than
//! dropped.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::CachedTimeseries;
use crate::db::{keys, Store};
use crate::errors::{AppError, ForecastError};
use crate::helpers::{opt_or_zero, round_1dp, round_to_int};
use crate::services::conditions::{
    calculate_feels_like, describe_symbol, normalize_precipitation, segment_wind_effects,
    wind_direction_label, SegmentWind, WindSample, UNKNOWN_DESCRIPTION,
};
use crate::services::geocoder::{Geocoder, LocationLabel};
use crate::services::matcher::{assess_availability, find_closest_entry, MatchedEntry};
use crate::services::route_source::Route;
use crate::services::sampling::{
    map_targets, select_sample_points, to_utc, ForecastTarget, TripWindow,
};
use crate::services::yr::{parse_expires_header, TimeseriesEntry, YrClient};

/// Format of the local wall-clock `time` field.
const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Weather at one sample point, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherPrediction {
    /// Place name, or `"lat, lon"` when reverse geocoding failed
    pub location: String,
    /// Whether `location` came from the geocoder
    pub location_resolved: bool,
    /// Local wall-clock time, `YYYY-MM-DD HH:MM`
    pub time: String,
    /// Target instant (RFC 3339, with the trip's UTC offset)
    pub target_time: String,
    /// Air temperature in °C
    pub temperature: i32,
    /// Wind chill / heat index adjusted temperature in °C
    pub feels_like: i32,
    /// Precipitation in mm for the following hour
    pub precipitation: f64,
    /// Relative humidity in %
    pub humidity: i32,
    /// Cloud cover in %
    pub cloud_cover: i32,
    /// Wind speed in m/s
    pub wind_speed: i32,
    /// Gust speed in m/s (wind speed when no gust value is forecast)
    pub wind_gust: i32,
    /// Compass point and degrees, e.g. `"SW (225°)"`
    pub wind_direction: String,
    /// Direction the wind blows from, in degrees
    pub wind_direction_deg: i32,
    /// Air pressure at sea level in hPa
    pub pressure: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uv_index: Option<f64>,
    /// yr.no symbol code, e.g. `"lightrainshowers_day"`
    pub symbol_code: Option<String>,
    /// Norwegian description of the symbol code
    pub description: String,
    pub lat: f64,
    pub lon: f64,
    pub forecast_available: bool,
    /// Distance between the target and the matched entry, whole hours
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_difference_hours: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_has_passed: Option<bool>,
    /// Why no forecast could be produced for this point
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Echo of the trip window a forecast was computed for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TripSummary {
    /// RFC 3339 with offset
    pub start: String,
    /// RFC 3339 with offset
    pub end: String,
    pub duration_hours: f64,
    pub utc_offset_minutes: i32,
}

impl From<&TripWindow> for TripSummary {
    fn from(trip: &TripWindow) -> Self {
        Self {
            start: local_rfc3339(trip.start_local, trip.utc_offset),
            end: local_rfc3339(trip.end_local(), trip.utc_offset),
            duration_hours: trip.duration_hours,
            utc_offset_minutes: trip.utc_offset.local_minus_utc() / 60,
        }
    }
}

/// A complete forecast for one route and trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RouteForecast {
    pub id: Uuid,
    pub route_name: String,
    /// Route length in km (1 dp)
    pub distance_km: f64,
    pub generated_at: DateTime<Utc>,
    pub trip: TripSummary,
    /// One prediction per sample point, in route order
    pub points: Vec<WeatherPrediction>,
    /// Wind effect per route segment, from the available predictions
    pub wind_segments: Vec<SegmentWind>,
    /// Whether some sample points are missing a forecast or a place name
    pub partial: bool,
}

/// What one sample point produced.
struct PointOutcome {
    prediction: WeatherPrediction,
    wind: Option<WindSample>,
    failed: bool,
}

/// Runs the forecast pipeline against yr.no and the geocoder.
#[derive(Debug, Clone)]
pub struct ForecastService {
    yr_client: YrClient,
    geocoder: Geocoder,
    store: Store,
    /// Delay between consecutive geocoder requests
    geocoder_interval: StdDuration,
}

impl ForecastService {
    pub fn new(
        yr_client: YrClient,
        geocoder: Geocoder,
        store: Store,
        geocoder_interval: StdDuration,
    ) -> Self {
        Self {
            yr_client,
            geocoder,
            store,
            geocoder_interval,
        }
    }

    /// Forecast a route for a trip.
    ///
    /// `now` decides which targets are still in the future. Fails only when
    /// every sample point fails.
    pub async fn forecast_route(
        &self,
        route: &Route,
        trip: &TripWindow,
        now: DateTime<Utc>,
    ) -> Result<RouteForecast, ForecastError> {
        let samples = select_sample_points(&route.points, trip.duration_hours);
        let targets = map_targets(&samples, trip);
        let total = targets.len();

        tracing::info!(
            "Forecasting route '{}' ({} points) with {} samples over {}h",
            route.name,
            route.points.len(),
            total,
            trip.duration_hours
        );

        // Geocoder requests are staggered; forecast fetches are not
        let outcomes = join_all(targets.iter().enumerate().map(|(i, target)| {
            let delay = self.geocoder_interval * i as u32;
            self.predict_point(target, trip.utc_offset, delay, now)
        }))
        .await;

        let failed = outcomes.iter().filter(|o| o.failed).count();
        if failed > 0 {
            let err = ForecastError::PartialData { failed, total };
            if failed == total {
                tracing::error!("No forecast for route '{}': {}", route.name, err);
                return Err(err);
            }
            tracing::warn!("Partial forecast for route '{}': {}", route.name, err);
        }

        // Unresolved place names degrade the response but never fail it
        let unresolved = outcomes
            .iter()
            .filter(|o| !o.prediction.location_resolved)
            .count();
        if unresolved > 0 {
            tracing::warn!(
                "Route '{}': {} of {} sample locations fell back to coordinates",
                route.name,
                unresolved,
                total
            );
        }

        let winds: Vec<WindSample> = outcomes.iter().filter_map(|o| o.wind).collect();
        let wind_segments = segment_wind_effects(&route.points, &winds);

        Ok(RouteForecast {
            id: Uuid::new_v4(),
            route_name: route.name.clone(),
            distance_km: round_1dp(route.length_km()),
            generated_at: now,
            trip: TripSummary::from(trip),
            points: outcomes.into_iter().map(|o| o.prediction).collect(),
            wind_segments,
            partial: failed > 0 || unresolved > 0,
        })
    }

    async fn predict_point(
        &self,
        target: &ForecastTarget,
        offset: FixedOffset,
        geocode_delay: StdDuration,
        now: DateTime<Utc>,
    ) -> PointOutcome {
        let point = target.sample.point;

        let geocode = async {
            if !geocode_delay.is_zero() {
                tokio::time::sleep(geocode_delay).await;
            }
            self.geocoder.location_label(&point).await
        };
        let forecast = async {
            let entries = self
                .ensure_timeseries(point.lat, point.lon)
                .await
                .map_err(|e| e.to_string())?;
            find_closest_entry(&entries, target.target_utc)
                .map(|matched| (matched.entry.clone(), matched.time_difference_hours))
                .map_err(|e| e.to_string())
        };

        let (label, forecast) = tokio::join!(geocode, forecast);

        match forecast {
            Ok((entry, time_difference_hours)) => {
                let matched = MatchedEntry {
                    entry: &entry,
                    time_difference_hours,
                };
                derive_prediction(target, offset, label, matched, now)
            }
            Err(message) => {
                tracing::warn!(
                    "Sample {} ({}, {}) failed: {}",
                    target.sample.sequence_index,
                    point.lat,
                    point.lon,
                    message
                );
                let mut prediction = unavailable_prediction(target, offset, label, now);
                prediction.error = Some(message);
                PointOutcome {
                    prediction,
                    wind: None,
                    failed: true,
                }
            }
        }
    }

    /// Timeseries for a location, from the store while it has not expired,
    /// otherwise fetched from yr.no and stored until its `Expires` time.
    async fn ensure_timeseries(&self, lat: f64, lon: f64) -> Result<Vec<TimeseriesEntry>, AppError> {
        let key = keys::timeseries(lat, lon);
        let now = Utc::now();

        if let Some(cached) = self.store.get_json::<CachedTimeseries>(&key).await? {
            if cached.is_fresh(now) {
                tracing::debug!("Timeseries cache hit for {}", key);
                return Ok(cached.entries);
            }
        }

        let fresh = self.yr_client.fetch_timeseries(lat, lon).await?;
        let expires_at = fresh
            .expires
            .as_deref()
            .map(parse_expires_header)
            .unwrap_or_else(|| now + Duration::hours(1));

        let cached = CachedTimeseries {
            fetched_at: now,
            expires_at,
            entries: fresh.entries,
        };
        // A failed cache write only costs a refetch next time
        if let Err(e) = self.store.set_json(&key, &cached).await {
            tracing::warn!("Failed to cache timeseries {}: {}", key, e);
        }

        Ok(cached.entries)
    }
}

fn local_rfc3339(local: NaiveDateTime, offset: FixedOffset) -> String {
    let utc = to_utc(local, offset);
    DateTime::<FixedOffset>::from_naive_utc_and_offset(utc.naive_utc(), offset).to_rfc3339()
}

/// Prediction skeleton with zeroed weather values.
fn unavailable_prediction(
    target: &ForecastTarget,
    offset: FixedOffset,
    label: LocationLabel,
    now: DateTime<Utc>,
) -> WeatherPrediction {
    let point = target.sample.point;
    WeatherPrediction {
        location: label.name,
        location_resolved: label.resolved,
        time: target.target_local.format(LOCAL_TIME_FORMAT).to_string(),
        target_time: local_rfc3339(target.target_local, offset),
        temperature: 0,
        feels_like: 0,
        precipitation: 0.0,
        humidity: 0,
        cloud_cover: 0,
        wind_speed: 0,
        wind_gust: 0,
        wind_direction: wind_direction_label(0.0),
        wind_direction_deg: 0,
        pressure: 0,
        uv_index: None,
        symbol_code: None,
        description: UNKNOWN_DESCRIPTION.to_string(),
        lat: point.lat,
        lon: point.lon,
        forecast_available: false,
        time_difference_hours: None,
        time_has_passed: Some(target.target_utc <= now),
        error: None,
    }
}

/// Turn a matched entry into a prediction. Matches outside the availability
/// window keep their timing fields but carry no weather values.
fn derive_prediction(
    target: &ForecastTarget,
    offset: FixedOffset,
    label: LocationLabel,
    matched: MatchedEntry<'_>,
    now: DateTime<Utc>,
) -> PointOutcome {
    let availability = assess_availability(target.target_utc, matched.time_difference_hours, now);
    let mut prediction = unavailable_prediction(target, offset, label, now);
    prediction.time_difference_hours = Some(round_to_int(matched.time_difference_hours));
    prediction.time_has_passed = Some(availability.time_has_passed);

    if !availability.forecast_available {
        return PointOutcome {
            prediction,
            wind: None,
            failed: false,
        };
    }

    let details = &matched.entry.data.instant.details;
    let temperature = opt_or_zero(details.air_temperature, "air_temperature");
    let wind_speed = opt_or_zero(details.wind_speed, "wind_speed");
    let wind_from = opt_or_zero(details.wind_from_direction, "wind_from_direction");
    let humidity = opt_or_zero(details.relative_humidity, "relative_humidity");
    let gust = details
        .wind_speed_of_gust
        .filter(|g| g.is_finite())
        .unwrap_or(wind_speed);
    let symbol_code = matched.entry.symbol_code();

    prediction.temperature = round_to_int(temperature);
    prediction.feels_like = round_to_int(calculate_feels_like(temperature, wind_speed, humidity));
    prediction.precipitation = normalize_precipitation(matched.entry);
    prediction.humidity = round_to_int(humidity);
    prediction.cloud_cover = round_to_int(opt_or_zero(details.cloud_area_fraction, "cloud_area_fraction"));
    prediction.wind_speed = round_to_int(wind_speed);
    prediction.wind_gust = round_to_int(gust);
    prediction.wind_direction = wind_direction_label(wind_from);
    prediction.wind_direction_deg = round_to_int(wind_from);
    prediction.pressure = round_to_int(opt_or_zero(
        details.air_pressure_at_sea_level,
        "air_pressure_at_sea_level",
    ));
    prediction.uv_index = details
        .ultraviolet_index_clear_sky
        .filter(|v| v.is_finite())
        .map(round_1dp);
    prediction.description = describe_symbol(symbol_code);
    prediction.symbol_code = symbol_code.map(str::to_string);
    prediction.forecast_available = true;

    PointOutcome {
        prediction,
        wind: Some(WindSample {
            point: target.sample.point,
            speed_ms: wind_speed,
            from_deg: wind_from,
        }),
        failed: false,
    }
}
