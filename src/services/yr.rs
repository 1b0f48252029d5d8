//! yr.no Locationforecast 2.0 client.
//!
//! Fetches weather forecasts from the MET Norway API.
//! See: https://api.met.no/weatherapi/locationforecast/2.0/documentation

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Client for the yr.no Locationforecast API.
#[derive(Debug, Clone)]
pub struct YrClient {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

/// A freshly fetched timeseries plus its caching header.
#[derive(Debug, Clone)]
pub struct YrTimeseries {
    pub entries: Vec<TimeseriesEntry>,
    /// yr.no `Expires` header, after which this data is stale.
    pub expires: Option<String>,
}

// --- yr.no JSON response types ---

#[derive(Debug, Deserialize)]
struct YrResponse {
    properties: YrProperties,
}

#[derive(Debug, Deserialize)]
struct YrProperties {
    timeseries: Vec<TimeseriesEntry>,
}

/// One forecast-provider record for a specific instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesEntry {
    pub time: DateTime<Utc>,
    pub data: EntryData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryData {
    pub instant: Instant,
    pub next_1_hours: Option<Period>,
    pub next_6_hours: Option<Period>,
    pub next_12_hours: Option<Period>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instant {
    pub details: InstantDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstantDetails {
    pub air_temperature: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_from_direction: Option<f64>,
    pub wind_speed_of_gust: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub cloud_area_fraction: Option<f64>,
    pub air_pressure_at_sea_level: Option<f64>,
    pub ultraviolet_index_clear_sky: Option<f64>,
}

/// Aggregated forecast for the period following an instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub summary: Option<Summary>,
    pub details: Option<PeriodDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub symbol_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodDetails {
    pub precipitation_amount: Option<f64>,
}

impl TimeseriesEntry {
    /// Symbol code from the shortest period that carries one.
    pub fn symbol_code(&self) -> Option<&str> {
        [
            &self.data.next_1_hours,
            &self.data.next_6_hours,
            &self.data.next_12_hours,
        ]
        .into_iter()
        .flatten()
        .find_map(|p| p.summary.as_ref().and_then(|s| s.symbol_code.as_deref()))
    }
}

impl YrClient {
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            user_agent: user_agent.to_string(),
        })
    }

    /// Fetch the full timeseries from yr.no for a given location.
    pub async fn fetch_timeseries(&self, lat: f64, lon: f64) -> Result<YrTimeseries, AppError> {
        // Limit to 4 decimal places per yr.no terms of service
        let url = format!("{}?lat={:.4}&lon={:.4}", self.base_url, lat, lon);

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .map_err(|e| AppError::InternalError(format!("Invalid User-Agent: {}", e)))?,
        );

        tracing::debug!("Fetching yr.no timeseries: {}", url);
        let response = self
            .client
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("yr.no request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "yr.no returned HTTP {}",
                response.status()
            )));
        }

        // Extract caching headers before consuming the body
        let expires = response
            .headers()
            .get("expires")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body: YrResponse = response.json().await.map_err(|e| {
            AppError::ExternalServiceError(format!("yr.no JSON parse error: {}", e))
        })?;

        Ok(YrTimeseries {
            entries: body.properties.timeseries,
            expires,
        })
    }
}

/// Parse an HTTP date string (e.g. "Sat, 14 Feb 2026 12:00:00 GMT") into a
/// `DateTime<Utc>`. Falls back to `Utc::now() + 1 hour` if parsing fails.
pub fn parse_expires_header(expires: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc2822(expires)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| httpdate_parse(expires))
        .unwrap_or_else(|_| {
            tracing::warn!(
                "Failed to parse Expires header '{}', defaulting to now + 1h",
                expires
            );
            Utc::now() + chrono::Duration::hours(1)
        })
}

/// Parse HTTP-date format used by Expires header.
fn httpdate_parse(s: &str) -> Result<DateTime<Utc>, String> {
    // "Sun, 06 Nov 1994 08:49:37 GMT"     (preferred)
    // "Sunday, 06-Nov-94 08:49:37 GMT"     (obsolete RFC 850)
    // "Sun Nov  6 08:49:37 1994"           (ANSI C asctime)
    let formats = [
        "%a, %d %b %Y %H:%M:%S GMT",
        "%A, %d-%b-%y %H:%M:%S GMT",
        "%a %b %e %H:%M:%S %Y",
    ];

    for fmt in &formats {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    Err(format!("Could not parse HTTP date: {}", s))
}
