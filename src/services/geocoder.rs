//! Reverse geocoder client (Nominatim `/reverse` API).
//!
//! Turns a sample point into a short place name for display. Nominatim's
//! usage policy allows roughly one request per second, so callers stagger
//! requests (see `services::forecast`).

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::geo::TrackPoint;

/// Client for a Nominatim-compatible reverse geocoding endpoint.
#[derive(Debug, Clone)]
pub struct Geocoder {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    address: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct Address {
    town: Option<String>,
    city: Option<String>,
    village: Option<String>,
    hamlet: Option<String>,
    suburb: Option<String>,
    municipality: Option<String>,
    county: Option<String>,
}

impl Address {
    /// Most specific non-blank settlement name available.
    fn place_name(self) -> Option<String> {
        [
            self.town,
            self.city,
            self.village,
            self.hamlet,
            self.suburb,
            self.municipality,
            self.county,
        ]
        .into_iter()
        .flatten()
        .find(|name| !name.trim().is_empty())
    }
}

/// A location label and whether it came from the geocoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationLabel {
    pub name: String,
    pub resolved: bool,
}

impl Geocoder {
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            user_agent: user_agent.to_string(),
        })
    }

    /// Look up a place name for a coordinate.
    pub async fn reverse(&self, lat: f64, lon: f64) -> Result<String, AppError> {
        let url = format!(
            "{}?format=jsonv2&lat={:.5}&lon={:.5}&zoom=14",
            self.base_url, lat, lon
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .map_err(|e| AppError::InternalError(format!("Invalid User-Agent: {}", e)))?,
        );

        let response = self
            .client
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("geocoder request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "geocoder returned HTTP {}",
                response.status()
            )));
        }

        let body: ReverseResponse = response.json().await.map_err(|e| {
            AppError::ExternalServiceError(format!("geocoder JSON parse error: {}", e))
        })?;

        body.address
            .and_then(Address::place_name)
            .or(body.display_name.filter(|name| !name.trim().is_empty()))
            .ok_or_else(|| {
                AppError::ExternalServiceError(format!("geocoder found no place at {}, {}", lat, lon))
            })
    }

    /// Place name for a point, falling back to its coordinates as text.
    pub async fn location_label(&self, point: &TrackPoint) -> LocationLabel {
        match self.reverse(point.lat, point.lon).await {
            Ok(name) => LocationLabel {
                name,
                resolved: true,
            },
            Err(e) => {
                tracing::warn!(
                    "Reverse geocoding failed for ({}, {}), using coordinates: {}",
                    point.lat,
                    point.lon,
                    e
                );
                LocationLabel {
                    name: coordinates_label(point),
                    resolved: false,
                }
            }
        }
    }
}

/// Coordinates formatted as a location label, e.g. `"59.9139, 10.7522"`.
pub fn coordinates_label(point: &TrackPoint) -> String {
    format!("{:.4}, {:.4}", point.lat, point.lon)
}
