use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::gpx::GpxError;
use crate::services::polyline::DecodeError;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

/// Failures of the route-to-forecast pipeline.
///
/// `Parse` and `Geometry` are fatal to a request and are raised before any
/// network fetch. `Matching` and `PartialData` describe per-sample-point
/// problems that degrade a forecast without aborting it.
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("Could not parse route: {0}")]
    Parse(String),

    #[error("Invalid route geometry: {0}")]
    Geometry(String),

    #[error("No forecast entries to match against")]
    Matching,

    #[error("{failed} of {total} sample points could not be resolved")]
    PartialData { failed: usize, total: usize },
}

impl From<DecodeError> for ForecastError {
    fn from(err: DecodeError) -> Self {
        ForecastError::Parse(format!("polyline: {}", err))
    }
}

impl From<GpxError> for ForecastError {
    fn from(err: GpxError) -> Self {
        ForecastError::Parse(format!("GPX: {}", err))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unprocessable route: {0}")]
    Unprocessable(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl From<ForecastError> for AppError {
    fn from(err: ForecastError) -> Self {
        match err {
            ForecastError::Parse(_) | ForecastError::Geometry(_) => {
                AppError::Unprocessable(err.to_string())
            }
            ForecastError::Matching | ForecastError::PartialData { .. } => {
                AppError::ExternalServiceError(err.to_string())
            }
        }
    }
}

impl From<GpxError> for AppError {
    fn from(err: GpxError) -> Self {
        AppError::from(ForecastError::from(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalError(format!("JSON error: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::ExternalServiceError(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Store(err) => {
                tracing::error!("Store error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal storage error".to_string(),
                )
            }
        };

        (status, axum::Json(ErrorResponse { error: message })).into_response()
    }
}
