use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;
use crate::db::KeyValueStore;
use crate::errors::{AppError, ErrorResponse};

#[derive(Debug, Serialize, ToSchema)]
pub struct ClearCacheResponse {
    /// Number of stored entries removed
    pub removed: u64,
}

/// Clear stored routes, forecasts and cached yr.no timeseries.
#[utoipa::path(
    delete,
    path = "/api/v1/cache",
    tag = "Cache",
    responses(
        (status = 200, description = "Store cleared", body = ClearCacheResponse),
        (status = 500, description = "Store error", body = ErrorResponse),
    )
)]
pub async fn clear_cache(
    State(state): State<AppState>,
) -> Result<Json<ClearCacheResponse>, AppError> {
    let removed = state.store.clear().await?;
    tracing::info!("Cleared {} store entries", removed);
    Ok(Json(ClearCacheResponse { removed }))
}
