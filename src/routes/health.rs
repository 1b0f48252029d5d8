use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;
use crate::db::{KeyValueStore, Store};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status ("ok" when healthy, "degraded" when the store is unreachable)
    pub status: String,
    /// API version
    pub version: String,
    /// Store backend ("memory" or "postgres")
    pub store: String,
    /// Whether the store is reachable
    pub store_ok: bool,
}

async fn health_of(store: &Store) -> HealthResponse {
    let store_ok = store.ping().await;
    HealthResponse {
        status: if store_ok {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store.backend().to_string(),
        store_ok,
    }
}

/// Health check endpoint.
///
/// Returns status "degraded" (still 200) if the store is unreachable, so
/// load balancers can distinguish partial failures.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health_of(&state.store).await)
}
