pub mod cache;
pub mod forecasts;
pub mod health;
pub mod routes;

use chrono::FixedOffset;

use crate::db::Store;
use crate::services::forecast::ForecastService;

/// Shared application state for all endpoints.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Store,
    pub(crate) forecasts: ForecastService,
    /// Offset applied to trip start times given without one
    pub(crate) default_utc_offset: FixedOffset,
}
