// Ride Forecast API v0.1
use axum::routing::{delete, get, post};
use axum::Router;
use chrono::FixedOffset;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod errors;
mod helpers;
mod routes;
mod services;

use config::AppConfig;
use db::{MemoryStore, PgStore, Store};
use routes::AppState;
use services::forecast::ForecastService;
use services::geocoder::Geocoder;
use services::yr::YrClient;

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;
/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 1;

/// Ride Forecast API OpenAPI document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Ride Forecast API",
        version = "0.1.0",
        description = "Weather along a planned bike ride. Takes a GPX or Strava route \
            and a start time, samples the route, estimates when the rider reaches each \
            sample and matches yr.no forecasts to those times, including the wind \
            effect on every route segment.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Routes", description = "Route parsing and GPX export"),
        (name = "Forecasts", description = "Forecasts along a route"),
        (name = "Cache", description = "Stored data management"),
    ),
    paths(
        routes::health::health_check,
        routes::routes::parse_route,
        routes::routes::export_gpx,
        routes::routes::get_last_route,
        routes::forecasts::create_forecast,
        routes::forecasts::get_last_forecast,
        routes::forecasts::get_forecast,
        routes::cache::clear_cache,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::routes::RouteResponse,
            routes::forecasts::ForecastRequest,
            routes::cache::ClearCacheResponse,
            services::route_source::RouteInput,
            services::route_source::GpxRoute,
            services::route_source::StravaRoute,
            services::geo::TrackPoint,
            services::forecast::RouteForecast,
            services::forecast::TripSummary,
            services::forecast::WeatherPrediction,
            services::conditions::SegmentWind,
            services::conditions::WindEffect,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ride_forecast_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    let store = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(DB_POOL_MAX_CONNECTIONS)
                .min_connections(DB_POOL_MIN_CONNECTIONS)
                .connect(url)
                .await
                .expect("Failed to connect to database");

            sqlx::migrate!()
                .run(&pool)
                .await
                .expect("Failed to run database migrations");

            tracing::info!("Database migrations completed, using Postgres store");
            Store::Postgres(PgStore::new(pool))
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory store");
            Store::Memory(MemoryStore::new())
        }
    };

    let yr_client = YrClient::new(&config.yr_base_url, &config.yr_user_agent)
        .expect("Failed to create yr.no client");
    let geocoder = Geocoder::new(&config.geocoder_url, &config.yr_user_agent)
        .expect("Failed to create geocoder client");

    let default_utc_offset = config
        .default_utc_offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .expect("DEFAULT_UTC_OFFSET_MINUTES must be within ±24h");

    let app_state = AppState {
        store: store.clone(),
        forecasts: ForecastService::new(
            yr_client,
            geocoder,
            store,
            Duration::from_millis(config.geocoder_interval_ms),
        ),
        default_utc_offset,
    };

    // CORS: browser clients read and post; expose X-Forecast-Partial
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers(Any)
        .expose_headers([axum::http::HeaderName::from_static("x-forecast-partial")]);

    let api_routes = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/routes/parse", post(routes::routes::parse_route))
        .route("/api/v1/routes/gpx", post(routes::routes::export_gpx))
        .route("/api/v1/routes/last", get(routes::routes::get_last_route))
        .route("/api/v1/forecasts", post(routes::forecasts::create_forecast))
        .route(
            "/api/v1/forecasts/last",
            get(routes::forecasts::get_last_forecast),
        )
        .route("/api/v1/forecasts/:id", get(routes::forecasts::get_forecast))
        .route("/api/v1/cache", delete(routes::cache::clear_cache))
        .with_state(app_state);

    let app = Router::new()
        .merge(api_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
