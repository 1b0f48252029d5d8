/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string; the in-memory store is used when unset.
    pub database_url: Option<String>,
    pub yr_user_agent: String,
    pub yr_base_url: String,
    pub geocoder_url: String,
    /// Delay between reverse geocoding requests, in milliseconds.
    pub geocoder_interval_ms: u64,
    /// UTC offset for trip start times given without one.
    pub default_utc_offset_minutes: i32,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            yr_user_agent: std::env::var("YR_USER_AGENT")
                .unwrap_or_else(|_| "RideForecast/0.1 ride-forecast-api".to_string()),
            yr_base_url: std::env::var("YR_BASE_URL").unwrap_or_else(|_| {
                "https://api.met.no/weatherapi/locationforecast/2.0/complete".to_string()
            }),
            geocoder_url: std::env::var("GEOCODER_URL")
                .unwrap_or_else(|_| "https://nominatim.openstreetmap.org/reverse".to_string()),
            geocoder_interval_ms: std::env::var("GEOCODER_INTERVAL_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .expect("GEOCODER_INTERVAL_MS must be a valid u64"),
            default_utc_offset_minutes: std::env::var("DEFAULT_UTC_OFFSET_MINUTES")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .expect("DEFAULT_UTC_OFFSET_MINUTES must be a valid i32"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a valid u16"),
        }
    }
}
