use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::services::yr::TimeseriesEntry;

/// One row of the `kv_store` table.
#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)] // updated_at populated by FromRow; read only when debugging
pub struct KvRow {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// A yr.no timeseries as kept in the store, valid until `expires_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedTimeseries {
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub entries: Vec<TimeseriesEntry>,
}

impl CachedTimeseries {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}
