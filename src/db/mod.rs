//! Key-value persistence for parsed routes, computed forecasts and cached
//! yr.no timeseries.
//!
//! Values are JSON documents. The in-memory backend is the default; setting
//! `DATABASE_URL` switches to the Postgres backend (`kv_store` table).

pub mod models;
pub mod queries;

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::errors::AppError;

/// Store keys.
pub mod keys {
    use uuid::Uuid;

    pub const LAST_ROUTE: &str = "last_route";
    pub const LAST_FORECAST: &str = "last_forecast";

    pub fn forecast(id: Uuid) -> String {
        format!("forecast:{}", id)
    }

    /// Timeseries key, with coordinates at the precision yr.no is queried at.
    pub fn timeseries(lat: f64, lon: f64) -> String {
        format!("yr:{:.4}:{:.4}", lat, lon)
    }
}

/// A string-keyed store of JSON values.
pub trait KeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, AppError>;
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), AppError>;
    /// Remove every entry, returning how many were removed.
    async fn clear(&self) -> Result<u64, AppError>;
    async fn ping(&self) -> bool;
}

/// Process-local store; contents are lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, AppError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), AppError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn clear(&self) -> Result<u64, AppError> {
        let mut entries = self.entries.write().await;
        let removed = entries.len() as u64;
        entries.clear();
        Ok(removed)
    }

    async fn ping(&self) -> bool {
        true
    }
}

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl KeyValueStore for PgStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, AppError> {
        Ok(queries::get_entry(&self.pool, key).await?.map(|row| row.value))
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), AppError> {
        Ok(queries::upsert_entry(&self.pool, key, &value).await?)
    }

    async fn clear(&self) -> Result<u64, AppError> {
        Ok(queries::delete_all(&self.pool).await?)
    }

    async fn ping(&self) -> bool {
        queries::ping(&self.pool).await.is_ok()
    }
}

/// The store backend selected at startup.
#[derive(Debug, Clone)]
pub enum Store {
    Memory(MemoryStore),
    Postgres(PgStore),
}

impl Store {
    /// Backend name for health reporting.
    pub fn backend(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Postgres(_) => "postgres",
        }
    }

    /// Read and deserialize a value. An entry that no longer deserializes
    /// is treated as missing.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let Some(value) = self.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable store entry '{}': {}", key, e);
                Ok(None)
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), AppError> {
        self.set(key, serde_json::to_value(value)?).await
    }
}

impl KeyValueStore for Store {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, AppError> {
        match self {
            Store::Memory(s) => s.get(key).await,
            Store::Postgres(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), AppError> {
        match self {
            Store::Memory(s) => s.set(key, value).await,
            Store::Postgres(s) => s.set(key, value).await,
        }
    }

    async fn clear(&self) -> Result<u64, AppError> {
        match self {
            Store::Memory(s) => s.clear().await,
            Store::Postgres(s) => s.clear().await,
        }
    }

    async fn ping(&self) -> bool {
        match self {
            Store::Memory(s) => s.ping().await,
            Store::Postgres(s) => s.ping().await,
        }
    }
}
