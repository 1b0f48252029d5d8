use sqlx::PgPool;

use super::models::KvRow;

/// Get a single entry by key.
pub async fn get_entry(pool: &PgPool, key: &str) -> Result<Option<KvRow>, sqlx::Error> {
    sqlx::query_as::<_, KvRow>("SELECT key, value, updated_at FROM kv_store WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
}

/// Insert or replace an entry.
pub async fn upsert_entry(
    pool: &PgPool,
    key: &str,
    value: &serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO kv_store (key, value, updated_at)
         VALUES ($1, $2, now())
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete every entry. Returns the number of rows removed.
pub async fn delete_all(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM kv_store").execute(pool).await?;
    Ok(result.rows_affected())
}

/// Connectivity check.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|_| ())
}
