//! Schema-on-read storage for contract endpoint payloads.
//!
//! Contract endpoint shapes are discovered manually and may drift, so each
//! endpoint gets its own table (`api_<name>`) holding the raw JSON payload
//! per record. Tables are created on demand from the contract file; the
//! endpoint name is a validated identifier, which keeps the dynamic DDL
//! safe to interpolate.

use chrono::{DateTime, Utc};
use prospector_core::EndpointName;
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};

/// A stored contract record.
#[derive(Debug, Clone)]
pub struct EndpointRecord {
    /// Stable identifier extracted from the payload
    pub record_id: String,
    /// Raw payload as received
    pub payload: serde_json::Value,
    /// When the record was last captured
    pub captured_at: DateTime<Utc>,
}

/// Create the backing table for an endpoint if it doesn't exist yet.
///
/// # Errors
/// Returns an error if the DDL fails.
pub async fn ensure_table(pool: &SqlitePool, endpoint: &EndpointName) -> Result<()> {
    let table = endpoint.table_name();
    let ddl = format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (
            id TEXT PRIMARY KEY,
            data_json TEXT NOT NULL,
            captured_at TEXT NOT NULL
        )"
    );
    sqlx::query(&ddl).execute(pool).await?;
    Ok(())
}

/// Upsert one record by `(endpoint, record_id)`.
///
/// Re-capturing an identical record replaces the payload and bumps
/// `captured_at`; the row count stays unchanged.
///
/// # Errors
/// Returns an error if the write fails.
pub async fn upsert_record(
    pool: &SqlitePool,
    endpoint: &EndpointName,
    record_id: &str,
    payload: &serde_json::Value,
) -> Result<()> {
    let table = endpoint.table_name();
    let sql = format!(
        "INSERT INTO \"{table}\" (id, data_json, captured_at)
         VALUES (?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET
            data_json = excluded.data_json,
            captured_at = excluded.captured_at"
    );

    sqlx::query(&sql)
        .bind(record_id)
        .bind(payload.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;

    Ok(())
}

/// Count rows in an endpoint's table.
///
/// # Errors
/// Returns an error if the table doesn't exist or the query fails.
pub async fn count_records(pool: &SqlitePool, endpoint: &EndpointName) -> Result<i64> {
    let table = endpoint.table_name();
    let sql = format!("SELECT COUNT(*) FROM \"{table}\"");
    let count = sqlx::query_scalar::<_, i64>(&sql).fetch_one(pool).await?;
    Ok(count)
}

/// Fetch a single record by id.
///
/// # Errors
/// Returns `DatabaseError::NotFound` if no row matches.
pub async fn get_record(
    pool: &SqlitePool,
    endpoint: &EndpointName,
    record_id: &str,
) -> Result<EndpointRecord> {
    let table = endpoint.table_name();
    let sql = format!("SELECT id, data_json, captured_at FROM \"{table}\" WHERE id = ?");

    let (id, data_json, captured_at) = sqlx::query_as::<_, (String, String, String)>(&sql)
        .bind(record_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("record {endpoint}:{record_id}")))?;

    let payload = serde_json::from_str(&data_json)
        .map_err(|e| DatabaseError::Decode(format!("bad payload JSON: {e}")))?;
    let captured_at = DateTime::parse_from_rfc3339(&captured_at)
        .map_err(|e| DatabaseError::Decode(format!("bad captured_at: {e}")))?
        .with_timezone(&Utc);

    Ok(EndpointRecord {
        record_id: id,
        payload,
        captured_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use serde_json::json;

    async fn setup() -> (Database, EndpointName) {
        let db = Database::open(":memory:").await.expect("open database");
        db.run_migrations().await.expect("run migrations");
        let endpoint = EndpointName::new("properties").expect("valid endpoint name");
        ensure_table(db.pool(), &endpoint).await.expect("ensure table");
        (db, endpoint)
    }

    #[tokio::test]
    async fn test_ensure_table_idempotent() {
        let (db, endpoint) = setup().await;
        ensure_table(db.pool(), &endpoint)
            .await
            .expect("second ensure should be a no-op");
    }

    #[tokio::test]
    async fn test_upsert_and_fetch() {
        let (db, endpoint) = setup().await;
        let payload = json!({"id": 7, "title": "Marina View Villa"});

        upsert_record(db.pool(), &endpoint, "7", &payload)
            .await
            .expect("upsert record");

        let stored = get_record(db.pool(), &endpoint, "7")
            .await
            .expect("get record");
        assert_eq!(stored.payload["title"], "Marina View Villa");
    }

    #[tokio::test]
    async fn test_repeated_capture_keeps_row_count() {
        let (db, endpoint) = setup().await;
        let payload = json!({"id": 7, "title": "Marina View Villa"});

        for _ in 0..3 {
            upsert_record(db.pool(), &endpoint, "7", &payload)
                .await
                .expect("upsert record");
        }

        let count = count_records(db.pool(), &endpoint).await.expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_endpoints_are_isolated() {
        let (db, properties) = setup().await;
        let units = EndpointName::new("units").expect("valid endpoint name");
        ensure_table(db.pool(), &units).await.expect("ensure table");

        upsert_record(db.pool(), &properties, "1", &json!({"id": 1}))
            .await
            .expect("upsert");
        upsert_record(db.pool(), &units, "1", &json!({"id": 1}))
            .await
            .expect("upsert");

        assert_eq!(
            count_records(db.pool(), &properties).await.expect("count"),
            1
        );
        assert_eq!(count_records(db.pool(), &units).await.expect("count"), 1);
    }
}
