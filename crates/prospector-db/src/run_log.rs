//! Append-only run-audit log.
//!
//! Every job execution writes exactly one row, success or failure, so the
//! pipeline's history is inspectable even after crashes. Rows are never
//! updated after `finish_run` and never deleted.

use chrono::{DateTime, Utc};
use prospector_core::{RunLayer, RunStatus};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};

/// One run-audit row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogEntry {
    /// Row id, also used as the run handle
    pub id: i64,
    /// Which layer executed
    pub layer: RunLayer,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished, if it has
    pub finished_at: Option<DateTime<Utc>>,
    /// Items successfully stored
    pub items: i64,
    /// Item-level errors
    pub errors: i64,
    /// Terminal (or `Running`) status
    pub status: RunStatus,
    /// Failure reason, when there is one (e.g. "auth-expired")
    pub reason: Option<String>,
}

/// Record the start of a job execution and return its run id.
///
/// # Errors
/// Returns an error if the insert fails.
pub async fn start_run(pool: &SqlitePool, layer: RunLayer) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO run_log (layer, started_at, status) VALUES (?, ?, ?)",
    )
    .bind(layer.to_string())
    .bind(Utc::now().to_rfc3339())
    .bind(RunStatus::Running.to_string())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Finalize a run with its counters and terminal status.
///
/// # Errors
/// Returns `DatabaseError::NotFound` if the run id doesn't exist.
pub async fn finish_run(
    pool: &SqlitePool,
    run_id: i64,
    items: u64,
    errors: u64,
    status: RunStatus,
    reason: Option<&str>,
) -> Result<()> {
    #[allow(clippy::cast_possible_wrap)]
    let result = sqlx::query(
        "UPDATE run_log
         SET finished_at = ?, items = ?, errors = ?, status = ?, reason = ?
         WHERE id = ?",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(items as i64)
    .bind(errors as i64)
    .bind(status.to_string())
    .bind(reason)
    .bind(run_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound(format!("run {run_id}")));
    }

    Ok(())
}

/// Fetch one run row by id.
///
/// # Errors
/// Returns `DatabaseError::NotFound` if no row matches.
pub async fn get_run(pool: &SqlitePool, run_id: i64) -> Result<RunLogEntry> {
    let row = sqlx::query_as::<
        _,
        (
            i64,
            String,
            String,
            Option<String>,
            i64,
            i64,
            String,
            Option<String>,
        ),
    >(
        "SELECT id, layer, started_at, finished_at, items, errors, status, reason
         FROM run_log WHERE id = ?",
    )
    .bind(run_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound(format!("run {run_id}")))?;

    let (id, layer, started_at, finished_at, items, errors, status, reason) = row;

    Ok(RunLogEntry {
        id,
        layer: layer
            .parse()
            .map_err(|e: prospector_core::ProspectorError| DatabaseError::Decode(e.to_string()))?,
        started_at: DateTime::parse_from_rfc3339(&started_at)
            .map_err(|e| DatabaseError::Decode(format!("bad started_at: {e}")))?
            .with_timezone(&Utc),
        finished_at: finished_at
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| DatabaseError::Decode(format!("bad finished_at: {e}")))
            })
            .transpose()?,
        items,
        errors,
        status: status
            .parse()
            .map_err(|e: prospector_core::ProspectorError| DatabaseError::Decode(e.to_string()))?,
        reason,
    })
}

/// Most recent runs, newest first.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn recent_runs(pool: &SqlitePool, limit: i64) -> Result<Vec<RunLogEntry>> {
    let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM run_log ORDER BY id DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await?;

    let mut entries = Vec::with_capacity(ids.len());
    for id in ids {
        entries.push(get_run(pool, id).await?);
    }
    Ok(entries)
}
