//! Database connection management.
//!
//! Provides a `SQLite` connection pool configured the way the pipeline needs
//! it: WAL journaling (directory and contract jobs write concurrently on
//! independent schedules), foreign keys on, and create-if-missing.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

/// Open a connection pool at `path` (or `:memory:` for tests).
///
/// # Errors
/// Returns `DatabaseError::Open` if the path is invalid or the pool cannot
/// be created.
pub async fn open_pool(path: impl AsRef<Path>) -> Result<Pool<Sqlite>> {
    let path_str = path
        .as_ref()
        .to_str()
        .ok_or_else(|| DatabaseError::Open("invalid database path: not valid UTF-8".to_string()))?;

    let in_memory = path_str == ":memory:";

    let connect_options = SqliteConnectOptions::from_str(path_str)
        .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
        .journal_mode(if in_memory {
            SqliteJournalMode::Memory
        } else {
            SqliteJournalMode::Wal
        })
        .foreign_keys(true)
        .create_if_missing(true);

    // An in-memory database exists per connection, so the pool must not
    // grow beyond the one connection that holds it
    let pool = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { 5 })
        .connect_with(connect_options)
        .await
        .map_err(|e| DatabaseError::Open(format!("failed to initialize pool: {e}")))?;

    tracing::info!("Database pool created at {}", path_str);

    Ok(pool)
}

/// Verify that the database is accessible.
///
/// # Errors
/// Returns `DatabaseError` if a trivial query fails.
pub async fn verify(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_creation() {
        let pool = open_pool(":memory:").await.expect("create pool");
        verify(&pool).await.expect("verify pool");
    }

    #[tokio::test]
    async fn test_pool_close() {
        let pool = open_pool(":memory:").await.expect("create pool");
        pool.close().await; // Should not panic
    }
}
