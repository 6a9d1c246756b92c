//! Prospector Database Layer
//!
//! Provides `SQLite` database access for the acquisition pipeline with
//! embedded migrations and idempotent keyed upserts.
//!
//! # Architecture
//!
//! - **Migrations**: SQL migrations are embedded and versioned using `SQLx`
//! - **Entities**: directory entities upserted by `(source, profile_url)`
//! - **Endpoint records**: one `api_<name>` table per contract endpoint,
//!   created on demand, storing raw payloads schema-on-read
//! - **Run log**: append-only audit row per job execution
//!
//! The directory and contract layers write concurrently on independent
//! schedules; WAL journaling and per-upsert transactions serialize them
//! without an external lock.
//!
//! # Example
//!
//! ```ignore
//! use prospector_db::Database;
//!
//! let db = Database::open("prospector.db").await?;
//! db.run_migrations().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod endpoint_records;
pub mod entities;
pub mod error;
pub mod migrations;
pub mod run_log;

// Re-export commonly used types
pub use entities::{Entity, NewEntity};
pub use error::{DatabaseError, Result};
pub use run_log::RunLogEntry;

use std::path::Path;

/// High-level database interface with migrations.
///
/// This provides a convenient wrapper around the connection pool that
/// handles initialization and migration.
#[derive(Debug, Clone)]
pub struct Database {
    pool: sqlx::Pool<sqlx::Sqlite>,
}

impl Database {
    /// Open a database at the specified path (or `:memory:`).
    ///
    /// # Errors
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let pool = connection::open_pool(path).await?;
        Ok(Self { pool })
    }

    /// Run all pending database migrations.
    ///
    /// Call this after opening to ensure the schema is up to date.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get the current schema version (number of applied migrations).
    ///
    /// # Errors
    /// Returns `DatabaseError` if the version cannot be queried.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Sqlite> {
        &self.pool
    }

    /// Verify that the database is accessible.
    ///
    /// # Errors
    /// Returns `DatabaseError` if a trivial query fails.
    pub async fn verify(&self) -> Result<()> {
        connection::verify(&self.pool).await
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}
