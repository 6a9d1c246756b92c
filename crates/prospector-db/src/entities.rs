//! Directory entity storage.
//!
//! Entities are upserted by their natural key `(source, profile_url)`:
//! re-running a scrape against unchanged upstream data refreshes mutable
//! fields and `last_seen_at` without creating duplicate rows. Entities are
//! never deleted.

use chrono::{DateTime, Utc};
use prospector_core::EmailStatus;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};

/// A business entity discovered on a directory, ready to be upserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEntity {
    /// Directory source tag (e.g. "sortlist")
    pub source: String,
    /// Display name from the directory card
    pub name: String,
    /// Directory category the entity was listed under
    pub category: Option<String>,
    /// Profile URL on the directory (half of the natural key)
    pub profile_url: String,
    /// Entity's own website, when the card exposed one
    pub website_url: Option<String>,
    /// Discovered contact email
    pub email: Option<String>,
    /// Outcome of contact discovery
    pub email_status: EmailStatus,
}

/// A stored entity row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Row id
    pub id: i64,
    /// Directory source tag
    pub source: String,
    /// Display name
    pub name: String,
    /// Directory category
    pub category: Option<String>,
    /// Profile URL on the directory
    pub profile_url: String,
    /// Entity's own website
    pub website_url: Option<String>,
    /// Discovered contact email
    pub email: Option<String>,
    /// Outcome of contact discovery
    pub email_status: EmailStatus,
    /// When the entity was first stored
    pub first_seen_at: DateTime<Utc>,
    /// When the entity was last refreshed
    pub last_seen_at: DateTime<Utc>,
}

/// Insert or refresh an entity by `(source, profile_url)`.
///
/// A conflicting row keeps its `first_seen_at`; everything mutable is
/// replaced and `last_seen_at` is bumped.
///
/// # Errors
/// Returns an error if the write fails.
pub async fn upsert_entity(pool: &SqlitePool, entity: &NewEntity) -> Result<()> {
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO entities
            (source, name, category, profile_url, website_url, email, email_status,
             first_seen_at, last_seen_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (source, profile_url) DO UPDATE SET
            name = excluded.name,
            category = excluded.category,
            website_url = excluded.website_url,
            email = excluded.email,
            email_status = excluded.email_status,
            last_seen_at = excluded.last_seen_at",
    )
    .bind(&entity.source)
    .bind(&entity.name)
    .bind(&entity.category)
    .bind(&entity.profile_url)
    .bind(&entity.website_url)
    .bind(&entity.email)
    .bind(entity.email_status.to_string())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch a single entity by its natural key.
///
/// # Errors
/// Returns `DatabaseError::NotFound` if no row matches.
pub async fn get_entity(pool: &SqlitePool, source: &str, profile_url: &str) -> Result<Entity> {
    let row = sqlx::query_as::<_, (i64, String, String, Option<String>, String, Option<String>, Option<String>, String, String, String)>(
        "SELECT id, source, name, category, profile_url, website_url, email, email_status,
                first_seen_at, last_seen_at
         FROM entities WHERE source = ? AND profile_url = ?",
    )
    .bind(source)
    .bind(profile_url)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound(format!("entity {source}:{profile_url}")))?;

    decode_entity(row)
}

/// Count stored entities, optionally restricted to one source.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn count_entities(pool: &SqlitePool, source: Option<&str>) -> Result<i64> {
    let count = match source {
        Some(source) => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM entities WHERE source = ?")
                .bind(source)
                .fetch_one(pool)
                .await?
        }
        None => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM entities")
                .fetch_one(pool)
                .await?
        }
    };
    Ok(count)
}

#[allow(clippy::type_complexity)]
fn decode_entity(
    row: (
        i64,
        String,
        String,
        Option<String>,
        String,
        Option<String>,
        Option<String>,
        String,
        String,
        String,
    ),
) -> Result<Entity> {
    let (id, source, name, category, profile_url, website_url, email, status, first, last) = row;

    let email_status = status
        .parse::<EmailStatus>()
        .map_err(|e| DatabaseError::Decode(e.to_string()))?;
    let first_seen_at = DateTime::parse_from_rfc3339(&first)
        .map_err(|e| DatabaseError::Decode(format!("bad first_seen_at: {e}")))?
        .with_timezone(&Utc);
    let last_seen_at = DateTime::parse_from_rfc3339(&last)
        .map_err(|e| DatabaseError::Decode(format!("bad last_seen_at: {e}")))?
        .with_timezone(&Utc);

    Ok(Entity {
        id,
        source,
        name,
        category,
        profile_url,
        website_url,
        email,
        email_status,
        first_seen_at,
        last_seen_at,
    })
}
