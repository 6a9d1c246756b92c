//! Database error types.

use thiserror::Error;

/// Errors from the storage engine.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to open the database file
    #[error("failed to open database: {0}")]
    Open(String),

    /// A migration failed to apply
    #[error("migration error: {0}")]
    Migration(String),

    /// A row could not be decoded into its domain type
    #[error("decode error: {0}")]
    Decode(String),

    /// A targeted row was not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Underlying `SQLx` failure
    #[error("query error: {0}")]
    Query(#[from] sqlx::Error),
}

/// Result type alias using [`DatabaseError`].
pub type Result<T> = std::result::Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DatabaseError::Migration("table exists".to_string());
        assert_eq!(err.to_string(), "migration error: table exists");
    }
}
