use thiserror::Error;

/// Result alias for contract-layer operations.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Errors raised while replaying an API contract.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Credential has expired or was rejected. Fatal for the whole run:
    /// retrying other endpoints with the same credential is pointless.
    #[error("authentication credential expired or rejected")]
    AuthExpired,

    /// Required credential is missing from the environment.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// Too many consecutive request failures; the remote is presumed down.
    #[error("circuit breaker tripped after {0} consecutive failures")]
    CircuitOpen(u32),

    /// A retryable failure (5xx, 429, timeout, connection error) that
    /// survived all retry attempts.
    #[error("transient failure persisted through retries: {0}")]
    Transient(String),

    /// Non-retryable HTTP failure.
    #[error("endpoint returned status {status}")]
    Http {
        /// The HTTP status code received
        status: u16,
    },

    /// The contract file is malformed or inconsistent.
    #[error("invalid contract: {0}")]
    InvalidContract(String),

    /// The response body could not be interpreted.
    #[error("unusable response payload: {0}")]
    BadPayload(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("contract file error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Database(#[from] prospector_db::DatabaseError),
}

impl FetchError {
    /// True for failures worth retrying with backoff.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transient(_) => true,
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::Transient("503".to_string()).is_transient());
        assert!(!FetchError::AuthExpired.is_transient());
        assert!(!FetchError::Http { status: 404 }.is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = FetchError::CircuitOpen(5);
        assert!(err.to_string().contains("5 consecutive failures"));
    }
}
