//! Credential handling for contract replay.
//!
//! Tokens are issued out-of-band and provided through the environment; the
//! pipeline never refreshes them itself. A token known to be expired fails
//! the run up front instead of burning requests.

use chrono::{DateTime, Utc};

use crate::definition::AuthSpec;
use crate::error::{FetchError, Result};

/// Environment variable the API token is read from.
pub const TOKEN_ENV_VAR: &str = "PROSPECTOR_API_TOKEN";

/// Holds the bearer credential for a replay run.
#[derive(Debug, Clone)]
pub struct AuthTokenProvider {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AuthTokenProvider {
    /// Wrap an explicit token.
    #[must_use]
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Read the token from [`TOKEN_ENV_VAR`].
    ///
    /// # Errors
    /// Returns `FetchError::MissingCredential` if the variable is unset or
    /// empty.
    pub fn from_env() -> Result<Self> {
        match std::env::var(TOKEN_ENV_VAR) {
            Ok(token) if !token.trim().is_empty() => Ok(Self::new(token, None)),
            _ => Err(FetchError::MissingCredential(TOKEN_ENV_VAR.to_string())),
        }
    }

    /// True when the token has a known expiry that's already past.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }

    /// The full header value, e.g. `Bearer <token>`.
    #[must_use]
    pub fn header_value(&self, spec: &AuthSpec) -> String {
        if spec.scheme.is_empty() {
            self.token.clone()
        } else {
            format!("{} {}", spec.scheme, self.token)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_header_value() {
        let provider = AuthTokenProvider::new("abc123", None);
        assert_eq!(
            provider.header_value(&AuthSpec::default()),
            "Bearer abc123"
        );
    }

    #[test]
    fn test_header_value_without_scheme() {
        let provider = AuthTokenProvider::new("abc123", None);
        let spec = AuthSpec {
            header: "X-Api-Key".to_string(),
            scheme: String::new(),
        };
        assert_eq!(provider.header_value(&spec), "abc123");
    }

    #[test]
    fn test_expiry() {
        let fresh = AuthTokenProvider::new("t", Some(Utc::now() + Duration::hours(1)));
        assert!(!fresh.is_expired());

        let stale = AuthTokenProvider::new("t", Some(Utc::now() - Duration::hours(1)));
        assert!(stale.is_expired());

        let unknown = AuthTokenProvider::new("t", None);
        assert!(!unknown.is_expired());
    }
}
