//! Shared types used across the Prospector pipeline.
//!
//! This module defines common newtypes and enums that provide type safety
//! and clear domain modeling.

use crate::error::ProspectorError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Newtype for directory source identifiers with validation.
///
/// Source IDs must be lowercase alphanumeric with hyphens, 2-50 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    /// Create a new `SourceId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID doesn't match the required format.
    pub fn new(id: impl Into<String>) -> Result<Self, ProspectorError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), ProspectorError> {
        static SOURCE_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = SOURCE_REGEX
            .get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9-]{0,48}[a-z0-9]$").expect("valid regex"));

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(ProspectorError::Validation(format!(
                "invalid source ID: must be lowercase alphanumeric with hyphens, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype for contract endpoint names.
///
/// Endpoint names double as SQL table-name suffixes (`api_<name>`), so the
/// format is restricted to lowercase alphanumerics and underscores. This is
/// what makes the dynamically created per-endpoint tables injection-safe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointName(String);

impl EndpointName {
    /// Create a new `EndpointName` from a string.
    ///
    /// # Errors
    /// Returns error if the name is not a valid table-name suffix.
    pub fn new(name: impl Into<String>) -> Result<Self, ProspectorError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The SQLite table name backing records for this endpoint.
    #[must_use]
    pub fn table_name(&self) -> String {
        format!("api_{}", self.0)
    }

    fn validate(name: &str) -> Result<(), ProspectorError> {
        static NAME_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = NAME_REGEX
            .get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]{0,49}$").expect("valid regex"));

        if regex.is_match(name) {
            Ok(())
        } else {
            Err(ProspectorError::Validation(format!(
                "invalid endpoint name: must be lowercase alphanumeric with underscores, got '{name}'"
            )))
        }
    }
}

impl fmt::Display for EndpointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of contact-email discovery for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    /// A valid contact email was found
    Found,
    /// The site was reachable but no acceptable email was found
    NotFound,
    /// The site could not be visited within the budget
    Unreachable,
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found => write!(f, "found"),
            Self::NotFound => write!(f, "not_found"),
            Self::Unreachable => write!(f, "unreachable"),
        }
    }
}

impl FromStr for EmailStatus {
    type Err = ProspectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "found" => Ok(Self::Found),
            "not_found" => Ok(Self::NotFound),
            "unreachable" => Ok(Self::Unreachable),
            other => Err(ProspectorError::Validation(format!(
                "invalid email status '{other}'"
            ))),
        }
    }
}

/// Which acquisition layer a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunLayer {
    /// Public directory scraping (browser-driven)
    Directory,
    /// Authenticated API contract replay
    Contract,
}

impl fmt::Display for RunLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory => write!(f, "directory"),
            Self::Contract => write!(f, "contract"),
        }
    }
}

impl FromStr for RunLayer {
    type Err = ProspectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "directory" => Ok(Self::Directory),
            "contract" => Ok(Self::Contract),
            other => Err(ProspectorError::Validation(format!(
                "invalid run layer '{other}'"
            ))),
        }
    }
}

/// Terminal status of a job execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    /// Job is still executing
    Running,
    /// Job finished normally (individual item errors may still be counted)
    Completed,
    /// Job aborted with a job-level failure
    Failed,
    /// Job stopped early because the circuit breaker tripped
    CircuitTripped,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::CircuitTripped => write!(f, "circuit-tripped"),
        }
    }
}

impl FromStr for RunStatus {
    type Err = ProspectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "circuit-tripped" => Ok(Self::CircuitTripped),
            other => Err(ProspectorError::Validation(format!(
                "invalid run status '{other}'"
            ))),
        }
    }
}

/// Summary of one job execution, returned to the command surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Items successfully stored
    pub items: u64,
    /// Item-level errors encountered
    pub errors: u64,
    /// Terminal status of the run
    pub status: RunStatus,
}

impl RunSummary {
    /// True when the run finished without a job-level failure.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_id_valid() {
        for id in ["sortlist", "clutch-co", "b2b-directory-9"] {
            assert!(SourceId::new(id).is_ok(), "failed for: {id}");
        }
    }

    #[test]
    fn test_source_id_invalid() {
        for id in ["Sortlist", "a", "-sortlist", "sortlist-", "sort list"] {
            assert!(SourceId::new(id).is_err(), "should fail for: {id}");
        }
    }

    #[test]
    fn test_endpoint_name_valid() {
        for name in ["properties", "client_leads", "units2"] {
            assert!(EndpointName::new(name).is_ok(), "failed for: {name}");
        }
    }

    #[test]
    fn test_endpoint_name_rejects_sql_metacharacters() {
        for name in ["", "Properties", "units;drop", "a b", "x\"y", "1units"] {
            assert!(EndpointName::new(name).is_err(), "should fail for: {name}");
        }
    }

    #[test]
    fn test_endpoint_table_name() {
        let name = EndpointName::new("properties").expect("valid endpoint name");
        assert_eq!(name.table_name(), "api_properties");
    }

    #[test]
    fn test_email_status_round_trip() {
        for status in [
            EmailStatus::Found,
            EmailStatus::NotFound,
            EmailStatus::Unreachable,
        ] {
            let parsed: EmailStatus = status.to_string().parse().expect("parse status");
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_run_status_display() {
        assert_eq!(RunStatus::CircuitTripped.to_string(), "circuit-tripped");
        assert_eq!(
            "circuit-tripped".parse::<RunStatus>().expect("parse status"),
            RunStatus::CircuitTripped
        );
    }

    #[test]
    fn test_run_summary_success() {
        let summary = RunSummary {
            items: 60,
            errors: 0,
            status: RunStatus::Completed,
        };
        assert!(summary.is_success());

        let failed = RunSummary {
            items: 0,
            errors: 1,
            status: RunStatus::Failed,
        };
        assert!(!failed.is_success());
    }
}
