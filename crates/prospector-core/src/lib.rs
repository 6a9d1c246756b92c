//! Prospector Core - Foundation crate for the Prospector acquisition pipeline.
//!
//! This crate provides shared types, error handling, and configuration
//! management that all other Prospector crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`SourceId`, `EndpointName`,
//!   `EmailStatus`, `RunLayer`, `RunStatus`)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BrowserConfig, ContactConfig, EmailFilterConfig, EndpointToggles,
    ErrorHandlingConfig, IntervalConfig, RequestConfig,
};
pub use error::{ConfigError, ConfigResult, ProspectorError, Result};
pub use types::{EmailStatus, EndpointName, RunLayer, RunStatus, RunSummary, SourceId};
