//! Prospector Browser Layer
//!
//! Manages chromium sessions for the directory layer. Directories render
//! their listings client-side and some gate automated traffic, so two engine
//! variants are provided:
//!
//! - **Stealth**: randomized fingerprint and automation-masking flags
//! - **Standard**: plain launch with a fixed window size
//!
//! Both hide behind [`BrowserSession`]; the scraping layers consume the
//! [`PageFetcher`] trait so they never touch chromium directly.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod engine;
pub mod error;
pub mod fetch;
pub mod fingerprint;

pub use engine::{BrowserSession, EngineKind, LaunchProfile};
pub use error::{BrowserError, Result};
pub use fetch::{extract_domain, PageFetcher};
pub use fingerprint::FingerprintConfig;
