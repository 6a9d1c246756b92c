//! Prospector Contract Layer
//!
//! Replays hand-mapped API contracts against authenticated remotes. A
//! contract is a JSON file declaring the base URL, credential placement, and
//! one entry per endpoint with its pagination style; records land in
//! per-endpoint `api_<name>` tables keyed by a stable record identity.
//!
//! Failure handling:
//!
//! - Transient failures (5xx, 429, timeouts) retry with exponential backoff
//! - A rejected or expired credential aborts the whole run
//! - Consecutive endpoint failures trip a circuit breaker that skips the
//!   rest of the run
//!
//! Partial results always stay persisted.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod auth;
pub mod definition;
pub mod error;
pub mod fetcher;
pub mod loader;

pub use auth::{AuthTokenProvider, TOKEN_ENV_VAR};
pub use definition::{ApiContract, AuthSpec, ContractEndpoint, HttpMethod, Pagination};
pub use error::{FetchError, Result};
pub use fetcher::ContractFetcher;
pub use loader::load_contract;
