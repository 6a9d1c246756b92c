//! Prospector Directory Layer
//!
//! Scrapes public business directories with a real browser and enriches
//! each discovered entity with a contact email from its own website.
//!
//! The layer is declarative at the edges: each directory is described by a
//! TOML source file (entry URL, pagination, CSS selectors) and the email
//! filter's deny-lists are configurable. The walk itself is defensive:
//! empty pages terminate a listing, unparseable pages are tolerated until
//! two arrive in a row, and every run writes an audit row whether it
//! finishes, fails, or is cancelled.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod emails;
pub mod error;
pub mod extractor;
pub mod listing;
pub mod session;
pub mod source;

pub use emails::EmailFilter;
pub use error::{Result, ScrapeError};
pub use extractor::{ContactExtractor, ContactOutcome};
pub use listing::{DirectoryListScraper, EntityStub};
pub use session::{run_directory_layer, ScrapeProgress, ScrapeSession};
pub use source::{load_source, load_sources, DirectorySource};
