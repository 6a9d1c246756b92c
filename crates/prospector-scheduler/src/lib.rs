//! Prospector Scheduler
//!
//! Runs the directory and contract layers on independent intervals. Each
//! layer runs immediately at startup (configurable), overlapping ticks are
//! skipped with a log line rather than queued, and shutdown waits for
//! whatever is in flight.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod scheduler;

pub use scheduler::{ScheduledTask, Scheduler};
