use thiserror::Error;

/// Result alias for browser operations.
pub type Result<T> = std::result::Result<T, BrowserError>;

/// Errors raised by browser session management and navigation.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The browser did not finish starting within the configured window.
    /// Startup state is indeterminate afterwards; the session must not be
    /// reused and the same engine variant must not be retried in this job.
    #[error("browser failed to initialize within {seconds}s")]
    InitTimeout {
        /// Configured init window, in seconds
        seconds: u64,
    },

    #[error("unknown browser engine: {0}")]
    UnknownEngine(String),

    #[error("chromium error: {0}")]
    Chromium(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("timeout loading: {0}")]
    Timeout(String),
}
