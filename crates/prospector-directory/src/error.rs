use thiserror::Error;

/// Result alias for directory-layer operations.
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Errors raised while scraping directories and entity websites.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Two consecutive listing pages failed to parse. Scattered failures
    /// are tolerated; a streak means the directory changed its markup and
    /// the source definition needs attention.
    #[error("listing structure changed for source '{source_name}' ({consecutive} consecutive pages unparseable)")]
    StructureChanged {
        /// The directory source affected
        source_name: String,
        /// Length of the failure streak
        consecutive: u32,
    },

    /// A source definition file is unusable.
    #[error("invalid source definition: {0}")]
    InvalidSource(String),

    #[error(transparent)]
    Browser(#[from] prospector_browser::BrowserError),

    #[error(transparent)]
    Database(#[from] prospector_db::DatabaseError),

    #[error("source file error: {0}")]
    Io(#[from] std::io::Error),

    /// The spawned scrape task ended without producing a result.
    #[error("scrape task failed: {0}")]
    TaskFailed(String),
}
