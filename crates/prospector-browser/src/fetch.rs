//! Page-fetching seam between the browser and the scraping layers.
//!
//! Scrapers depend on [`PageFetcher`] rather than on a concrete browser
//! session, so parsing and orchestration logic can run against canned HTML.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Fetches a fully rendered page and returns its HTML.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Load `url` and return the rendered document, waiting at most
    /// `timeout` for the page to settle.
    async fn fetch_page(&self, url: &str, timeout: Duration) -> Result<String>;
}

/// Extract the registrable host from a URL, if it has one.
///
/// Used to keep contact-page crawling on the entity's own site.
#[must_use]
pub fn extract_domain(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed.host_str().map(|h| {
        h.strip_prefix("www.")
            .unwrap_or(h)
            .to_ascii_lowercase()
    })
}
