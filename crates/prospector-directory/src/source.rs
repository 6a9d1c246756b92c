//! Declarative directory source definitions.
//!
//! Each supported directory is described by a TOML file: where the listing
//! lives, how it paginates, and the CSS selectors that locate entity cards.
//! Onboarding a new directory is a data change, not a code change.

use std::path::Path;

use prospector_core::SourceId;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrapeError};

/// A complete directory source definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySource {
    /// Identity and entry point
    pub source: SourceInfo,
    /// Pagination behavior
    #[serde(default)]
    pub pagination: PaginationInfo,
    /// CSS selectors locating entity data on a listing page
    pub selectors: SelectorSet,
}

/// Identity block of a source definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Stable identifier, also the `entities.source` column value
    pub id: SourceId,
    /// Human-readable directory name
    pub name: String,
    /// First listing page URL
    pub base_url: String,
    /// Category label stored with every entity from this source
    #[serde(default)]
    pub category: Option<String>,
}

/// How the listing paginates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationInfo {
    /// Query parameter carrying the page number
    pub page_param: String,
    /// Hard cap on pages walked per run
    pub max_pages: u32,
}

impl Default for PaginationInfo {
    fn default() -> Self {
        Self {
            page_param: "page".to_string(),
            max_pages: 50,
        }
    }
}

/// CSS selectors for one listing layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorSet {
    /// Selects one element per entity card
    pub card: String,
    /// Selects the name element within a card
    pub name: String,
    /// Selects the anchor holding the directory profile link
    pub profile_url: String,
    /// Selects the anchor holding the entity's own website, if the
    /// directory exposes one
    #[serde(default)]
    pub website_url: Option<String>,
}

impl DirectorySource {
    /// Validate the definition, collecting every problem found.
    ///
    /// # Errors
    /// Returns the list of per-field reasons when the definition is
    /// unusable.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut reasons = Vec::new();

        match url::Url::parse(&self.source.base_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => reasons.push(format!("base_url has scheme '{}'", parsed.scheme())),
            Err(e) => reasons.push(format!("base_url is not a valid URL: {e}")),
        }

        if self.pagination.max_pages == 0 {
            reasons.push("pagination.max_pages must be at least 1".to_string());
        }

        let mut check_selector = |field: &str, raw: &str| {
            if scraper::Selector::parse(raw).is_err() {
                reasons.push(format!("selectors.{field} is not a valid CSS selector"));
            }
        };
        check_selector("card", &self.selectors.card);
        check_selector("name", &self.selectors.name);
        check_selector("profile_url", &self.selectors.profile_url);
        if let Some(website) = &self.selectors.website_url {
            check_selector("website_url", website);
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(reasons)
        }
    }

    /// The URL of a given listing page (1-based).
    #[must_use]
    pub fn page_url(&self, page: u32) -> String {
        if page <= 1 {
            return self.source.base_url.clone();
        }
        let separator = if self.source.base_url.contains('?') {
            '&'
        } else {
            '?'
        };
        format!(
            "{}{}{}={}",
            self.source.base_url, separator, self.pagination.page_param, page
        )
    }
}

/// Load and validate one source definition from a TOML file.
///
/// # Errors
/// Returns `ScrapeError::InvalidSource` if the file doesn't parse or
/// validate.
pub fn load_source(path: impl AsRef<Path>) -> Result<DirectorySource> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)?;

    let source: DirectorySource = toml::from_str(&raw)
        .map_err(|e| ScrapeError::InvalidSource(format!("{}: {e}", path.display())))?;

    source
        .validate()
        .map_err(|reasons| ScrapeError::InvalidSource(reasons.join("; ")))?;

    Ok(source)
}

/// Load every `.toml` source definition in a directory.
///
/// Invalid files are logged and skipped so one bad definition doesn't take
/// the whole layer down.
///
/// # Errors
/// Returns an error only if the directory itself can't be read.
pub fn load_sources(dir: impl AsRef<Path>) -> Result<Vec<DirectorySource>> {
    let mut sources = Vec::new();

    for entry in std::fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }

        match load_source(&path) {
            Ok(source) => {
                tracing::info!(
                    source = %source.source.id,
                    path = %path.display(),
                    "Loaded directory source"
                );
                sources.push(source);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unusable source file");
            }
        }
    }

    sources.sort_by(|a, b| a.source.id.as_str().cmp(b.source.id.as_str()));
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [source]
        id = "sortlist"
        name = "Sortlist"
        base_url = "https://directory.example/agencies"
        category = "advertising"

        [pagination]
        page_param = "page"
        max_pages = 10

        [selectors]
        card = "div.agency-card"
        name = "h3.agency-name"
        profile_url = "a.profile-link"
        website_url = "a.website-link"
    "#;

    #[test]
    fn test_parse_sample() {
        let source: DirectorySource = toml::from_str(SAMPLE).expect("parse source");
        assert_eq!(source.source.id.as_str(), "sortlist");
        assert_eq!(source.pagination.max_pages, 10);
        assert!(source.validate().is_ok());
    }

    #[test]
    fn test_pagination_defaults() {
        let minimal = r#"
            [source]
            id = "clutch"
            name = "Clutch"
            base_url = "https://directory.example/firms"

            [selectors]
            card = "li.provider"
            name = "h3"
            profile_url = "a.provider-link"
        "#;
        let source: DirectorySource = toml::from_str(minimal).expect("parse source");
        assert_eq!(source.pagination.page_param, "page");
        assert_eq!(source.pagination.max_pages, 50);
        assert!(source.selectors.website_url.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_selector() {
        let mut source: DirectorySource = toml::from_str(SAMPLE).expect("parse source");
        source.selectors.card = "div[unclosed".to_string();
        let reasons = source.validate().expect_err("should be invalid");
        assert!(reasons[0].contains("selectors.card"));
    }

    #[test]
    fn test_page_url() {
        let source: DirectorySource = toml::from_str(SAMPLE).expect("parse source");
        assert_eq!(source.page_url(1), "https://directory.example/agencies");
        assert_eq!(
            source.page_url(3),
            "https://directory.example/agencies?page=3"
        );

        let mut with_query = source.clone();
        with_query.source.base_url = "https://directory.example/agencies?cat=ads".to_string();
        assert_eq!(
            with_query.page_url(2),
            "https://directory.example/agencies?cat=ads&page=2"
        );
    }

    #[test]
    fn test_load_sources_skips_invalid() {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(dir.path().join("good.toml"), SAMPLE).expect("write file");
        std::fs::write(dir.path().join("bad.toml"), "not toml at all [").expect("write file");
        std::fs::write(dir.path().join("notes.txt"), "ignored").expect("write file");

        let sources = load_sources(dir.path()).expect("load sources");
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].source.id.as_str(), "sortlist");
    }
}
