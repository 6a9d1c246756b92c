//! Paginated listing walker.
//!
//! [`DirectoryListScraper`] pulls one listing page at a time, parsing entity
//! cards with the source's CSS selectors. An empty page ends the walk; a
//! page whose cards can't be parsed counts toward a failure streak, and two
//! unparseable pages in a row escalate to
//! [`ScrapeError::StructureChanged`].

use std::time::Duration;

use prospector_browser::PageFetcher;
use scraper::{ElementRef, Html, Selector};

use crate::error::{Result, ScrapeError};
use crate::source::DirectorySource;

/// How many unparseable pages in a row mean the markup changed rather than
/// one page being broken.
const STRUCTURE_FAILURE_STREAK: u32 = 2;

/// One entity pulled off a listing card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityStub {
    /// Display name from the card
    pub name: String,
    /// Absolute URL of the entity's directory profile
    pub profile_url: String,
    /// Absolute URL of the entity's own website, when exposed
    pub website_url: Option<String>,
}

/// Walks a directory listing page by page.
pub struct DirectoryListScraper<'a, F: PageFetcher + ?Sized> {
    fetcher: &'a F,
    source: &'a DirectorySource,
    nav_timeout: Duration,
    page: u32,
    consecutive_failures: u32,
    done: bool,
}

impl<'a, F: PageFetcher + ?Sized> DirectoryListScraper<'a, F> {
    /// Start a walk at page 1.
    pub fn new(fetcher: &'a F, source: &'a DirectorySource, nav_timeout: Duration) -> Self {
        Self {
            fetcher,
            source,
            nav_timeout,
            page: 1,
            consecutive_failures: 0,
            done: false,
        }
    }

    /// The page number the next call will fetch (1-based).
    #[must_use]
    pub fn current_page(&self) -> u32 {
        self.page
    }

    /// Fetch and parse the next listing page.
    ///
    /// Returns `None` once the listing is exhausted (an empty page or the
    /// configured page cap). An unparseable page yields an empty batch so
    /// the walk continues; the caller just calls again.
    ///
    /// # Errors
    /// Propagates browser failures, and returns
    /// `ScrapeError::StructureChanged` after two unparseable pages in a
    /// row.
    pub async fn next_page(&mut self) -> Result<Option<Vec<EntityStub>>> {
        if self.done {
            return Ok(None);
        }
        if self.page > self.source.pagination.max_pages {
            tracing::info!(
                source = %self.source.source.id,
                max_pages = self.source.pagination.max_pages,
                "Page cap reached"
            );
            self.done = true;
            return Ok(None);
        }

        let url = self.source.page_url(self.page);
        let html = self.fetcher.fetch_page(&url, self.nav_timeout).await?;
        let page = self.page;
        self.page += 1;

        match parse_listing(&html, self.source) {
            ParseOutcome::Entities(stubs) => {
                self.consecutive_failures = 0;
                tracing::debug!(
                    source = %self.source.source.id,
                    page,
                    entities = stubs.len(),
                    "Parsed listing page"
                );
                Ok(Some(stubs))
            }
            ParseOutcome::Empty => {
                tracing::info!(source = %self.source.source.id, page, "Empty page, listing exhausted");
                self.done = true;
                Ok(None)
            }
            ParseOutcome::Unparseable => {
                self.consecutive_failures += 1;
                tracing::warn!(
                    source = %self.source.source.id,
                    page,
                    streak = self.consecutive_failures,
                    "Listing page did not parse"
                );

                if self.consecutive_failures >= STRUCTURE_FAILURE_STREAK {
                    self.done = true;
                    return Err(ScrapeError::StructureChanged {
                        source_name: self.source.source.id.to_string(),
                        consecutive: self.consecutive_failures,
                    });
                }
                Ok(Some(Vec::new()))
            }
        }
    }
}

enum ParseOutcome {
    /// Cards found and at least one yielded an entity
    Entities(Vec<EntityStub>),
    /// No cards at all: the listing ran out
    Empty,
    /// Cards present but none yielded the required fields
    Unparseable,
}

/// Parse one listing page into entity stubs.
fn parse_listing(html: &str, source: &DirectorySource) -> ParseOutcome {
    // Selectors were validated when the source file loaded
    let Ok(card_sel) = Selector::parse(&source.selectors.card) else {
        return ParseOutcome::Unparseable;
    };
    let Ok(name_sel) = Selector::parse(&source.selectors.name) else {
        return ParseOutcome::Unparseable;
    };
    let Ok(profile_sel) = Selector::parse(&source.selectors.profile_url) else {
        return ParseOutcome::Unparseable;
    };
    let website_sel = source
        .selectors
        .website_url
        .as_deref()
        .and_then(|raw| Selector::parse(raw).ok());

    let document = Html::parse_document(html);
    let cards: Vec<ElementRef<'_>> = document.select(&card_sel).collect();
    if cards.is_empty() {
        return ParseOutcome::Empty;
    }

    let base = url::Url::parse(&source.source.base_url).ok();
    let mut stubs = Vec::with_capacity(cards.len());

    for card in &cards {
        let Some(name) = card
            .select(&name_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|name| !name.is_empty())
        else {
            continue;
        };

        let Some(profile_url) = card
            .select(&profile_sel)
            .next()
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| absolutize(base.as_ref(), href))
        else {
            continue;
        };

        let website_url = website_sel.as_ref().and_then(|sel| {
            card.select(sel)
                .next()
                .and_then(|el| el.value().attr("href"))
                .and_then(|href| absolutize(base.as_ref(), href))
        });

        stubs.push(EntityStub {
            name,
            profile_url,
            website_url,
        });
    }

    if stubs.is_empty() {
        // Cards matched but none had a name and profile link: the
        // directory restructured its card internals
        ParseOutcome::Unparseable
    } else {
        ParseOutcome::Entities(stubs)
    }
}

/// Resolve an href against the listing's base URL.
fn absolutize(base: Option<&url::Url>, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    base?.join(href).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use prospector_browser::{BrowserError, PageFetcher};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a fixed sequence of pages, one per fetch.
    struct SequenceFetcher {
        pages: Vec<String>,
        cursor: AtomicUsize,
    }

    impl SequenceFetcher {
        fn new(pages: Vec<&str>) -> Self {
            Self {
                pages: pages.into_iter().map(String::from).collect(),
                cursor: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for SequenceFetcher {
        async fn fetch_page(
            &self,
            url: &str,
            _timeout: Duration,
        ) -> prospector_browser::Result<String> {
            let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
            self.pages
                .get(idx)
                .cloned()
                .ok_or_else(|| BrowserError::Navigation(format!("no page for {url}")))
        }
    }

    fn test_source() -> DirectorySource {
        toml::from_str(
            r#"
            [source]
            id = "sortlist"
            name = "Sortlist"
            base_url = "https://directory.example/agencies"

            [pagination]
            max_pages = 10

            [selectors]
            card = "div.card"
            name = "h3"
            profile_url = "a.profile"
            website_url = "a.website"
        "#,
        )
        .expect("parse test source")
    }

    fn listing_page(entries: &[(&str, &str, Option<&str>)]) -> String {
        let cards: String = entries
            .iter()
            .map(|(name, profile, website)| {
                let website_html = website
                    .map(|w| format!(r#"<a class="website" href="{w}">site</a>"#))
                    .unwrap_or_default();
                format!(
                    r#"<div class="card"><h3>{name}</h3><a class="profile" href="{profile}">profile</a>{website_html}</div>"#
                )
            })
            .collect();
        format!("<html><body>{cards}</body></html>")
    }

    const EMPTY_PAGE: &str = "<html><body><p>No more results</p></body></html>";
    const BROKEN_PAGE: &str =
        r#"<html><body><div class="card"><span>renamed markup</span></div></body></html>"#;

    #[tokio::test]
    async fn test_walk_until_empty_page() {
        let fetcher = SequenceFetcher::new(vec![
            &listing_page(&[
                ("Acme Media", "/agency/acme", Some("https://acme.example")),
                ("Bolt Digital", "/agency/bolt", None),
            ]),
            &listing_page(&[("Core Studio", "/agency/core", None)]),
            EMPTY_PAGE,
        ]);
        let source = test_source();
        let mut scraper = DirectoryListScraper::new(&fetcher, &source, Duration::from_secs(5));

        let first = scraper.next_page().await.expect("page 1").expect("some");
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].name, "Acme Media");
        assert_eq!(
            first[0].profile_url,
            "https://directory.example/agency/acme"
        );
        assert_eq!(first[0].website_url.as_deref(), Some("https://acme.example"));

        let second = scraper.next_page().await.expect("page 2").expect("some");
        assert_eq!(second.len(), 1);

        assert!(scraper.next_page().await.expect("page 3").is_none());
        // Exhausted walks stay exhausted
        assert!(scraper.next_page().await.expect("after end").is_none());
    }

    #[tokio::test]
    async fn test_single_broken_page_is_tolerated() {
        let fetcher = SequenceFetcher::new(vec![
            &listing_page(&[("Acme Media", "/agency/acme", None)]),
            BROKEN_PAGE,
            &listing_page(&[("Core Studio", "/agency/core", None)]),
            EMPTY_PAGE,
        ]);
        let source = test_source();
        let mut scraper = DirectoryListScraper::new(&fetcher, &source, Duration::from_secs(5));

        assert_eq!(scraper.next_page().await.expect("page 1").expect("some").len(), 1);
        // Broken page yields an empty batch, not an error
        assert!(scraper
            .next_page()
            .await
            .expect("page 2")
            .expect("some")
            .is_empty());
        assert_eq!(scraper.next_page().await.expect("page 3").expect("some").len(), 1);
        assert!(scraper.next_page().await.expect("page 4").is_none());
    }

    #[tokio::test]
    async fn test_two_consecutive_broken_pages_escalate() {
        let fetcher = SequenceFetcher::new(vec![
            &listing_page(&[("Acme Media", "/agency/acme", None)]),
            BROKEN_PAGE,
            BROKEN_PAGE,
        ]);
        let source = test_source();
        let mut scraper = DirectoryListScraper::new(&fetcher, &source, Duration::from_secs(5));

        scraper.next_page().await.expect("page 1");
        scraper.next_page().await.expect("page 2");

        let err = scraper.next_page().await.expect_err("should escalate");
        assert!(matches!(
            err,
            ScrapeError::StructureChanged { consecutive: 2, .. }
        ));
        // The scraper is finished after escalating
        assert!(scraper.next_page().await.expect("after error").is_none());
    }

    #[tokio::test]
    async fn test_page_cap_ends_walk() {
        let page = listing_page(&[("Acme Media", "/agency/acme", None)]);
        let fetcher = SequenceFetcher::new(vec![&page, &page, &page, &page]);
        let mut source = test_source();
        source.pagination.max_pages = 2;
        let mut scraper = DirectoryListScraper::new(&fetcher, &source, Duration::from_secs(5));

        assert!(scraper.next_page().await.expect("page 1").is_some());
        assert!(scraper.next_page().await.expect("page 2").is_some());
        assert!(scraper.next_page().await.expect("cap").is_none());
    }

    #[tokio::test]
    async fn test_browser_errors_propagate() {
        let fetcher = SequenceFetcher::new(vec![]);
        let source = test_source();
        let mut scraper = DirectoryListScraper::new(&fetcher, &source, Duration::from_secs(5));

        let err = scraper.next_page().await.expect_err("fetch should fail");
        assert!(matches!(err, ScrapeError::Browser(_)));
    }
}
