//! Directory scrape orchestration.
//!
//! A [`ScrapeSession`] owns one directory-layer run: it launches a browser,
//! walks every configured source, discovers contact emails, and upserts
//! entities as it goes. Progress is published on a watch channel and the
//! run stops cleanly at the next entity boundary when cancelled; everything
//! persisted up to that point stays persisted.

use std::time::Duration;

use prospector_browser::{BrowserSession, PageFetcher};
use prospector_core::{AppConfig, EmailStatus, RunLayer, RunStatus, RunSummary};
use prospector_db::entities::{self, NewEntity};
use prospector_db::run_log;
use sqlx::SqlitePool;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::emails::EmailFilter;
use crate::error::{Result, ScrapeError};
use crate::extractor::ContactExtractor;
use crate::listing::DirectoryListScraper;
use crate::source::DirectorySource;

/// Live progress of a directory run.
#[derive(Debug, Clone, Default)]
pub struct ScrapeProgress {
    /// Source currently being walked
    pub source: Option<String>,
    /// Listing page most recently parsed
    pub page: u32,
    /// Entities stored so far
    pub entities: u64,
    /// Entities whose contact email was found
    pub emails_found: u64,
}

/// A running directory-layer job.
pub struct ScrapeSession {
    cancel: CancellationToken,
    progress: watch::Receiver<ScrapeProgress>,
    handle: tokio::task::JoinHandle<Result<RunSummary>>,
}

impl ScrapeSession {
    /// Spawn a directory run on the tokio runtime.
    ///
    /// The session inherits cancellation from `parent`, so shutting the
    /// scheduler down stops the scrape too.
    #[must_use]
    pub fn spawn(
        config: AppConfig,
        pool: SqlitePool,
        sources: Vec<DirectorySource>,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let (tx, rx) = watch::channel(ScrapeProgress::default());
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            run_directory_layer(&config, &pool, &sources, &task_cancel, &tx).await
        });

        Self {
            cancel,
            progress: rx,
            handle,
        }
    }

    /// Ask the run to stop at the next entity boundary.
    pub fn request_stop(&self) {
        self.cancel.cancel();
    }

    /// A receiver for progress updates.
    #[must_use]
    pub fn progress(&self) -> watch::Receiver<ScrapeProgress> {
        self.progress.clone()
    }

    /// Wait for the run to finish and return its summary.
    ///
    /// # Errors
    /// Returns the run's own error, or `ScrapeError::TaskFailed` if the
    /// task panicked.
    pub async fn join(self) -> Result<RunSummary> {
        self.handle
            .await
            .map_err(|e| ScrapeError::TaskFailed(e.to_string()))?
    }
}

/// Execute one directory run with a real browser session.
///
/// # Errors
/// Returns an error on browser launch failure or a storage failure; the
/// run-audit row is written either way.
pub async fn run_directory_layer(
    config: &AppConfig,
    pool: &SqlitePool,
    sources: &[DirectorySource],
    cancel: &CancellationToken,
    progress: &watch::Sender<ScrapeProgress>,
) -> Result<RunSummary> {
    let run_id = run_log::start_run(pool, RunLayer::Directory).await?;
    tracing::info!(run_id, sources = sources.len(), "Directory scrape started");

    let browser = match BrowserSession::open(&config.browser).await {
        Ok(browser) => browser,
        Err(e) => {
            tracing::error!(error = %e, "Browser failed to start");
            run_log::finish_run(pool, run_id, 0, 0, RunStatus::Failed, Some(&e.to_string()))
                .await?;
            return Err(e.into());
        }
    };

    let result = scrape_sources(&browser, config, pool, sources, cancel, progress).await;

    if let Err(e) = browser.close().await {
        tracing::warn!(error = %e, "Browser did not close cleanly");
    }

    finish(pool, run_id, result).await
}

/// Execute one directory run against an arbitrary page fetcher.
///
/// The browser-free entry point: [`run_directory_layer`] wraps it with a
/// real [`BrowserSession`].
///
/// # Errors
/// Returns an error on storage failure; the run-audit row is written either
/// way.
pub async fn run_with_fetcher<F: PageFetcher + ?Sized>(
    fetcher: &F,
    config: &AppConfig,
    pool: &SqlitePool,
    sources: &[DirectorySource],
    cancel: &CancellationToken,
    progress: &watch::Sender<ScrapeProgress>,
) -> Result<RunSummary> {
    let run_id = run_log::start_run(pool, RunLayer::Directory).await?;
    let result = scrape_sources(fetcher, config, pool, sources, cancel, progress).await;
    finish(pool, run_id, result).await
}

struct SessionOutcome {
    items: u64,
    errors: u64,
    emails_found: u64,
    status: RunStatus,
    reason: Option<String>,
}

async fn finish(
    pool: &SqlitePool,
    run_id: i64,
    result: Result<SessionOutcome>,
) -> Result<RunSummary> {
    match result {
        Ok(outcome) => {
            run_log::finish_run(
                pool,
                run_id,
                outcome.items,
                outcome.errors,
                outcome.status,
                outcome.reason.as_deref(),
            )
            .await?;

            tracing::info!(
                run_id,
                items = outcome.items,
                errors = outcome.errors,
                emails_found = outcome.emails_found,
                status = %outcome.status,
                "Directory scrape finished"
            );

            Ok(RunSummary {
                items: outcome.items,
                errors: outcome.errors,
                status: outcome.status,
            })
        }
        Err(e) => {
            run_log::finish_run(pool, run_id, 0, 0, RunStatus::Failed, Some(&e.to_string()))
                .await?;
            tracing::error!(run_id, error = %e, "Directory scrape failed");
            Err(e)
        }
    }
}

/// Walk every source, storing entities as they are discovered.
///
/// A structure change in one source is counted and the walk moves on to the
/// next source; only storage failures abort the run.
async fn scrape_sources<F: PageFetcher + ?Sized>(
    fetcher: &F,
    config: &AppConfig,
    pool: &SqlitePool,
    sources: &[DirectorySource],
    cancel: &CancellationToken,
    progress: &watch::Sender<ScrapeProgress>,
) -> Result<SessionOutcome> {
    let nav_timeout = Duration::from_secs(config.browser.navigation_timeout_secs);
    let filter = EmailFilter::from_config(&config.email_filter);
    let extractor = ContactExtractor::new(fetcher, &filter, &config.contact, nav_timeout);

    let mut state = ScrapeProgress::default();
    let mut errors = 0u64;

    'sources: for source in sources {
        if cancel.is_cancelled() {
            return Ok(cancelled_outcome(&state, errors));
        }

        state.source = Some(source.source.id.to_string());
        state.page = 0;
        let _ = progress.send(state.clone());

        let mut scraper = DirectoryListScraper::new(fetcher, source, nav_timeout);

        loop {
            if cancel.is_cancelled() {
                return Ok(cancelled_outcome(&state, errors));
            }

            let stubs = match scraper.next_page().await {
                Ok(Some(stubs)) => stubs,
                Ok(None) => break,
                Err(e @ ScrapeError::StructureChanged { .. }) => {
                    tracing::warn!(source = %source.source.id, error = %e, "Moving to next source");
                    errors += 1;
                    continue 'sources;
                }
                Err(ScrapeError::Browser(e)) => {
                    tracing::warn!(source = %source.source.id, error = %e, "Listing page failed to load");
                    errors += 1;
                    continue 'sources;
                }
                Err(e) => return Err(e),
            };

            state.page = scraper.current_page() - 1;
            let _ = progress.send(state.clone());

            for stub in stubs {
                if cancel.is_cancelled() {
                    return Ok(cancelled_outcome(&state, errors));
                }

                let contact = match &stub.website_url {
                    Some(website) => extractor.discover(website).await,
                    None => crate::extractor::ContactOutcome {
                        status: EmailStatus::NotFound,
                        email: None,
                        all_emails: Vec::new(),
                    },
                };

                let entity = NewEntity {
                    source: source.source.id.to_string(),
                    name: stub.name,
                    category: source.source.category.clone(),
                    profile_url: stub.profile_url,
                    website_url: stub.website_url,
                    email: contact.email,
                    email_status: contact.status,
                };
                entities::upsert_entity(pool, &entity).await?;

                state.entities += 1;
                if contact.status == EmailStatus::Found {
                    state.emails_found += 1;
                }
                let _ = progress.send(state.clone());

                if config.request.delay_seconds > 0 {
                    tokio::time::sleep(Duration::from_secs(config.request.delay_seconds)).await;
                }
            }
        }
    }

    Ok(SessionOutcome {
        items: state.entities,
        errors,
        emails_found: state.emails_found,
        status: RunStatus::Completed,
        reason: None,
    })
}

fn cancelled_outcome(state: &ScrapeProgress, errors: u64) -> SessionOutcome {
    tracing::info!(
        entities = state.entities,
        "Shutdown requested, stopping directory scrape"
    );
    SessionOutcome {
        items: state.entities,
        errors,
        emails_found: state.emails_found,
        status: RunStatus::Completed,
        reason: Some("shutdown".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use prospector_browser::BrowserError;
    use prospector_db::Database;
    use std::collections::HashMap;

    /// Serves canned pages by URL; unknown URLs fail like a dead site.
    struct MapFetcher {
        pages: HashMap<String, String>,
    }

    impl MapFetcher {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, html)| ((*url).to_string(), (*html).to_string()))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for MapFetcher {
        async fn fetch_page(
            &self,
            url: &str,
            _timeout: Duration,
        ) -> prospector_browser::Result<String> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| BrowserError::Navigation(format!("unreachable: {url}")))
        }
    }

    /// Serves the same listing page forever, slowly. Only cancellation can
    /// end a walk against it.
    struct EndlessFetcher;

    #[async_trait]
    impl PageFetcher for EndlessFetcher {
        async fn fetch_page(
            &self,
            _url: &str,
            _timeout: Duration,
        ) -> prospector_browser::Result<String> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(r#"<html><body>
                <div class="card"><h3>Endless Co</h3>
                <a class="profile" href="/agency/endless">profile</a></div>
            </body></html>"#
                .to_string())
        }
    }

    fn test_source(id: &str, base_url: &str) -> DirectorySource {
        toml::from_str(&format!(
            r#"
            [source]
            id = "{id}"
            name = "Test Directory"
            base_url = "{base_url}"
            category = "advertising"

            [pagination]
            max_pages = 1000

            [selectors]
            card = "div.card"
            name = "h3"
            profile_url = "a.profile"
            website_url = "a.website"
        "#
        ))
        .expect("parse test source")
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.request.delay_seconds = 0;
        config
    }

    async fn test_db() -> Database {
        let db = Database::open(":memory:").await.expect("open database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    const LISTING: &str = r#"<html><body>
        <div class="card"><h3>Acme Media</h3>
            <a class="profile" href="/agency/acme">profile</a>
            <a class="website" href="https://acme.example">site</a></div>
        <div class="card"><h3>Bolt Digital</h3>
            <a class="profile" href="/agency/bolt">profile</a></div>
    </body></html>"#;

    const EMPTY: &str = "<html><body><p>Nothing here</p></body></html>";

    #[tokio::test]
    async fn test_run_persists_entities_and_emails() {
        let fetcher = MapFetcher::new(&[
            ("https://dir.example/agencies", LISTING),
            ("https://dir.example/agencies?page=2", EMPTY),
            (
                "https://acme.example",
                r#"<html><body><a href="mailto:info@acme.example">mail</a></body></html>"#,
            ),
        ]);
        let db = test_db().await;
        let sources = vec![test_source("sortlist", "https://dir.example/agencies")];
        let (tx, _rx) = watch::channel(ScrapeProgress::default());

        let summary = run_with_fetcher(
            &fetcher,
            &test_config(),
            db.pool(),
            &sources,
            &CancellationToken::new(),
            &tx,
        )
        .await
        .expect("run directory layer");

        assert_eq!(summary.items, 2);
        assert_eq!(summary.status, RunStatus::Completed);

        let acme = entities::get_entity(
            db.pool(),
            "sortlist",
            "https://dir.example/agency/acme",
        )
        .await
        .expect("get entity");
        assert_eq!(acme.email.as_deref(), Some("info@acme.example"));
        assert_eq!(acme.email_status, EmailStatus::Found);

        // Entity without a website gets not_found, not unreachable
        let bolt = entities::get_entity(
            db.pool(),
            "sortlist",
            "https://dir.example/agency/bolt",
        )
        .await
        .expect("get entity");
        assert_eq!(bolt.email_status, EmailStatus::NotFound);

        let runs = run_log::recent_runs(db.pool(), 5).await.expect("runs");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].items, 2);
    }

    #[tokio::test]
    async fn test_full_walk_counts_every_entity() {
        let mut pages: HashMap<String, String> = HashMap::new();
        for page in 1..=3u32 {
            let cards: String = (0..20)
                .map(|i| {
                    let n = (page - 1) * 20 + i;
                    format!(
                        r#"<div class="card"><h3>Agency {n}</h3><a class="profile" href="/agency/{n}">profile</a></div>"#
                    )
                })
                .collect();
            let url = if page == 1 {
                "https://dir.example/agencies".to_string()
            } else {
                format!("https://dir.example/agencies?page={page}")
            };
            pages.insert(url, format!("<html><body>{cards}</body></html>"));
        }
        pages.insert(
            "https://dir.example/agencies?page=4".to_string(),
            EMPTY.to_string(),
        );
        let fetcher = MapFetcher { pages };

        let db = test_db().await;
        let sources = vec![test_source("sortlist", "https://dir.example/agencies")];
        let (tx, _rx) = watch::channel(ScrapeProgress::default());

        let summary = run_with_fetcher(
            &fetcher,
            &test_config(),
            db.pool(),
            &sources,
            &CancellationToken::new(),
            &tx,
        )
        .await
        .expect("run directory layer");

        assert_eq!(summary.items, 60);
        assert_eq!(summary.errors, 0);

        let count = entities::count_entities(db.pool(), Some("sortlist"))
            .await
            .expect("count entities");
        assert_eq!(count, 60);

        let runs = run_log::recent_runs(db.pool(), 1).await.expect("runs");
        assert_eq!(runs[0].items, 60);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let fetcher = MapFetcher::new(&[
            ("https://dir.example/agencies", LISTING),
            ("https://dir.example/agencies?page=2", EMPTY),
        ]);
        let db = test_db().await;
        let sources = vec![test_source("sortlist", "https://dir.example/agencies")];
        let (tx, _rx) = watch::channel(ScrapeProgress::default());
        let config = test_config();

        for _ in 0..2 {
            run_with_fetcher(
                &fetcher,
                &config,
                db.pool(),
                &sources,
                &CancellationToken::new(),
                &tx,
            )
            .await
            .expect("run directory layer");
        }

        let count = entities::count_entities(db.pool(), Some("sortlist"))
            .await
            .expect("count entities");
        assert_eq!(count, 2, "re-scrape must not duplicate entities");

        let runs = run_log::recent_runs(db.pool(), 5).await.expect("runs");
        assert_eq!(runs.len(), 2, "each execution gets its own audit row");
    }

    #[tokio::test]
    async fn test_structure_change_moves_to_next_source() {
        const BROKEN: &str =
            r#"<html><body><div class="card"><span>renamed</span></div></body></html>"#;
        let fetcher = MapFetcher::new(&[
            ("https://broken.example/list", BROKEN),
            ("https://broken.example/list?page=2", BROKEN),
            ("https://good.example/list", LISTING),
            ("https://good.example/list?page=2", EMPTY),
        ]);
        let db = test_db().await;
        let sources = vec![
            test_source("broken-dir", "https://broken.example/list"),
            test_source("good-dir", "https://good.example/list"),
        ];
        let (tx, _rx) = watch::channel(ScrapeProgress::default());

        let summary = run_with_fetcher(
            &fetcher,
            &test_config(),
            db.pool(),
            &sources,
            &CancellationToken::new(),
            &tx,
        )
        .await
        .expect("run directory layer");

        assert_eq!(summary.errors, 1);
        assert_eq!(summary.items, 2);
        assert_eq!(summary.status, RunStatus::Completed);

        let count = entities::count_entities(db.pool(), Some("good-dir"))
            .await
            .expect("count entities");
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_cancellation_stops_promptly_and_keeps_partials() {
        let db = test_db().await;
        let sources = vec![test_source("endless", "https://endless.example/list")];
        let cancel = CancellationToken::new();
        let (tx, mut rx) = watch::channel(ScrapeProgress::default());

        let pool = db.pool().clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            run_with_fetcher(&EndlessFetcher, &test_config(), &pool, &sources, &task_cancel, &tx)
                .await
        });

        // Wait until at least one entity has landed, then cancel
        loop {
            rx.changed().await.expect("progress channel open");
            if rx.borrow().entities >= 1 {
                break;
            }
        }
        cancel.cancel();

        let summary = handle
            .await
            .expect("task joins")
            .expect("run ends cleanly");
        assert_eq!(summary.status, RunStatus::Completed);
        assert!(summary.items >= 1);

        let stored = entities::count_entities(db.pool(), Some("endless"))
            .await
            .expect("count entities");
        assert!(stored >= 1, "work done before cancellation is kept");

        let runs = run_log::recent_runs(db.pool(), 1).await.expect("runs");
        assert_eq!(runs[0].reason.as_deref(), Some("shutdown"));
        assert!(runs[0].finished_at.is_some());
    }

    #[tokio::test]
    async fn test_progress_observer_sees_counts() {
        let fetcher = MapFetcher::new(&[
            ("https://dir.example/agencies", LISTING),
            ("https://dir.example/agencies?page=2", EMPTY),
        ]);
        let db = test_db().await;
        let sources = vec![test_source("sortlist", "https://dir.example/agencies")];
        let (tx, rx) = watch::channel(ScrapeProgress::default());

        run_with_fetcher(
            &fetcher,
            &test_config(),
            db.pool(),
            &sources,
            &CancellationToken::new(),
            &tx,
        )
        .await
        .expect("run directory layer");

        let last = rx.borrow();
        assert_eq!(last.entities, 2);
        assert_eq!(last.source.as_deref(), Some("sortlist"));
    }
}
