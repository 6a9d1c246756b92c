//! Contact-email discovery on entity websites.
//!
//! Visits the home page first, harvesting `mailto:` links and email-shaped
//! text. If nothing acceptable turns up, a bounded number of same-domain
//! pages whose links look contact-related are tried. The whole visit runs
//! under a wall-clock budget so one slow site can't stall a scrape run.

use std::time::Duration;

use prospector_browser::{extract_domain, PageFetcher};
use prospector_core::{ContactConfig, EmailStatus};
use regex::Regex;
use scraper::{Html, Selector};

use crate::emails::EmailFilter;

/// Result of contact discovery for one entity.
#[derive(Debug, Clone)]
pub struct ContactOutcome {
    /// Terminal status of the attempt
    pub status: EmailStatus,
    /// The chosen email, when one was found
    pub email: Option<String>,
    /// Every acceptable candidate seen, in harvest order
    pub all_emails: Vec<String>,
}

impl ContactOutcome {
    fn unreachable() -> Self {
        Self {
            status: EmailStatus::Unreachable,
            email: None,
            all_emails: Vec::new(),
        }
    }
}

/// Discovers contact emails on entity websites.
pub struct ContactExtractor<'a, F: PageFetcher + ?Sized> {
    fetcher: &'a F,
    filter: &'a EmailFilter,
    config: &'a ContactConfig,
    nav_timeout: Duration,
    link_pattern: Option<Regex>,
}

impl<'a, F: PageFetcher + ?Sized> ContactExtractor<'a, F> {
    /// Build an extractor. An unparseable `link_pattern` disables the
    /// extra-page crawl rather than failing the run.
    pub fn new(
        fetcher: &'a F,
        filter: &'a EmailFilter,
        config: &'a ContactConfig,
        nav_timeout: Duration,
    ) -> Self {
        let link_pattern = match Regex::new(&config.link_pattern) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!(error = %e, "contact.link_pattern does not compile, home page only");
                None
            }
        };

        Self {
            fetcher,
            filter,
            config,
            nav_timeout,
            link_pattern,
        }
    }

    /// Attempt contact discovery for one website.
    ///
    /// Never fails the scrape: fetch errors and budget exhaustion map to
    /// `EmailStatus::Unreachable`, an email-less site to
    /// `EmailStatus::NotFound`.
    pub async fn discover(&self, website_url: &str) -> ContactOutcome {
        let budget = Duration::from_secs(self.config.budget_seconds);

        match tokio::time::timeout(budget, self.crawl(website_url)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::debug!(url = website_url, "Contact discovery budget exhausted");
                ContactOutcome::unreachable()
            }
        }
    }

    async fn crawl(&self, website_url: &str) -> ContactOutcome {
        let home = match self.fetcher.fetch_page(website_url, self.nav_timeout).await {
            Ok(html) => html,
            Err(e) => {
                tracing::debug!(url = website_url, error = %e, "Site unreachable");
                return ContactOutcome::unreachable();
            }
        };

        let mut candidates = harvest_emails(&home);
        if let Some(best) = self.filter.pick_best(&candidates) {
            return self.found(best, candidates);
        }

        let domain = extract_domain(website_url);
        let contact_links = match (&self.link_pattern, &domain) {
            (Some(pattern), Some(domain)) => {
                find_contact_links(&home, pattern, domain, website_url)
            }
            _ => Vec::new(),
        };

        for link in contact_links.into_iter().take(self.config.max_extra_pages) {
            match self.fetcher.fetch_page(&link, self.nav_timeout).await {
                Ok(html) => {
                    for email in harvest_emails(&html) {
                        if !candidates.contains(&email) {
                            candidates.push(email);
                        }
                    }
                    if let Some(best) = self.filter.pick_best(&candidates) {
                        return self.found(best, candidates);
                    }
                }
                Err(e) => {
                    tracing::debug!(url = link, error = %e, "Contact page unreachable");
                }
            }
        }

        ContactOutcome {
            status: EmailStatus::NotFound,
            email: None,
            all_emails: self.acceptable(candidates),
        }
    }

    fn found(&self, best: String, candidates: Vec<String>) -> ContactOutcome {
        ContactOutcome {
            status: EmailStatus::Found,
            email: Some(best),
            all_emails: self.acceptable(candidates),
        }
    }

    fn acceptable(&self, candidates: Vec<String>) -> Vec<String> {
        candidates
            .into_iter()
            .filter(|email| self.filter.is_acceptable(email))
            .collect()
    }
}

/// Pull email candidates from a page: `mailto:` hrefs first, then
/// email-shaped text anywhere in the document.
fn harvest_emails(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut candidates = Vec::new();

    if let Ok(anchor_sel) = Selector::parse("a[href^='mailto:']") {
        for anchor in document.select(&anchor_sel) {
            if let Some(href) = anchor.value().attr("href") {
                let address = href
                    .trim_start_matches("mailto:")
                    .split('?')
                    .next()
                    .unwrap_or_default()
                    .to_lowercase();
                if !address.is_empty() && !candidates.contains(&address) {
                    candidates.push(address);
                }
            }
        }
    }

    let text: String = document.root_element().text().collect::<Vec<_>>().join(" ");
    for email in crate::emails::extract_candidates(&text) {
        if !candidates.contains(&email) {
            candidates.push(email);
        }
    }

    candidates
}

/// Find same-domain links that look contact-related, by link text or href.
fn find_contact_links(html: &str, pattern: &Regex, domain: &str, page_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(anchor_sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let base = url::Url::parse(page_url).ok();

    let mut links = Vec::new();
    for anchor in document.select(&anchor_sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if href.starts_with("mailto:") || href.starts_with('#') {
            continue;
        }

        let text: String = anchor.text().collect::<String>();
        if !pattern.is_match(&text) && !pattern.is_match(href) {
            continue;
        }

        let absolute = if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            match base.as_ref().and_then(|b| b.join(href).ok()) {
                Some(joined) => joined.to_string(),
                None => continue,
            }
        };

        // Stay on the entity's own site
        if extract_domain(&absolute).as_deref() != Some(domain) {
            continue;
        }

        if absolute != page_url && !links.contains(&absolute) {
            links.push(absolute);
        }
    }

    links
}
