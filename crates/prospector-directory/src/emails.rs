//! Email harvesting and validation.
//!
//! Raw regex matches off a web page are noisy: asset filenames, tracker
//! addresses, and automated senders all look like emails. The filter keeps
//! deny-lists for domains, local-part prefixes, and file extensions, and
//! ranks the survivors so generic contact addresses win over personal ones.

use std::sync::OnceLock;

use prospector_core::EmailFilterConfig;
use regex::Regex;

/// Platform and service domains that never belong to the entity itself.
const BLOCKED_DOMAINS: [&str; 8] = [
    "example.com",
    "domain.com",
    "email.com",
    "yourdomain.com",
    "sentry.io",
    "wixpress.com",
    "godaddy.com",
    "cloudflare.com",
];

/// Local-part prefixes of automated or placeholder senders.
const BLOCKED_PREFIXES: [&str; 7] = [
    "noreply",
    "no-reply",
    "no_reply",
    "donotreply",
    "mailer-daemon",
    "example",
    "test",
];

/// Local-part prefixes preferred when ranking candidates.
const PREFERRED_PREFIXES: [&str; 10] = [
    "info", "contact", "hello", "sales", "office", "support", "mail", "team", "enquiries",
    "inquiries",
];

/// File extensions that betray an asset filename caught by the regex
/// (e.g. `logo@2x.png`).
const BLOCKED_EXTENSIONS: [&str; 9] = [
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".css", ".js", ".pdf",
];

fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid regex")
    })
}

/// Pull every email-shaped string out of a text blob, lowercased and
/// deduplicated in order of first appearance.
#[must_use]
pub fn extract_candidates(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    email_regex()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|email| seen.insert(email.clone()))
        .collect()
}

/// Validates and ranks harvested email candidates.
#[derive(Debug, Clone)]
pub struct EmailFilter {
    blocked_domains: Vec<String>,
    blocked_prefixes: Vec<String>,
    preferred_prefixes: Vec<String>,
}

impl Default for EmailFilter {
    fn default() -> Self {
        Self::from_config(&EmailFilterConfig::default())
    }
}

impl EmailFilter {
    /// Build a filter from configuration. Configured lists extend the
    /// built-in deny-lists rather than replacing them.
    #[must_use]
    pub fn from_config(config: &EmailFilterConfig) -> Self {
        let mut blocked_domains: Vec<String> =
            BLOCKED_DOMAINS.iter().map(ToString::to_string).collect();
        blocked_domains.extend(config.blocked_domains.iter().map(|d| d.to_lowercase()));

        let mut blocked_prefixes: Vec<String> =
            BLOCKED_PREFIXES.iter().map(ToString::to_string).collect();
        blocked_prefixes.extend(config.blocked_prefixes.iter().map(|p| p.to_lowercase()));

        let preferred_prefixes: Vec<String> = if config.preferred_prefixes.is_empty() {
            PREFERRED_PREFIXES.iter().map(ToString::to_string).collect()
        } else {
            config
                .preferred_prefixes
                .iter()
                .map(|p| p.to_lowercase())
                .collect()
        };

        Self {
            blocked_domains,
            blocked_prefixes,
            preferred_prefixes,
        }
    }

    /// Whether an email survives the deny-lists.
    #[must_use]
    pub fn is_acceptable(&self, email: &str) -> bool {
        let lowered = email.to_lowercase();

        if BLOCKED_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext)) {
            return false;
        }

        let Some((local, domain)) = lowered.split_once('@') else {
            return false;
        };

        if self
            .blocked_domains
            .iter()
            .any(|blocked| domain == blocked || domain.ends_with(&format!(".{blocked}")))
        {
            return false;
        }

        if self
            .blocked_prefixes
            .iter()
            .any(|prefix| local.starts_with(prefix.as_str()))
        {
            return false;
        }

        true
    }

    /// Choose the best acceptable candidate: a preferred generic prefix
    /// wins, otherwise the first acceptable address in harvest order.
    #[must_use]
    pub fn pick_best<'a, I>(&self, candidates: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let acceptable: Vec<&String> = candidates
            .into_iter()
            .filter(|email| self.is_acceptable(email))
            .collect();

        for preferred in &self.preferred_prefixes {
            if let Some(email) = acceptable
                .iter()
                .find(|email| email.starts_with(preferred.as_str()))
            {
                return Some((*email).clone());
            }
        }

        acceptable.first().map(|email| (*email).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_dedupes_case_insensitively() {
        let text = "Reach us at Info@Acme.example or info@acme.example, or ceo@acme.example.";
        let emails = extract_candidates(text);
        assert_eq!(emails, vec!["info@acme.example", "ceo@acme.example"]);
    }

    #[test]
    fn test_blocked_domains_rejected() {
        let filter = EmailFilter::default();
        assert!(!filter.is_acceptable("crash-report@sentry.io"));
        assert!(!filter.is_acceptable("someone@example.com"));
        assert!(!filter.is_acceptable("deep@sub.wixpress.com"));
        assert!(filter.is_acceptable("info@acme.example"));
    }

    #[test]
    fn test_blocked_prefixes_rejected() {
        let filter = EmailFilter::default();
        assert!(!filter.is_acceptable("noreply@acme.example"));
        assert!(!filter.is_acceptable("no-reply@acme.example"));
        assert!(!filter.is_acceptable("test@acme.example"));
    }

    #[test]
    fn test_asset_filenames_rejected() {
        let filter = EmailFilter::default();
        assert!(!filter.is_acceptable("logo@2x.png"));
        assert!(!filter.is_acceptable("hero@large.jpeg"));
    }

    #[test]
    fn test_pick_best_prefers_generic_contact() {
        let filter = EmailFilter::default();
        let candidates = vec![
            "jane.doe@acme.example".to_string(),
            "info@acme.example".to_string(),
        ];
        assert_eq!(
            filter.pick_best(&candidates),
            Some("info@acme.example".to_string())
        );
    }

    #[test]
    fn test_pick_best_falls_back_to_first_acceptable() {
        let filter = EmailFilter::default();
        let candidates = vec![
            "noreply@acme.example".to_string(),
            "jane@acme.example".to_string(),
            "john@acme.example".to_string(),
        ];
        assert_eq!(
            filter.pick_best(&candidates),
            Some("jane@acme.example".to_string())
        );
    }

    #[test]
    fn test_pick_best_empty_when_all_blocked() {
        let filter = EmailFilter::default();
        let candidates = vec!["noreply@acme.example".to_string()];
        assert_eq!(filter.pick_best(&candidates), None);
    }

    #[test]
    fn test_config_lists_extend_builtins() {
        let config = EmailFilterConfig {
            blocked_domains: vec!["competitor.example".to_string()],
            blocked_prefixes: vec!["billing".to_string()],
            preferred_prefixes: Vec::new(),
        };
        let filter = EmailFilter::from_config(&config);

        assert!(!filter.is_acceptable("hi@competitor.example"));
        assert!(!filter.is_acceptable("billing@acme.example"));
        // Built-ins still apply
        assert!(!filter.is_acceptable("noreply@acme.example"));
    }
}
