//! Browser session lifecycle.
//!
//! A [`BrowserSession`] owns one chromium process and one page, launched
//! through an engine-specific [`LaunchProfile`]. Initialization runs behind
//! a hard timeout: chromium that hangs during startup is reported as
//! [`BrowserError::InitTimeout`] and the session is abandoned rather than
//! retried with the same variant.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use prospector_core::BrowserConfig;
use tokio::task::JoinHandle;

use crate::error::{BrowserError, Result};
use crate::fetch::PageFetcher;
use crate::fingerprint::FingerprintConfig;

/// Which launch strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Randomized fingerprint and automation-masking flags, for directories
    /// that gate headless traffic.
    Stealth,
    /// Plain chromium launch with a fixed window size.
    Standard,
}

impl FromStr for EngineKind {
    type Err = BrowserError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stealth" => Ok(Self::Stealth),
            "standard" => Ok(Self::Standard),
            other => Err(BrowserError::UnknownEngine(other.to_string())),
        }
    }
}

impl EngineKind {
    /// Build the launch profile for this engine variant.
    #[must_use]
    pub fn profile(self, settings: &BrowserConfig) -> Box<dyn LaunchProfile> {
        match self {
            Self::Stealth => Box::new(StealthProfile {
                fingerprint: FingerprintConfig::randomized(),
            }),
            Self::Standard => Box::new(StandardProfile {
                fingerprint: FingerprintConfig::fixed(
                    settings.window_width,
                    settings.window_height,
                ),
            }),
        }
    }
}

/// Engine-specific launch behavior.
///
/// Both variants expose the same session surface; only how the process is
/// started differs.
pub trait LaunchProfile: Send + Sync {
    /// Chromium launch configuration for this variant.
    fn launch_config(&self, settings: &BrowserConfig) -> Result<ChromeConfig>;

    /// User agent to apply to the page after launch, if any.
    fn user_agent(&self) -> Option<&str>;
}

struct StealthProfile {
    fingerprint: FingerprintConfig,
}

impl LaunchProfile for StealthProfile {
    fn launch_config(&self, settings: &BrowserConfig) -> Result<ChromeConfig> {
        let mut builder = ChromeConfig::builder()
            .no_sandbox()
            .viewport(Viewport {
                width: self.fingerprint.viewport_width,
                height: self.fingerprint.viewport_height,
                ..Viewport::default()
            })
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg(format!("--lang={}", self.fingerprint.accept_language));

        if !settings.headless {
            builder = builder.with_head();
        }

        builder.build().map_err(BrowserError::Chromium)
    }

    fn user_agent(&self) -> Option<&str> {
        Some(&self.fingerprint.user_agent)
    }
}

struct StandardProfile {
    fingerprint: FingerprintConfig,
}

impl LaunchProfile for StandardProfile {
    fn launch_config(&self, settings: &BrowserConfig) -> Result<ChromeConfig> {
        let mut builder = ChromeConfig::builder().no_sandbox().window_size(
            self.fingerprint.viewport_width,
            self.fingerprint.viewport_height,
        );

        if !settings.headless {
            builder = builder.with_head();
        }

        builder.build().map_err(BrowserError::Chromium)
    }

    fn user_agent(&self) -> Option<&str> {
        None
    }
}

/// One live chromium process with a single reused page.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch a session using the engine named in `settings.engine`.
    ///
    /// # Errors
    /// Returns `BrowserError::InitTimeout` if startup exceeds
    /// `settings.init_timeout_seconds`, or `BrowserError::Chromium` if the
    /// process fails outright.
    pub async fn open(settings: &BrowserConfig) -> Result<Self> {
        let kind: EngineKind = settings.engine.parse()?;
        Self::open_with_engine(settings, kind).await
    }

    /// Launch a session with an explicit engine variant.
    pub async fn open_with_engine(settings: &BrowserConfig, kind: EngineKind) -> Result<Self> {
        let profile = kind.profile(settings);
        let config = profile.launch_config(settings)?;
        let init_window = Duration::from_secs(settings.init_timeout_seconds);

        tracing::info!(engine = ?kind, headless = settings.headless, "Launching browser");

        let (browser, mut handler) = tokio::time::timeout(init_window, Browser::launch(config))
            .await
            .map_err(|_| BrowserError::InitTimeout {
                seconds: settings.init_timeout_seconds,
            })?
            .map_err(|e| BrowserError::Chromium(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = tokio::time::timeout(init_window, browser.new_page("about:blank"))
            .await
            .map_err(|_| BrowserError::InitTimeout {
                seconds: settings.init_timeout_seconds,
            })?
            .map_err(|e| BrowserError::Chromium(e.to_string()))?;

        if let Some(ua) = profile.user_agent() {
            page.set_user_agent(ua)
                .await
                .map_err(|e| BrowserError::Chromium(e.to_string()))?;
        }

        Ok(Self {
            browser,
            page,
            handler: handler_task,
        })
    }

    /// Navigate the session's page and return the rendered HTML.
    ///
    /// # Errors
    /// Returns `BrowserError::Timeout` if the page doesn't settle within
    /// `timeout`, or `BrowserError::Navigation` on a load failure.
    pub async fn navigate(&self, url: &str, timeout: Duration) -> Result<String> {
        tracing::debug!(url, "Navigating");

        let load = async {
            self.page
                .goto(url)
                .await
                .map_err(|e| BrowserError::Navigation(e.to_string()))?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|e| BrowserError::Navigation(e.to_string()))?;
            self.page
                .content()
                .await
                .map_err(|e| BrowserError::Navigation(e.to_string()))
        };

        tokio::time::timeout(timeout, load)
            .await
            .map_err(|_| BrowserError::Timeout(url.to_string()))?
    }

    /// Shut the browser down and stop the event handler.
    pub async fn close(mut self) -> Result<()> {
        let result = self.browser.close().await;
        self.handler.abort();
        result.map_err(|e| BrowserError::Chromium(e.to_string()))?;
        tracing::info!("Browser session closed");
        Ok(())
    }
}

#[async_trait]
impl PageFetcher for BrowserSession {
    async fn fetch_page(&self, url: &str, timeout: Duration) -> Result<String> {
        self.navigate(url, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_parsing() {
        assert_eq!("stealth".parse::<EngineKind>().ok(), Some(EngineKind::Stealth));
        assert_eq!(
            "Standard".parse::<EngineKind>().ok(),
            Some(EngineKind::Standard)
        );
        assert!("firefox".parse::<EngineKind>().is_err());
    }

    #[test]
    fn test_stealth_profile_sets_user_agent() {
        let settings = BrowserConfig::default();
        let profile = EngineKind::Stealth.profile(&settings);
        assert!(profile.user_agent().is_some());
    }

    #[test]
    fn test_standard_profile_leaves_user_agent() {
        let settings = BrowserConfig::default();
        let profile = EngineKind::Standard.profile(&settings);
        assert!(profile.user_agent().is_none());
    }

    #[test]
    fn test_profiles_build_launch_configs() {
        let settings = BrowserConfig::default();
        for kind in [EngineKind::Stealth, EngineKind::Standard] {
            let profile = kind.profile(&settings);
            profile
                .launch_config(&settings)
                .expect("launch config should build");
        }
    }
}
