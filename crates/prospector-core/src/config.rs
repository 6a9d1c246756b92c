//! Configuration management for Prospector.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration.
///
/// This is loaded from `~/.config/prospector/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scheduling intervals per layer
    pub intervals: IntervalConfig,
    /// Outbound request behavior (delay, timeout, retries)
    pub request: RequestConfig,
    /// Layer and per-endpoint enable toggles
    pub endpoints: EndpointToggles,
    /// Failure-escalation settings
    pub error_handling: ErrorHandlingConfig,
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// Contact-page discovery settings
    pub contact: ContactConfig,
    /// Email validation and deny-list settings
    pub email_filter: EmailFilterConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path.
    ///
    /// # Errors
    /// Returns [`ConfigError::NotFound`] if the file does not exist.
    pub fn load_from(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }
        let contents = fs::read_to_string(&path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `PROSPECTOR_HEADLESS`: Override browser headless mode (true/false)
    /// - `PROSPECTOR_BROWSER_ENGINE`: Override engine variant (stealth/standard)
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env();
        Ok(config)
    }

    /// Apply recognized environment variable overrides in place.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("PROSPECTOR_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("PROSPECTOR_BROWSER_ENGINE") {
            if !val.is_empty() {
                tracing::debug!("Override browser.engine from env: {}", val);
                self.browser.engine = val;
            }
        }
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/prospector/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "prospector", "prospector").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path (database, contract files).
    ///
    /// Uses XDG base directories: `~/.local/share/prospector`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "prospector", "prospector").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Scheduling intervals, in hours, per layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalConfig {
    /// Hours between directory-layer runs
    pub directory_hours: u64,
    /// Hours between contract-layer runs
    pub contract_hours: u64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            directory_hours: 24,
            contract_hours: 6,
        }
    }
}

/// Outbound request behavior shared by both layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Fixed politeness delay between requests, in seconds
    pub delay_seconds: u64,
    /// Per-request timeout, in seconds
    pub timeout_seconds: u64,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
    /// Exponential backoff base: delay is `base^attempt` seconds
    pub retry_backoff_base: f64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            delay_seconds: 3,
            timeout_seconds: 30,
            max_retries: 3,
            retry_backoff_base: 2.0,
        }
    }
}

/// Layer and per-endpoint enable toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointToggles {
    /// Whether the directory layer runs at all
    pub directory_enabled: bool,
    /// Whether the contract layer runs at all
    pub contract_enabled: bool,
    /// Contract endpoint names to skip even when declared enabled
    pub disabled: Vec<String>,
}

impl Default for EndpointToggles {
    fn default() -> Self {
        Self {
            directory_enabled: true,
            contract_enabled: true,
            disabled: Vec::new(),
        }
    }
}

/// Failure-escalation settings for the contract layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorHandlingConfig {
    /// Consecutive endpoint failures before the rest of a run is skipped
    pub circuit_breaker_threshold: u32,
    /// Whether a non-transient endpoint failure aborts the whole run
    pub continue_on_error: bool,
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self {
            circuit_breaker_threshold: 5,
            continue_on_error: true,
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Engine variant: "stealth" or "standard"
    pub engine: String,
    /// Run the browser headless
    pub headless: bool,
    /// Bound on browser launch time; exceeding it is a hard, reportable error
    pub init_timeout_seconds: u64,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: "standard".to_string(),
            headless: true,
            init_timeout_seconds: 45,
            navigation_timeout_secs: 30,
            window_width: 1920,
            window_height: 1080,
        }
    }
}

/// Contact-page discovery settings for the email extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    /// Extra same-domain pages to visit beyond the home page
    pub max_extra_pages: usize,
    /// Total wall-clock budget per entity, in seconds
    pub budget_seconds: u64,
    /// Regex matched against link text/href to spot contact-like pages
    pub link_pattern: String,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            max_extra_pages: 2,
            budget_seconds: 45,
            link_pattern: r"(?i)\b(contact|about|team|get.in.touch|reach.us|impressum|imprint)\b"
                .to_string(),
        }
    }
}

/// Email validation and deny-list settings.
///
/// Empty lists fall back to the built-in defaults in the directory crate's
/// email filter, so a partial config section never silently disables
/// filtering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailFilterConfig {
    /// Domains whose addresses are rejected (platform/service emails)
    pub blocked_domains: Vec<String>,
    /// Local-part prefixes that are rejected (automated senders)
    pub blocked_prefixes: Vec<String>,
    /// Local-part prefixes preferred when ranking candidates
    pub preferred_prefixes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.intervals.directory_hours, 24);
        assert_eq!(config.intervals.contract_hours, 6);
        assert_eq!(config.request.max_retries, 3);
        assert!((config.request.retry_backoff_base - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.error_handling.circuit_breaker_threshold, 5);
        assert!(config.error_handling.continue_on_error);
        assert!(config.browser.headless);
        assert_eq!(config.browser.engine, "standard");
        assert_eq!(config.contact.max_extra_pages, 2);
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[intervals]"));
        assert!(toml_str.contains("[request]"));
        assert!(toml_str.contains("[error_handling]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.intervals.directory_hours, config.intervals.directory_hours);
    }

    #[test]
    fn test_partial_config() {
        // Partial TOML configs fill the rest from defaults
        let toml_str = r#"
[intervals]
contract_hours = 2

[request]
delay_seconds = 1
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.intervals.contract_hours, 2);
        assert_eq!(config.request.delay_seconds, 1);
        // These should be defaults
        assert_eq!(config.intervals.directory_hours, 24);
        assert_eq!(config.request.max_retries, 3);
    }

    #[test]
    fn test_load_from_path() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.endpoints.disabled = vec!["units".to_string()];
        let contents = toml::to_string_pretty(&config).expect("serialize config");
        fs::write(&config_path, contents).expect("write config file");

        let loaded = AppConfig::load_from(&config_path).expect("load config");
        assert_eq!(loaded.endpoints.disabled, vec!["units".to_string()]);
    }

    #[test]
    fn test_load_from_missing_path() {
        let result = AppConfig::load_from("/nonexistent/prospector-config.toml");
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("PROSPECTOR_HEADLESS", "false");
        std::env::set_var("PROSPECTOR_BROWSER_ENGINE", "stealth");

        let mut config = AppConfig::default();
        config.apply_env();
        assert!(!config.browser.headless);
        assert_eq!(config.browser.engine, "stealth");

        std::env::remove_var("PROSPECTOR_HEADLESS");
        std::env::remove_var("PROSPECTOR_BROWSER_ENGINE");
    }
}
