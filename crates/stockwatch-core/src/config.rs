//! Configuration management for Stockwatch.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/stockwatch/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// Page fetching settings
    pub fetcher: FetcherConfig,
    /// Retry behavior
    pub retry: RetryConfig,
    /// Target retail site settings
    pub site: SiteConfig,
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
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, falling back to defaults if
    /// the file does not exist.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `STOCKWATCH_HEADLESS`: Override browser headless mode (true/false)
    /// - `STOCKWATCH_MAX_RETRIES`: Override the attempt budget
    /// - `STOCKWATCH_FETCH_STRATEGY`: `cookie_replay` or `browser`
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `STOCKWATCH_*` environment overrides in place.
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("STOCKWATCH_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("STOCKWATCH_MAX_RETRIES") {
            if let Ok(max_retries) = val.parse() {
                self.retry.max_retries = max_retries;
                tracing::debug!("Override retry.max_retries from env: {}", max_retries);
            }
        }

        if let Ok(val) = std::env::var("STOCKWATCH_FETCH_STRATEGY") {
            match val.as_str() {
                "cookie_replay" => self.fetcher.strategy = FetchStrategy::CookieReplay,
                "browser" => self.fetcher.strategy = FetchStrategy::Browser,
                other => tracing::warn!("Ignoring unknown STOCKWATCH_FETCH_STRATEGY: {}", other),
            }
        }
    }

    /// Check values that serde cannot constrain on its own.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.retry.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_retries".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.fetcher.http_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetcher.http_timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let base = url::Url::parse(&self.site.base_url).map_err(|e| ConfigError::InvalidValue {
            field: "site.base_url".to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue {
                field: "site.base_url".to_string(),
                reason: "must be an absolute URL".to_string(),
            });
        }

        if self.site.marker.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "site.marker".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/stockwatch/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "stockwatch", "stockwatch").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Per-request timeout for DevTools commands in seconds
    pub request_timeout_secs: u64,
    /// Explicit Chrome/Chromium executable; auto-detected when unset
    pub chrome_executable: Option<PathBuf>,
    /// Additional command-line arguments for the browser process
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            request_timeout_secs: 30,
            chrome_executable: None,
            extra_args: Vec::new(),
        }
    }
}

/// How a page is turned into markup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    /// Harvest cookies with the browser, then issue a plain HTTP GET.
    #[default]
    CookieReplay,
    /// Read the rendered DOM straight out of the browser.
    Browser,
}

/// Page fetching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Fetch strategy
    pub strategy: FetchStrategy,
    /// Timeout for the replayed HTTP GET in seconds
    pub http_timeout_secs: u64,
    /// Consent-banner buttons to click, tried in order
    pub consent_selectors: Vec<String>,
    /// How long to wait for each consent button in milliseconds
    pub consent_timeout_ms: u64,
    /// Value of the `accept-language` header and `navigator.languages`
    pub accept_language: String,
    /// Pause after navigation before interacting, in milliseconds
    pub settle_delay_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            strategy: FetchStrategy::CookieReplay,
            http_timeout_secs: 30,
            consent_selectors: vec!["#onetrust-accept-btn-handler".to_string()],
            consent_timeout_ms: 10_000,
            accept_language: "en-US,en;q=0.7".to_string(),
            settle_delay_ms: 1500,
        }
    }
}

/// Which failures consume another attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Every failure is retried until the budget is spent.
    #[default]
    Uniform,
    /// Structural failures (bad payload, missing fields) stop immediately.
    TransientOnly,
}

/// Retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts per extraction
    pub max_retries: u32,
    /// Retry policy
    pub policy: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            policy: RetryPolicy::Uniform,
        }
    }
}

/// Target retail site settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Base URL that variant slugs are joined onto
    pub base_url: String,
    /// Substring identifying the script that carries product state
    pub marker: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.thefragranceshop.co.uk/".to_string(),
            marker: "currentStock".to_string(),
        }
    }
}
