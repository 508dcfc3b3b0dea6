//! Configuration loading and management
//!
//! Tracker options can be built in code ([`TrackerConfig`]) or loaded from
//! `~/.config/sitepulse/config.toml` ([`Config`]).
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/sitepulse/` (~/.config/sitepulse/)
//! - Data: `$XDG_DATA_HOME/sitepulse/` (~/.local/share/sitepulse/)
//! - State/Logs: `$XDG_STATE_HOME/sitepulse/` (~/.local/state/sitepulse/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Collection endpoint used by the standalone bootstrap when the page does
/// not provide one.
pub const DEFAULT_ENDPOINT: &str = "https://collect.sitepulse.dev/api/event";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// How SPA route changes are detected
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NavigationStrategy {
    /// Wrap `pushState`/`replaceState` and listen for `popstate`
    #[default]
    HistoryPatch,
    /// Subscribe to navigation-complete events, leaving history untouched
    NavigateEvents,
}

/// Options for one tracking session
///
/// Immutable once a session starts. Keys accept both snake_case and the
/// camelCase names used by page-embedded configuration.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Site identifier attached to every envelope
    #[serde(alias = "siteId")]
    pub site_id: String,

    /// Collection endpoint; empty suppresses all delivery
    pub endpoint: String,

    /// Gates diagnostic logging
    pub debug: bool,

    /// Emit one page view when the session starts
    #[serde(alias = "trackPageViewOnInit")]
    pub track_page_view_on_init: bool,

    /// Emit page views on client-side route changes
    #[serde(alias = "trackSpaNavigation")]
    pub track_spa_navigation: bool,

    /// Emit custom events for clicks on marked elements
    #[serde(alias = "trackClicks")]
    pub track_clicks: bool,

    /// Route change detection strategy
    pub navigation: NavigationStrategy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            site_id: String::new(),
            endpoint: String::new(),
            debug: false,
            track_page_view_on_init: true,
            track_spa_navigation: true,
            track_clicks: true,
            navigation: NavigationStrategy::default(),
        }
    }
}

impl TrackerConfig {
    /// Create a config for a site and endpoint with every other option defaulted
    pub fn new(site_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_page_view_on_init(mut self, enabled: bool) -> Self {
        self.track_page_view_on_init = enabled;
        self
    }

    pub fn with_spa_navigation(mut self, enabled: bool) -> Self {
        self.track_spa_navigation = enabled;
        self
    }

    pub fn with_clicks(mut self, enabled: bool) -> Self {
        self.track_clicks = enabled;
        self
    }

    pub fn with_navigation(mut self, strategy: NavigationStrategy) -> Self {
        self.navigation = strategy;
        self
    }

    /// Names of required fields that are empty
    ///
    /// Missing fields degrade the session but never prevent it from starting.
    /// Only a literally empty value counts as missing, the same rule
    /// [`can_deliver`](Self::can_deliver) applies to the endpoint.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.site_id.is_empty() {
            missing.push("site_id");
        }
        if self.endpoint.is_empty() {
            missing.push("endpoint");
        }
        missing
    }

    /// True when envelopes would actually be sent
    pub fn can_deliver(&self) -> bool {
        !self.endpoint.is_empty()
    }
}

/// Main configuration file struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Tracker options used by the CLI
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/sitepulse/config.toml` (~/.config/sitepulse/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("sitepulse").join("config.toml")
    }

    /// Returns the data directory path
    ///
    /// `$XDG_DATA_HOME/sitepulse/` (~/.local/share/sitepulse/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("sitepulse")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/sitepulse/` (~/.local/state/sitepulse/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("sitepulse")
    }

    /// Returns the persisted key-value storage file
    ///
    /// `$XDG_DATA_HOME/sitepulse/storage.json`
    pub fn storage_path() -> PathBuf {
        Self::data_dir().join("storage.json")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/sitepulse/sitepulse.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("sitepulse.log")
    }
}
