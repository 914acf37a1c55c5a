//! Configuration loading and management
//!
//! JSON configuration under the user config directory, created with
//! defaults on first run. Sections map one-to-one onto the services
//! they tune: fetcher, caches, comparison, logging.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::infrastructure::fetcher::FetcherConfig;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub fetcher: FetcherConfig,
    pub cache: CacheConfig,
    pub comparison: ComparisonConfig,
    pub logging: LoggingConfig,
}

/// TTLs for the three caches, in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Per-(product, marketplace) listing cache.
    pub listing_ttl_minutes: u64,
    /// Outer per-product comparison-result cache.
    pub result_ttl_minutes: u64,
    /// Exchange rate table refresh interval.
    pub rates_ttl_minutes: u64,
    /// Cadence for periodic `purge_expired` sweeps. Read by the
    /// embedding scheduler, not by the library itself.
    pub purge_interval_minutes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            listing_ttl_minutes: 30,
            result_ttl_minutes: 5,
            rates_ttl_minutes: 60,
            purge_interval_minutes: 60,
        }
    }
}

/// Comparison behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Currency comparison totals are expressed in.
    pub requester_currency: String,
    /// Add known shipping costs to comparison totals.
    pub include_shipping: bool,
    /// Restrict comparisons to these marketplace ids; empty means all.
    pub enabled_marketplaces: Vec<String>,
    /// Upper bound on one marketplace lookup within a comparison, in
    /// milliseconds; slower marketplaces are excluded from the result.
    pub per_marketplace_timeout_ms: u64,
    /// Minimum relative saving (percent) before a price-drop
    /// notification is worth raising.
    pub price_drop_threshold_percent: f64,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            requester_currency: "EUR".to_string(),
            include_shipping: true,
            enabled_marketplaces: Vec::new(),
            per_marketplace_timeout_ms: 8_000,
            price_drop_threshold_percent: 5.0,
        }
    }
}

/// Logging output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing filter directive, e.g. "info" or "price_scout=debug".
    pub level: String,
    /// Also write daily-rotated log files.
    pub file_output: bool,
    /// Log file directory; defaults to `logs/` under the current
    /// working directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_output: false,
            directory: None,
        }
    }
}

/// Loads and persists [`AppConfig`] as pretty JSON.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    const APP_DIR: &'static str = "price-scout";
    const CONFIG_FILE: &'static str = "config.json";

    /// Platform config directory, e.g. `~/.config/price-scout` on Linux.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("could not determine user config directory")?
            .join(Self::APP_DIR);
        Ok(dir)
    }

    pub fn new() -> Result<Self> {
        Ok(Self {
            config_path: Self::config_dir()?.join(Self::CONFIG_FILE),
        })
    }

    /// Manager rooted at an explicit path (tests, portable installs).
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load the configuration, writing defaults on first run.
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!(path = %self.config_path.display(), "no config file found, writing defaults");
            let config = AppConfig::default();
            self.save_config(&config).await?;
            return Ok(config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .with_context(|| format!("failed to read {}", self.config_path.display()))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("invalid config file {}", self.config_path.display()))?;
        Ok(config)
    }

    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content =
            serde_json::to_string_pretty(config).context("failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .with_context(|| format!("failed to write {}", self.config_path.display()))?;
        Ok(())
    }
}
