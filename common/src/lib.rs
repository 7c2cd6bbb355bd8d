/*!
common/src/lib.rs

Shared configuration types and DB helper functions for hackngrabber.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for a TOML config file, with default/override merging
- A helper to initialize the SQLite database pool
*/

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Hard upper bound on stories taken from one front page.
pub const MAX_ITEMS_PER_PAGE: usize = 30;

/// Database configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the sqlite database file (e.g. "newsdatabase.db")
    pub path: String,
}

/// What the poller does when a fetch or parse step fails.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the error and try again after the normal interval.
    #[default]
    Continue,
    /// End the poller task with the error.
    Stop,
}

/// Front page scraping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(default = "default_source_url")]
    pub source_url: String,
    /// CSS selector of the element holding the story list
    #[serde(default = "default_container_selector")]
    pub container_selector: String,
    /// CSS selector of story anchors, relative to the container
    #[serde(default = "default_link_selector")]
    pub link_selector: String,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// 0 means no timeout at all
    #[serde(default = "default_fetch_timeout_seconds")]
    pub fetch_timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

fn default_source_url() -> String {
    "https://news.ycombinator.com/".to_string()
}

fn default_container_selector() -> String {
    "table.itemlist".to_string()
}

fn default_link_selector() -> String {
    "a.storylink".to_string()
}

fn default_max_items() -> usize {
    MAX_ITEMS_PER_PAGE
}

fn default_interval_seconds() -> u64 {
    10
}

fn default_fetch_timeout_seconds() -> u64 {
    10
}

fn default_user_agent() -> String {
    "hackngrabber/0.1.0".to_string()
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            source_url: default_source_url(),
            container_selector: default_container_selector(),
            link_selector: default_link_selector(),
            max_items: default_max_items(),
            interval_seconds: default_interval_seconds(),
            fetch_timeout_seconds: default_fetch_timeout_seconds(),
            user_agent: default_user_agent(),
            on_failure: FailurePolicy::default(),
        }
    }
}

/// HTTP server bind settings, merged into Rocket's figment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    pub server: Option<ServerConfig>,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    /// Reject values the poller cannot work with.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.scraper.source_url)
            .with_context(|| format!("scraper.source_url is not a valid URL: {}", self.scraper.source_url))?;

        if !(1..=MAX_ITEMS_PER_PAGE).contains(&self.scraper.max_items) {
            bail!(
                "scraper.max_items must be in 1..={}, got {}",
                MAX_ITEMS_PER_PAGE,
                self.scraper.max_items
            );
        }

        if self.scraper.interval_seconds == 0 {
            bail!("scraper.interval_seconds must be greater than zero");
        }

        Ok(())
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Initialize an SQLite connection pool.
///
/// This function will create the parent directory if necessary, ensure the DB file exists
/// (attempting to create it if missing), and return a configured `SqlitePool`. Connections
/// are only held for the duration of a single store operation.
///
/// Example:
///   let pool = init_db_pool("newsdatabase.db").await?;
pub async fn init_db_pool(path: &str) -> Result<SqlitePool> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create DB parent directory: {}", parent.display())
            })?;
        }
    }

    // Surface filesystem permission or path issues before sqlx does.
    tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to create or open DB file: {}", path))?;

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to sqlite database at path: {}", path))?;

    Ok(pool)
}
