//! Application configuration
//!
//! Loaded once from YAML (`CONFIG_FILE`, default `config/config.yaml`) with
//! `KAITORI__SECTION__KEY` environment overrides, then validated into an
//! immutable value shared by every component.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::catalog::Catalog;
use crate::models::records::SECS_PER_DAY;

const DEFAULT_CONFIG_FILE: &str = "config/config.yaml";
const ENV_CONFIG_FILE: &str = "CONFIG_FILE";
const ENV_PREFIX: &str = "KAITORI";

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub app: AppSection,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Scraper and cycle configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    /// Vendor pages, fetched in this order.
    pub kaitori_rudea_urls: Vec<String>,

    /// Reference official-price page (informational).
    pub apple_store_url: String,

    /// Per-fetch timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Attempts per URL, including the first.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    pub user_agent: String,

    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default = "default_product_line")]
    pub product_line: String,

    #[serde(default = "default_row_selector")]
    pub row_selector: String,

    #[serde(default = "default_model_selector")]
    pub model_selector: String,

    #[serde(default = "default_price_selector")]
    pub price_selector: String,

    #[serde(default = "default_color_tokens")]
    pub color_tokens: Vec<String>,

    #[serde(default = "default_retry_min_delay_ms")]
    pub retry_min_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Cycle-level timeout, off when absent.
    #[serde(default)]
    pub cycle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppSection {
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

/// Object-store mirror configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Mirror root directory; the mirror is disabled when absent.
    #[serde(default)]
    pub mirror_root: Option<PathBuf>,

    #[serde(default = "default_nearline_after_days")]
    pub nearline_after_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mirror_root: None,
            nearline_after_days: default_nearline_after_days(),
        }
    }
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_request_timeout() -> u64 {
    30
}
fn default_retry_count() -> u32 {
    5
}
fn default_max_concurrent_fetches() -> usize {
    3
}
fn default_retention_days() -> u32 {
    14
}
fn default_product_line() -> String {
    "iPhone 16".to_string()
}
fn default_row_selector() -> String {
    ".tr".to_string()
}
fn default_model_selector() -> String {
    ".ttl h2".to_string()
}
fn default_price_selector() -> String {
    ".td.td2 .td2wrap".to_string()
}
fn default_retry_min_delay_ms() -> u64 {
    2_000
}
fn default_retry_max_delay_ms() -> u64 {
    30_000
}
fn default_nearline_after_days() -> u32 {
    7
}

pub fn default_color_tokens() -> Vec<String> {
    [
        "黒",
        "白",
        "桃",
        "緑",
        "青",
        "金",
        "灰",
        "Black Titanium",
        "White Titanium",
        "Natural Titanium",
        "Desert Titanium",
        "Black",
        "White",
        "Pink",
        "Teal",
        "Ultramarine",
        "Blue",
        "Green",
        "Gold",
        "Gray",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load from `CONFIG_FILE` (or the default path) plus environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = env::var(ENV_CONFIG_FILE).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("scraper.kaitori_rudea_urls")
                    .with_list_parse_key("scraper.color_tokens"),
            )
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize()?;
        app_cfg.validate()?;
        Ok(app_cfg)
    }

    /// Parse YAML text without environment overrides.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize()?;
        app_cfg.validate()?;
        Ok(app_cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scraper;

        if s.kaitori_rudea_urls.is_empty() {
            return Err(ConfigError::invalid(
                "scraper.kaitori_rudea_urls",
                "at least one vendor URL is required",
            ));
        }
        for raw in &s.kaitori_rudea_urls {
            url::Url::parse(raw).map_err(|e| {
                ConfigError::invalid("scraper.kaitori_rudea_urls", format!("'{}': {}", raw, e))
            })?;
        }
        if s.request_timeout == 0 {
            return Err(ConfigError::invalid("scraper.request_timeout", "must be >= 1"));
        }
        if s.retry_count == 0 {
            return Err(ConfigError::invalid("scraper.retry_count", "must be >= 1"));
        }
        if s.max_concurrent_fetches == 0 {
            return Err(ConfigError::invalid(
                "scraper.max_concurrent_fetches",
                "must be >= 1",
            ));
        }
        if s.retention_days == 0 {
            return Err(ConfigError::invalid("scraper.retention_days", "must be >= 1"));
        }
        if s.user_agent.trim().is_empty() {
            return Err(ConfigError::invalid("scraper.user_agent", "must not be empty"));
        }
        if s.product_line.trim().is_empty() {
            return Err(ConfigError::invalid("scraper.product_line", "must not be empty"));
        }
        if s.color_tokens.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::invalid(
                "scraper.color_tokens",
                "at least one color token is required",
            ));
        }
        if s.retry_min_delay_ms > s.retry_max_delay_ms {
            return Err(ConfigError::invalid(
                "scraper.retry_min_delay_ms",
                "must not exceed retry_max_delay_ms",
            ));
        }
        if s.cycle_timeout_secs == Some(0) {
            return Err(ConfigError::invalid("scraper.cycle_timeout_secs", "must be >= 1"));
        }

        Ok(())
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(&self.scraper.product_line)
    }

    pub fn retention_window_secs(&self) -> i64 {
        i64::from(self.scraper.retention_days) * SECS_PER_DAY
    }
}

impl ScraperConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Environment variable enabling the in-server scheduled cycle.
pub const ENV_CYCLE_INTERVAL: &str = "PRICE_CYCLE_INTERVAL_SECS";

/// Process environment consumed by the binaries.
#[derive(Debug, Clone)]
pub struct RuntimeEnv {
    pub database_url: Option<String>,
    pub bucket_name: Option<String>,
    pub app_env: String,
    pub port: u16,
    /// Period of the scheduled cycle; `None` leaves it disabled.
    pub cycle_interval: Option<Duration>,
}

impl RuntimeEnv {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::invalid("PORT", format!("'{}' is not a port", raw)))?,
            Err(_) => 8000,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok(),
            bucket_name: env::var("BUCKET_NAME").ok(),
            app_env: env::var("APP_ENV").unwrap_or_else(|_| "production".to_string()),
            port,
            cycle_interval: env::var(ENV_CYCLE_INTERVAL)
                .ok()
                .map(|raw| parse_cycle_interval(&raw))
                .transpose()?,
        })
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::MissingEnv("DATABASE_URL"))
    }
}

/// Whole seconds, at least one.
pub fn parse_cycle_interval(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::invalid(
            ENV_CYCLE_INTERVAL,
            format!("'{}' is not a positive number of seconds", raw),
        )),
    }
}
