use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub wikidice: WikidiceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub traversal: TraversalConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// wikidice-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WikidiceConfig {
    /// SQLite file holding the pre-loaded `page` and `page_cat_ids` tables.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for WikidiceConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
        }
    }
}

/// Connection pool limits for the backing store
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_max_connections")]
    pub max_open_connections: usize,
    #[serde(default = "default_max_connections")]
    pub max_idle_connections: usize,
    #[serde(default = "default_conn_max_lifetime_secs")]
    pub conn_max_lifetime_secs: u64,
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_open_connections: default_max_connections(),
            max_idle_connections: default_max_connections(),
            conn_max_lifetime_secs: default_conn_max_lifetime_secs(),
            ping_timeout_ms: default_ping_timeout_ms(),
        }
    }
}

impl StoreConfig {
    pub fn conn_max_lifetime(&self) -> Duration {
        Duration::from_secs(self.conn_max_lifetime_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

/// Depth bounds and result limits for category queries
#[derive(Debug, Clone, Deserialize)]
pub struct TraversalConfig {
    #[serde(default = "default_min_levels")]
    pub min_levels: u32,
    #[serde(default = "default_max_levels")]
    pub max_levels: u32,
    #[serde(default = "default_levels")]
    pub default_levels: u32,
    #[serde(default = "default_autocomplete_limit")]
    pub autocomplete_limit: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            min_levels: default_min_levels(),
            max_levels: default_max_levels(),
            default_levels: default_levels(),
            autocomplete_limit: default_autocomplete_limit(),
        }
    }
}

/// Per-operation request deadlines
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_timeout_ms")]
    pub lookup_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub members_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub autocomplete_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            lookup_ms: default_timeout_ms(),
            members_ms: default_timeout_ms(),
            autocomplete_ms: default_timeout_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn lookup(&self) -> Duration {
        Duration::from_millis(self.lookup_ms)
    }

    pub fn members(&self) -> Duration {
        Duration::from_millis(self.members_ms)
    }

    pub fn autocomplete(&self) -> Duration {
        Duration::from_millis(self.autocomplete_ms)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    /// Prefix the sampled page title is appended to for the redirect.
    #[serde(default = "default_article_base_url")]
    pub article_base_url: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
            article_base_url: default_article_base_url(),
            allowed_origins: Vec::new(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("wikidice.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_connections() -> usize {
    10
}

fn default_conn_max_lifetime_secs() -> u64 {
    600
}

fn default_ping_timeout_ms() -> u64 {
    1000
}

fn default_min_levels() -> u32 {
    1
}

fn default_max_levels() -> u32 {
    4
}

fn default_levels() -> u32 {
    2
}

fn default_autocomplete_limit() -> usize {
    10
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    42011
}

fn default_article_base_url() -> String {
    "https://en.wikipedia.org/wiki/".to_string()
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in WIKIDICE_CONFIG environment variable
    /// 2. ./config.toml in current directory
    ///
    /// `WIKIDICE_DB_PATH`, when set, overrides `wikidice.db_path`.
    pub fn load() -> Result<Self> {
        // Optional file, ignore errors
        let _ = dotenv::dotenv();

        let config_path = std::env::var("WIKIDICE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config = Self::from_toml_str(&config_str)?;

        if let Ok(db_path) = std::env::var("WIKIDICE_DB_PATH") {
            if !db_path.is_empty() {
                config.wikidice.db_path = PathBuf::from(db_path);
            }
        }

        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        let t = &self.traversal;
        if t.min_levels == 0 {
            anyhow::bail!("traversal.min_levels must be greater than 0");
        }
        if t.min_levels > t.max_levels {
            anyhow::bail!(
                "traversal.min_levels ({}) must not exceed traversal.max_levels ({})",
                t.min_levels,
                t.max_levels
            );
        }
        if t.default_levels < t.min_levels || t.default_levels > t.max_levels {
            anyhow::bail!(
                "traversal.default_levels ({}) must lie within [{}, {}]",
                t.default_levels,
                t.min_levels,
                t.max_levels
            );
        }
        if t.autocomplete_limit == 0 {
            anyhow::bail!("traversal.autocomplete_limit must be greater than 0");
        }

        if self.store.max_open_connections == 0 {
            anyhow::bail!("store.max_open_connections must be greater than 0");
        }
        if self.store.max_idle_connections > self.store.max_open_connections {
            anyhow::bail!("store.max_idle_connections must not exceed store.max_open_connections");
        }

        let timeouts = &self.timeouts;
        if timeouts.lookup_ms == 0 || timeouts.members_ms == 0 || timeouts.autocomplete_ms == 0 {
            anyhow::bail!("timeouts must be greater than 0ms");
        }

        url::Url::parse(&self.http_server.article_base_url).with_context(|| {
            format!(
                "http_server.article_base_url is not a valid URL: {}",
                self.http_server.article_base_url
            )
        })?;

        for origin in &self.http_server.allowed_origins {
            let parsed = url::Url::parse(origin).with_context(|| {
                format!("http_server.allowed_origins entry is not a valid origin: {}", origin)
            })?;
            if parsed.host_str().is_none() {
                anyhow::bail!("http_server.allowed_origins entry has no host: {}", origin);
            }
        }

        Ok(())
    }

    /// Logger filter: `RUST_LOG` when set, otherwise `wikidice.log_level`
    pub fn log_filter(&self) -> String {
        match std::env::var("RUST_LOG") {
            Ok(filter) if !filter.trim().is_empty() => filter,
            _ => self.wikidice.log_level.clone(),
        }
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.wikidice.db_path
    }
}
