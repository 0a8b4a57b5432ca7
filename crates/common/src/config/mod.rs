//! Configuration management for PubForge stages
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values
//!
//! Credentials are never compiled in: the store connection
//! (`database.host`, `port`, `user`, `password`, `database`) and the search
//! `api_key` are always injected from one of the sources above.

use crate::errors::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct AppConfig {
    /// Relational store configuration
    #[serde(default)]
    #[validate(nested)]
    pub database: DatabaseConfig,

    /// Scholar search API configuration
    #[serde(default)]
    #[validate(nested)]
    pub search: SearchConfig,

    /// Stage behaviour
    #[serde(default)]
    #[validate(nested)]
    pub pipeline: PipelineConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct DatabaseConfig {
    /// Database host
    #[serde(default = "default_db_host")]
    #[validate(length(min = 1))]
    pub host: String,

    /// Database port
    #[serde(default = "default_db_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Database user
    #[serde(default = "default_db_user")]
    pub user: String,

    /// Database password
    pub password: Option<String>,

    /// Database name
    #[serde(default = "default_db_name")]
    #[validate(length(min = 1))]
    pub database: String,

    /// Full connection URL; overrides the individual fields when set
    pub url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    #[validate(range(min = 1))]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// How long to keep retrying the initial connection, in seconds
    #[serde(default = "default_connect_retry")]
    pub connect_retry_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SearchConfig {
    /// API key for the search service
    pub api_key: Option<String>,

    /// Search endpoint
    #[serde(default = "default_search_base_url")]
    #[validate(url)]
    pub base_url: String,

    /// Search engine identifier passed as `engine`
    #[serde(default = "default_search_engine")]
    pub engine: String,

    /// Results requested per query (`num`)
    #[serde(default = "default_results_per_query")]
    #[validate(range(min = 1, max = 20))]
    pub results_per_query: u32,

    /// Interface language (`hl`)
    #[serde(default = "default_search_language")]
    pub language: String,

    /// Request timeout in seconds
    #[serde(default = "default_search_timeout")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,

    /// Total attempts when the API answers 429
    #[serde(default = "default_search_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,

    /// Base of the exponential backoff, in seconds
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,

    /// Client-side request throttle (0 disables it)
    #[serde(default)]
    pub requests_per_second: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct PipelineConfig {
    /// JSON snapshot loaded by the ingest stage
    #[serde(default = "default_dataset_path")]
    pub dataset_path: String,

    /// Enrichment cycles per run
    #[serde(default = "default_enrichment_cycles")]
    #[validate(range(min = 1, max = 100))]
    pub enrichment_cycles: u32,

    /// Publications sampled per category in each enrichment cycle
    #[serde(default = "default_per_category_limit")]
    #[validate(range(min = 1))]
    pub per_category_limit: u64,

    /// Drop the abstract column during cleaning
    #[serde(default = "default_drop_abstracts")]
    pub drop_abstracts: bool,

    /// Publications with a shorter trimmed title are deleted during cleaning
    #[serde(default = "default_min_title_length")]
    #[validate(range(min = 1))]
    pub min_title_length: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_db_host() -> String { "localhost".to_string() }
fn default_db_port() -> u16 { 5432 }
fn default_db_user() -> String { "postgres".to_string() }
fn default_db_name() -> String { "pubforge".to_string() }
fn default_max_connections() -> u32 { 5 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_connect_retry() -> u64 { 30 }
fn default_search_base_url() -> String { "https://serpapi.com/search".to_string() }
fn default_search_engine() -> String { "google_scholar".to_string() }
fn default_results_per_query() -> u32 { 2 }
fn default_search_language() -> String { "en".to_string() }
fn default_search_timeout() -> u64 { 30 }
fn default_search_attempts() -> u32 { 5 }
fn default_backoff_base() -> u64 { 1 }
fn default_dataset_path() -> String { "data/dataset.json".to_string() }
fn default_enrichment_cycles() -> u32 { 2 }
fn default_per_category_limit() -> u64 { 2 }
fn default_drop_abstracts() -> bool { true }
fn default_min_title_length() -> u32 { 2 }
fn default_log_level() -> String { "info".to_string() }
fn default_service_name() -> String { "pubforge".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__DATABASE__HOST=db.internal
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific file, still honouring APP__ overrides
    pub fn from_file(path: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

impl DatabaseConfig {
    /// Connection URL for the store; the password is percent-encoded
    pub fn connection_url(&self) -> Result<String> {
        if let Some(ref url) = self.url {
            return Ok(url.clone());
        }

        let invalid = |what: &str| AppError::Configuration {
            message: format!("invalid database {}", what),
        };

        let mut url = reqwest::Url::parse(&format!(
            "postgres://{}:{}/{}",
            self.host, self.port, self.database
        ))
        .map_err(|e| AppError::Configuration {
            message: format!("invalid database address: {}", e),
        })?;

        url.set_username(&self.user).map_err(|_| invalid("user"))?;
        url.set_password(self.password.as_deref())
            .map_err(|_| invalid("password"))?;

        Ok(url.to_string())
    }

    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl SearchConfig {
    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// API key, or a configuration error naming the missing option
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "search.api_key is required (APP__SEARCH__API_KEY)".to_string(),
            })
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            user: default_db_user(),
            password: None,
            database: default_db_name(),
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            connect_retry_secs: default_connect_retry(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_search_base_url(),
            engine: default_search_engine(),
            results_per_query: default_results_per_query(),
            language: default_search_language(),
            timeout_secs: default_search_timeout(),
            max_attempts: default_search_attempts(),
            backoff_base_secs: default_backoff_base(),
            requests_per_second: 0,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset_path: default_dataset_path(),
            enrichment_cycles: default_enrichment_cycles(),
            per_category_limit: default_per_category_limit(),
            drop_abstracts: default_drop_abstracts(),
            min_title_length: default_min_title_length(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
            metrics_port: 0,
            service_name: default_service_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.search.max_attempts, 5);
        assert_eq!(config.search.results_per_query, 2);
        assert_eq!(config.pipeline.per_category_limit, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_connection_url_encodes_password() {
        let config = DatabaseConfig {
            password: Some("p@ss/word".to_string()),
            ..Default::default()
        };
        let url = config.connection_url().unwrap();
        assert!(url.starts_with("postgres://postgres:"));
        assert!(url.contains("p%40ss"));
        assert!(url.ends_with("@localhost:5432/pubforge"));
    }

    #[test]
    fn test_connection_url_override() {
        let config = DatabaseConfig {
            url: Some("sqlite::memory:".to_string()),
            ..Default::default()
        };
        assert_eq!(config.connection_url().unwrap(), "sqlite::memory:");
    }

    #[test]
    fn test_api_key_required() {
        let mut search = SearchConfig::default();
        assert!(search.require_api_key().is_err());
        search.api_key = Some("  ".to_string());
        assert!(search.require_api_key().is_err());
        search.api_key = Some("secret".to_string());
        assert_eq!(search.require_api_key().unwrap(), "secret");
    }

    #[test]
    fn test_from_file_with_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pubforge.toml");
        std::fs::write(
            &path,
            "[search]\napi_key = \"from-file\"\nresults_per_query = 5\n\n[pipeline]\nenrichment_cycles = 3\n",
        )
        .unwrap();

        std::env::set_var("APP__SEARCH__API_KEY", "from-env");
        let loaded = AppConfig::from_file(&path.to_string_lossy());
        std::env::remove_var("APP__SEARCH__API_KEY");
        let config = loaded.unwrap();

        assert_eq!(config.search.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.search.results_per_query, 5);
        assert_eq!(config.pipeline.enrichment_cycles, 3);
        assert_eq!(config.database.port, 5432);
    }

    #[test]
    fn test_from_file_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pubforge.toml");
        std::fs::write(&path, "[search]\nresults_per_query = 50\n").unwrap();

        let err = AppConfig::from_file(&path.to_string_lossy()).unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[test]
    fn test_out_of_range_attempts_rejected() {
        let mut config = AppConfig::default();
        config.search.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
