//! Centralized configuration for the movie-club pipeline.
//!
//! Constant groups hold fixed values (timeouts, provider endpoints, table
//! names). Runtime configuration is explicit: a `PipelineConfig` is built once
//! and handed to the components that need it, instead of module-level state.

use crate::error::{MovieClubError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const MAX_CONCURRENCY: usize = 8;
    pub const MAX_RETRIES: u32 = 3;
    pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
    pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(10);
    pub const USER_AGENT: &'static str = "movieclub-data/0.3";
}

/// Metadata provider defaults (TMDB v3).
pub struct ProviderDefaults;

impl ProviderDefaults {
    pub const BASE_URL: &'static str = "https://api.themoviedb.org/3";
    pub const LINK_TEMPLATE: &'static str = "https://www.themoviedb.org/movie/{id}";
    pub const API_KEY_ENV: &'static str = "TMDB_API_KEY";
    pub const SEARCH_PATH: &'static str = "search/movie";
    pub const GENRE_LIST_PATH: &'static str = "genre/movie/list";
    pub const GENRE_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
}

/// Relational store and export constants.
pub struct StoreConfig;

impl StoreConfig {
    pub const TABLE_NAME: &'static str = "movies";
    pub const GENRE_DELIMITER: &'static str = ", ";
    pub const BUSY_TIMEOUT_MS: u32 = 30_000;
}

/// Retry settings as they appear in a config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct RetrySettings {
    /// Maximum number of attempts per title (1 disables retrying).
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: NetworkConfig::MAX_RETRIES,
            base_delay_ms: NetworkConfig::RETRY_BASE_DELAY.as_millis() as u64,
            max_delay_ms: NetworkConfig::RETRY_MAX_DELAY.as_millis() as u64,
            jitter: true,
        }
    }
}

/// Connection settings for the metadata provider.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ProviderConfig {
    /// API key, sent as the `api_key` query parameter.
    pub api_key: String,
    pub base_url: String,
    /// URL template for `provider_link`; `{id}` is replaced by the provider id.
    pub link_template: String,
    pub request_timeout_secs: u64,
    /// Maximum number of title lookups in flight at once.
    pub max_concurrency: usize,
    /// Optional ISO 639-1 language tag forwarded to the provider.
    pub language: Option<String>,
    pub include_adult: bool,
    pub retry: RetrySettings,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("link_template", &self.link_template)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_concurrency", &self.max_concurrency)
            .field("language", &self.language)
            .field("include_adult", &self.include_adult)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: ProviderDefaults::BASE_URL.to_string(),
            link_template: ProviderDefaults::LINK_TEMPLATE.to_string(),
            request_timeout_secs: NetworkConfig::REQUEST_TIMEOUT.as_secs(),
            max_concurrency: NetworkConfig::MAX_CONCURRENCY,
            language: None,
            include_adult: false,
            retry: RetrySettings::default(),
        }
    }
}

impl ProviderConfig {
    /// Create a provider config with default endpoints and the given key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Point the provider at a different base URL (mock servers, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Fill an empty API key from the environment.
    pub fn with_env_api_key(mut self) -> Self {
        if self.api_key.trim().is_empty() {
            if let Ok(key) = std::env::var(ProviderDefaults::API_KEY_ENV) {
                self.api_key = key.trim().to_string();
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(MovieClubError::Config {
                message: format!(
                    "provider API key is empty; set it in the config file or via {}",
                    ProviderDefaults::API_KEY_ENV
                ),
            });
        }
        if url::Url::parse(&self.base_url).is_err() {
            return Err(MovieClubError::Config {
                message: format!("invalid provider base URL: {}", self.base_url),
            });
        }
        if !self.link_template.contains("{id}") {
            return Err(MovieClubError::Config {
                message: "link_template must contain an {id} placeholder".to_string(),
            });
        }
        if self.max_concurrency == 0 {
            return Err(MovieClubError::Config {
                message: "max_concurrency must be at least 1".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(MovieClubError::Config {
                message: "request_timeout_secs must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// A single legacy column rename.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnRename {
    pub from: String,
    pub to: String,
}

impl ColumnRename {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Column mapping and exclusion policy applied after enrichment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct SchemaConfig {
    pub renames: Vec<ColumnRename>,
    /// Columns dropped by exact (case-insensitive) name.
    pub drop_columns: Vec<String>,
    /// Columns dropped when their name starts with one of these prefixes.
    pub drop_prefixes: Vec<String>,
    /// Provider ids known to be wrong matches for this dataset.
    pub excluded_provider_ids: BTreeSet<i64>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            renames: vec![ColumnRename::new("Release Year", "Release Date")],
            drop_columns: vec![
                "Vote Link".to_string(),
                "index".to_string(),
                "level_0".to_string(),
                "TMDB ID".to_string(),
                "Movie ID".to_string(),
                "id".to_string(),
            ],
            drop_prefixes: vec!["Unnamed:".to_string()],
            excluded_provider_ids: BTreeSet::from([384717]),
        }
    }
}

/// Full configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Input spreadsheet (CSV).
    pub input_path: PathBuf,
    /// Flat export, overwritten on every run.
    pub export_path: PathBuf,
    /// SQLite database holding the `movies` table.
    pub database_path: PathBuf,
    /// Optional on-disk cache for the genre catalog.
    #[serde(default)]
    pub genre_cache_path: Option<PathBuf>,
    #[serde(default = "default_genre_cache_ttl_secs")]
    pub genre_cache_ttl_secs: u64,
    /// Delete stored rows whose natural key is absent from the current batch.
    #[serde(default = "default_true")]
    pub prune_missing: bool,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
}

fn default_genre_cache_ttl_secs() -> u64 {
    ProviderDefaults::GENRE_CACHE_TTL.as_secs()
}

fn default_true() -> bool {
    true
}

impl PipelineConfig {
    /// Create a config with default provider and schema settings.
    pub fn new(
        input_path: impl Into<PathBuf>,
        export_path: impl Into<PathBuf>,
        database_path: impl Into<PathBuf>,
        provider: ProviderConfig,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            export_path: export_path.into(),
            database_path: database_path.into(),
            genre_cache_path: None,
            genre_cache_ttl_secs: default_genre_cache_ttl_secs(),
            prune_missing: true,
            provider,
            schema: SchemaConfig::default(),
        }
    }

    /// Load a JSON config file. An empty API key is filled from the environment.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| MovieClubError::io_with_path(e, path))?;
        let mut config: PipelineConfig =
            serde_json::from_str(&contents).map_err(|e| MovieClubError::Config {
                message: format!("failed to parse {}: {}", path.display(), e),
            })?;
        config.provider = config.provider.with_env_api_key();
        Ok(config)
    }

    pub fn genre_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.genre_cache_ttl_secs)
    }

    pub fn validate(&self) -> Result<()> {
        self.provider.validate()?;
        if self.export_path == self.database_path {
            return Err(MovieClubError::Config {
                message: "export_path and database_path must differ".to_string(),
            });
        }
        Ok(())
    }
}
