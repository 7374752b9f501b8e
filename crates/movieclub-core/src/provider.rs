//! Metadata provider contract and the TMDB implementation.
//!
//! One provider contract is enough for this dataset: a ranked title search and
//! a static genre list. Authentication is a single API key passed as the
//! `api_key` query parameter.

use crate::config::{ProviderConfig, ProviderDefaults};
use crate::error::{MovieClubError, Result};
use crate::models::{GenreEntry, GenreListResponse, MatchCandidate, SearchResponse};
use crate::network::{build_client, get_json};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// External metadata catalog queried by title.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Search by exact title; results are in the provider's ranking order.
    async fn search_movies(&self, title: &str) -> Result<Vec<MatchCandidate>>;

    /// The provider's genre-id → name list.
    async fn genre_list(&self) -> Result<Vec<GenreEntry>>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// HTTP client for The Movie Database v3 API.
pub struct TmdbClient {
    client: Client,
    config: ProviderConfig,
}

impl std::fmt::Debug for TmdbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TmdbClient")
            .field("base_url", &self.config.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl TmdbClient {
    /// Create a client from validated provider configuration.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config)?;
        Ok(Self { client, config })
    }

    fn timeout(&self) -> Duration {
        self.config.request_timeout()
    }

    /// Build an endpoint URL carrying the API key and the given parameters.
    fn endpoint_url(&self, path: &str, params: &[(&str, &str)]) -> Result<url::Url> {
        let mut raw = format!(
            "{}/{}?api_key={}",
            self.config.base_url.trim_end_matches('/'),
            path,
            urlencoding::encode(&self.config.api_key)
        );
        for (name, value) in params {
            raw.push('&');
            raw.push_str(name);
            raw.push('=');
            raw.push_str(&urlencoding::encode(value));
        }
        if let Some(language) = &self.config.language {
            raw.push_str("&language=");
            raw.push_str(&urlencoding::encode(language));
        }
        url::Url::parse(&raw).map_err(|e| MovieClubError::Config {
            message: format!("invalid provider URL for {}: {}", path, e),
        })
    }
}

#[async_trait]
impl MetadataProvider for TmdbClient {
    async fn search_movies(&self, title: &str) -> Result<Vec<MatchCandidate>> {
        let include_adult = if self.config.include_adult { "true" } else { "false" };
        let url = self.endpoint_url(
            ProviderDefaults::SEARCH_PATH,
            &[("query", title), ("include_adult", include_adult)],
        )?;

        let response: SearchResponse =
            get_json(&self.client, url, ProviderDefaults::SEARCH_PATH, self.timeout()).await?;
        debug!("Search '{}' returned {} results", title, response.results.len());

        Ok(response
            .results
            .into_iter()
            .map(MatchCandidate::from)
            .collect())
    }

    async fn genre_list(&self) -> Result<Vec<GenreEntry>> {
        let url = self.endpoint_url(ProviderDefaults::GENRE_LIST_PATH, &[])?;
        let response: GenreListResponse = get_json(
            &self.client,
            url,
            ProviderDefaults::GENRE_LIST_PATH,
            self.timeout(),
        )
        .await?;
        Ok(response.genres)
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}
