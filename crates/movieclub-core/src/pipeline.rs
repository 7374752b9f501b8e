//! End-to-end run: normalize, resolve, enrich, map, persist.

use crate::cancel::CancellationToken;
use crate::config::PipelineConfig;
use crate::enricher::Enricher;
use crate::error::{MovieClubError, Result};
use crate::genres::GenreCatalog;
use crate::models::{EnrichedMovie, RatedMovie};
use crate::network::{retry_async_with_hint, RetryConfig};
use crate::normalizer::{NormalizeReport, RawTable, RecordNormalizer};
use crate::persister::{PersistReport, Persister};
use crate::provider::{MetadataProvider, TmdbClient};
use crate::resolver::{classify, MetadataResolver, Resolution};
use crate::schema::SchemaMapper;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Summary of one pipeline run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub normalize: NormalizeReport,
    pub genres_loaded: usize,
    /// Rows with a provider match, including excluded ids.
    pub matched: usize,
    pub unmatched: usize,
    /// Lookups that failed after retries and were recorded as no match.
    pub provider_failures: usize,
    /// Matched rows cleared from the analysis-ready view.
    pub excluded: usize,
    /// Lookup attempts beyond the first, across all rows.
    pub retries: u32,
    pub persist: PersistReport,
}

#[derive(Debug, Default)]
struct LookupCounts {
    matched: usize,
    unmatched: usize,
    provider_failures: usize,
    retries: u32,
}

/// A configured pipeline bound to one metadata provider.
pub struct Pipeline {
    config: PipelineConfig,
    provider: Arc<dyn MetadataProvider>,
}

impl Pipeline {
    /// Validate the configuration and connect to TMDB.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let provider = Arc::new(TmdbClient::new(config.provider.clone())?);
        Ok(Self { config, provider })
    }

    /// Use an already-built provider. Provider credentials in `config` are
    /// not checked.
    pub fn with_provider(config: PipelineConfig, provider: Arc<dyn MetadataProvider>) -> Self {
        Self { config, provider }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole pipeline once.
    ///
    /// Structural input errors fail before any provider call. Provider
    /// failures never fail the run. Cancellation before the store commit
    /// leaves the store untouched.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunReport> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(
            "Starting run {} for {}",
            run_id,
            self.config.input_path.display()
        );

        if self.config.export_path == self.config.database_path {
            return Err(MovieClubError::Config {
                message: "export_path and database_path must differ".to_string(),
            });
        }
        cancel.check()?;

        let table = RawTable::from_path(&self.config.input_path)?;
        let (movies, normalize) =
            RecordNormalizer::with_schema(self.config.schema.clone()).normalize(&table)?;

        let catalog = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MovieClubError::Cancelled),
            catalog = self.load_catalog() => catalog,
        };
        let genres_loaded = catalog.len();
        let enricher =
            Enricher::with_link_template(Arc::new(catalog), self.config.provider.link_template.clone());

        let (enriched, counts) = self.enrich_all(movies, &enricher, cancel).await?;
        cancel.check()?;

        let mapper = SchemaMapper::new(self.config.schema.clone());
        let full = mapper.map(enriched);
        let excluded = mapper.count_excluded(&full);
        let analysis_ready = mapper.analysis_ready(&full);

        let persist = Persister::new(&self.config.database_path, &self.config.export_path)
            .with_prune_missing(self.config.prune_missing)
            .persist(&full, &analysis_ready, cancel)?;

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            normalize,
            genres_loaded,
            matched: counts.matched,
            unmatched: counts.unmatched,
            provider_failures: counts.provider_failures,
            excluded,
            retries: counts.retries,
            persist,
        };
        info!(
            "Run {} complete: {} matched, {} unmatched ({} provider failures), {} excluded",
            report.run_id, report.matched, report.unmatched, report.provider_failures, report.excluded
        );
        Ok(report)
    }

    async fn load_catalog(&self) -> GenreCatalog {
        match &self.config.genre_cache_path {
            Some(path) => {
                GenreCatalog::load_or_fetch(
                    self.provider.as_ref(),
                    path,
                    self.config.genre_cache_ttl(),
                )
                .await
            }
            None => GenreCatalog::fetch(self.provider.as_ref()).await,
        }
    }

    /// Resolve every movie with bounded concurrency, keeping input order.
    async fn enrich_all(
        &self,
        movies: Vec<RatedMovie>,
        enricher: &Enricher,
        cancel: &CancellationToken,
    ) -> Result<(Vec<EnrichedMovie>, LookupCounts)> {
        let total = movies.len();
        let resolver = MetadataResolver::new(self.provider.clone());
        let retry_config = RetryConfig::from(&self.config.provider.retry);
        let concurrency = self.config.provider.max_concurrency.max(1);

        let resolver = &resolver;
        let retry_config = &retry_config;

        let resolved: Vec<(RatedMovie, Resolution, u32)> = stream::iter(movies)
            .map(|movie| async move {
                let title = movie.title.clone();
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(MovieClubError::Cancelled),
                    (result, stats) = retry_async_with_hint(
                        retry_config,
                        || resolver.try_resolve(&title),
                        MovieClubError::is_retryable,
                        MovieClubError::retry_after,
                    ) => Ok((movie, classify(&title, result), stats.attempts)),
                }
            })
            .buffered(concurrency)
            .try_collect()
            .await?;

        let mut counts = LookupCounts::default();
        let enriched: Vec<EnrichedMovie> = resolved
            .into_iter()
            .map(|(movie, resolution, attempts)| {
                counts.retries += attempts.saturating_sub(1);
                match &resolution {
                    Resolution::Matched(_) => counts.matched += 1,
                    Resolution::NoMatch => counts.unmatched += 1,
                    Resolution::Unavailable(_) => {
                        counts.unmatched += 1;
                        counts.provider_failures += 1;
                    }
                }
                enricher.merge(movie, resolution.into_candidate())
            })
            .collect();

        if total > 0 && counts.provider_failures == total {
            warn!(
                "Provider {} failed for all {} lookups; every row is unmatched",
                self.provider.name(),
                total
            );
        }
        Ok((enriched, counts))
    }
}
