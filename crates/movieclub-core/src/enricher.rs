//! Merges provider matches into rated movies.

use crate::config::ProviderDefaults;
use crate::genres::GenreCatalog;
use crate::models::{EnrichedMovie, MatchCandidate, ProviderDetails, RatedMovie};
use crate::resolver::MetadataResolver;
use std::sync::Arc;
use tracing::debug;

/// Builds [`EnrichedMovie`] rows from a genre catalog snapshot.
#[derive(Debug, Clone)]
pub struct Enricher {
    catalog: Arc<GenreCatalog>,
    link_template: String,
}

impl Enricher {
    /// Create an enricher using the default provider link template.
    pub fn new(catalog: Arc<GenreCatalog>) -> Self {
        Self::with_link_template(catalog, ProviderDefaults::LINK_TEMPLATE)
    }

    pub fn with_link_template(catalog: Arc<GenreCatalog>, link_template: impl Into<String>) -> Self {
        Self {
            catalog,
            link_template: link_template.into(),
        }
    }

    pub fn catalog(&self) -> &GenreCatalog {
        &self.catalog
    }

    /// Resolve the movie's title and merge the result.
    pub async fn enrich(&self, movie: RatedMovie, resolver: &MetadataResolver) -> EnrichedMovie {
        let candidate = resolver.resolve(&movie.title).await;
        self.merge(movie, candidate)
    }

    /// Merge an already-resolved candidate (or its absence) into the movie.
    pub fn merge(&self, movie: RatedMovie, candidate: Option<MatchCandidate>) -> EnrichedMovie {
        let Some(candidate) = candidate else {
            debug!("No provider match for '{}'", movie.title);
            return EnrichedMovie::unmatched(movie);
        };

        let genres = self.catalog.resolve_all(&candidate.genre_ids);
        if genres.len() < candidate.genre_ids.len() {
            debug!(
                "'{}': {} of {} genre ids not in catalog",
                movie.title,
                candidate.genre_ids.len() - genres.len(),
                candidate.genre_ids.len()
            );
        }

        EnrichedMovie {
            movie,
            provider: Some(ProviderDetails {
                provider_id: candidate.provider_id,
                overview: candidate.overview,
                genres,
                release_date: candidate.release_date,
                vote_average: candidate.vote_average,
                vote_count: candidate.vote_count,
                provider_link: provider_link(&self.link_template, candidate.provider_id),
            }),
        }
    }
}

/// Fill the `{id}` placeholder of a link template.
pub fn provider_link(template: &str, provider_id: i64) -> String {
    template.replace("{id}", &provider_id.to_string())
}
