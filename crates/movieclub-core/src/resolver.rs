//! Title → provider match resolution.
//!
//! Selection is deliberately simple: the provider's first-ranked result wins.
//! There is no local re-ranking, so two films sharing a title can resolve to
//! the wrong one; the exclusion list in the schema config is how known bad
//! matches are neutralized.

use crate::error::{MovieClubError, Result};
use crate::models::MatchCandidate;
use crate::network::is_permanent_failure;
use crate::provider::MetadataProvider;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Outcome of resolving one title.
#[derive(Debug)]
pub enum Resolution {
    Matched(MatchCandidate),
    /// The provider answered with zero results.
    NoMatch,
    /// The provider could not answer; treated as no match for the row.
    Unavailable(MovieClubError),
}

impl Resolution {
    pub fn into_candidate(self) -> Option<MatchCandidate> {
        match self {
            Resolution::Matched(candidate) => Some(candidate),
            Resolution::NoMatch | Resolution::Unavailable(_) => None,
        }
    }
}

/// Resolves titles against a metadata provider.
#[derive(Clone)]
pub struct MetadataResolver {
    provider: Arc<dyn MetadataProvider>,
}

impl MetadataResolver {
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &dyn MetadataProvider {
        self.provider.as_ref()
    }

    /// Fallible lookup: `Ok(None)` for zero results, `Err` when the provider
    /// could not answer. No retrying happens here.
    pub async fn try_resolve(&self, title: &str) -> Result<Option<MatchCandidate>> {
        if title.trim().is_empty() {
            return Ok(None);
        }
        let results = self.provider.search_movies(title).await?;
        debug!(
            "{} returned {} candidates for '{}'",
            self.provider.name(),
            results.len(),
            title
        );
        Ok(results.into_iter().next())
    }

    /// Lookup that folds provider failures into [`Resolution::Unavailable`].
    pub async fn resolve_outcome(&self, title: &str) -> Resolution {
        classify(title, self.try_resolve(title).await)
    }

    /// Lookup returning the first-ranked candidate, or `None` for zero
    /// results and for any provider failure.
    pub async fn resolve(&self, title: &str) -> Option<MatchCandidate> {
        self.resolve_outcome(title).await.into_candidate()
    }
}

/// Turn a lookup result into a [`Resolution`], logging provider failures.
pub(crate) fn classify(title: &str, result: Result<Option<MatchCandidate>>) -> Resolution {
    match result {
        Ok(Some(candidate)) => Resolution::Matched(candidate),
        Ok(None) => Resolution::NoMatch,
        Err(e) => {
            if let MovieClubError::ProviderStatus { status, .. } = &e {
                if matches!(status, 401 | 403) {
                    error!("Provider rejected the API key while resolving '{}': {}", title, e);
                } else if is_permanent_failure(*status) {
                    warn!("Provider refused '{}': {}", title, e);
                } else {
                    warn!("Provider unavailable for '{}': {}", title, e);
                }
            } else {
                warn!("Provider unavailable for '{}': {}", title, e);
            }
            Resolution::Unavailable(e)
        }
    }
}
