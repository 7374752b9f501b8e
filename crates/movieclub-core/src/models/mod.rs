//! Data types shared across the pipeline.

mod movie;
mod provider;

pub use movie::{
    watched_date_key, EnrichedMovie, LegacyColumns, NaturalKey, ProviderDetails, RatedMovie,
};
pub use provider::{GenreEntry, MatchCandidate};
pub(crate) use provider::{GenreListResponse, SearchResponse};
