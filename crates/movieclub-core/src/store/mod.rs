//! Persistence sinks: the SQLite movie table and the flat CSV export.

mod export;
mod movie_store;

pub use export::{ExportReport, FlatExporter};
pub use movie_store::{MovieStore, UpsertReport};

use crate::config::StoreConfig;

/// Canonical columns, in storage and export order.
pub const CANONICAL_COLUMNS: [&str; 11] = [
    "movie_name",
    "watched_date",
    "picked_by",
    "avg_rating",
    "provider_id",
    "overview",
    "genres",
    "release_date",
    "vote_average",
    "vote_count",
    "provider_link",
];

pub(crate) fn join_genres(genres: &[String]) -> String {
    genres.join(StoreConfig::GENRE_DELIMITER)
}

pub(crate) fn split_genres(joined: &str) -> Vec<String> {
    joined
        .split(StoreConfig::GENRE_DELIMITER)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genre_join_split() {
        let genres = vec!["Science Fiction".to_string(), "Action".to_string()];
        assert_eq!(join_genres(&genres), "Science Fiction, Action");
        assert_eq!(split_genres("Science Fiction, Action"), genres);
        assert!(split_genres("").is_empty());
    }
}
