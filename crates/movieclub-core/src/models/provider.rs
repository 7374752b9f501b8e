//! Metadata provider payloads and the match candidate derived from them.

use serde::{Deserialize, Serialize};

/// The provider's best answer for a title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCandidate {
    pub provider_id: i64,
    pub overview: String,
    /// Genre ids in the provider's order.
    pub genre_ids: Vec<i64>,
    pub release_date: String,
    pub vote_average: f64,
    pub vote_count: i64,
}

/// `GET /search/movie` response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

/// One ranked entry of a search response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchResult {
    pub id: i64,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub genre_ids: Vec<i64>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<i64>,
}

impl From<SearchResult> for MatchCandidate {
    fn from(result: SearchResult) -> Self {
        Self {
            provider_id: result.id,
            overview: result.overview.unwrap_or_default(),
            genre_ids: result.genre_ids,
            release_date: result.release_date.unwrap_or_default(),
            vote_average: result.vote_average.unwrap_or_default(),
            vote_count: result.vote_count.unwrap_or_default(),
        }
    }
}

/// `GET /genre/movie/list` response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GenreListResponse {
    pub genres: Vec<GenreEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenreEntry {
    pub id: i64,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_tolerates_missing_fields() {
        let json = r#"{
            "page": 1,
            "results": [
                {"id": 27205, "title": "Inception", "genre_ids": [28, 878], "release_date": "2010-07-15",
                 "vote_average": 8.4, "vote_count": 36000, "overview": "A thief..."},
                {"id": 1, "title": "Inception: The Cobol Job", "overview": null}
            ]
        }"#;
        let response: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.results.len(), 2);

        let first = MatchCandidate::from(response.results[0].clone());
        assert_eq!(first.provider_id, 27205);
        assert_eq!(first.genre_ids, vec![28, 878]);
        assert_eq!(first.release_date, "2010-07-15");

        let second = MatchCandidate::from(response.results[1].clone());
        assert_eq!(second.overview, "");
        assert!(second.genre_ids.is_empty());
        assert_eq!(second.vote_count, 0);
    }

    #[test]
    fn test_search_response_without_results_key() {
        let response: SearchResponse = serde_json::from_str(r#"{"page": 1}"#).unwrap();
        assert!(response.results.is_empty());
    }

    #[test]
    fn test_genre_list_parses() {
        let json = r#"{"genres": [{"id": 28, "name": "Action"}, {"id": 18, "name": "Drama"}]}"#;
        let response: GenreListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            response.genres[1],
            GenreEntry {
                id: 18,
                name: "Drama".into()
            }
        );
    }
}
