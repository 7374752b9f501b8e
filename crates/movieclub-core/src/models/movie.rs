//! Rated and enriched movie records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Input columns that are not one of the canonical fields, kept in input order.
///
/// These are carried through enrichment untouched so that schema mapping can
/// rename or drop them and the flat export can pass the survivors through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LegacyColumns(Vec<(String, String)>);

impl LegacyColumns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value.as_str())
    }

    /// Insert a value, replacing any existing column with the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(column, _)| *column == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.0.iter().position(|(column, _)| column == name)?;
        Some(self.0.remove(index).1)
    }

    /// Rename a column in place. Returns false when `from` is absent.
    ///
    /// An existing column named `to` is replaced by the renamed value.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return self.get(from).is_some();
        }
        let Some(index) = self.0.iter().position(|(column, _)| column == from) else {
            return false;
        };
        if let Some(existing) = self.0.iter().position(|(column, _)| column == to) {
            let value = self.0.remove(index).1;
            let existing = if existing > index { existing - 1 } else { existing };
            self.0[existing].1 = value;
        } else {
            self.0[index].0 = to.to_string();
        }
        true
    }

    /// Keep only the columns for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.0.retain(|(column, _)| keep(column));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(column, _)| column.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for LegacyColumns {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut columns = LegacyColumns::new();
        for (name, value) in iter {
            columns.insert(name, value);
        }
        columns
    }
}

/// A normalized row of the rating spreadsheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedMovie {
    pub title: String,
    /// Trimmed, lower-cased identity of the member who picked the movie.
    pub picked_by: String,
    pub avg_rating: f64,
    /// `None` when the input had no parseable watch date.
    pub watched_date: Option<NaiveDate>,
    #[serde(default)]
    pub legacy: LegacyColumns,
}

impl RatedMovie {
    pub fn new(
        title: impl Into<String>,
        picked_by: impl Into<String>,
        avg_rating: f64,
        watched_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            title: title.into(),
            picked_by: picked_by.into(),
            avg_rating,
            watched_date,
            legacy: LegacyColumns::new(),
        }
    }

    /// The `(title, watched date)` key used for upserts.
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            title: self.title.clone(),
            watched_date: watched_date_key(self.watched_date),
        }
    }
}

/// Canonical text form of a watch date; empty when unknown.
pub fn watched_date_key(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Natural key of a rated movie record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NaturalKey {
    pub title: String,
    /// ISO date, or the empty string when the watch date is unknown.
    pub watched_date: String,
}

/// Provider-derived fields of an enriched movie.
///
/// All of these exist together or not at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDetails {
    pub provider_id: i64,
    pub overview: String,
    /// Genre names in provider order; ids missing from the catalog are skipped.
    pub genres: Vec<String>,
    /// Opaque provider value, not reparsed (may be a full date or a bare year).
    pub release_date: String,
    pub vote_average: f64,
    pub vote_count: i64,
    pub provider_link: String,
}

/// A rated movie merged with provider metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedMovie {
    #[serde(flatten)]
    pub movie: RatedMovie,
    pub provider: Option<ProviderDetails>,
}

impl EnrichedMovie {
    /// A row with no provider match.
    pub fn unmatched(movie: RatedMovie) -> Self {
        Self {
            movie,
            provider: None,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.provider.is_some()
    }

    pub fn title(&self) -> &str {
        &self.movie.title
    }

    pub fn natural_key(&self) -> NaturalKey {
        self.movie.natural_key()
    }

    pub fn provider_id(&self) -> Option<i64> {
        self.provider.as_ref().map(|p| p.provider_id)
    }

    pub fn overview(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.overview.as_str())
    }

    /// Resolved genre names; empty when unmatched.
    pub fn genres(&self) -> &[String] {
        self.provider
            .as_ref()
            .map(|p| p.genres.as_slice())
            .unwrap_or(&[])
    }

    pub fn release_date(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.release_date.as_str())
    }

    pub fn vote_average(&self) -> Option<f64> {
        self.provider.as_ref().map(|p| p.vote_average)
    }

    pub fn vote_count(&self) -> Option<i64> {
        self.provider.as_ref().map(|p| p.vote_count)
    }

    pub fn provider_link(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.provider_link.as_str())
    }

    /// Copy of this row with every provider field cleared.
    pub fn as_unmatched(&self) -> Self {
        Self::unmatched(self.movie.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy(pairs: &[(&str, &str)]) -> LegacyColumns {
        pairs
            .iter()
            .map(|(c, v)| (c.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_rename_keeps_position() {
        let mut columns = legacy(&[("Unnamed: 0", "1"), ("Release Year", "2010"), ("Notes", "x")]);
        assert!(columns.rename("Release Year", "Release Date"));
        assert_eq!(
            columns.names().collect::<Vec<_>>(),
            vec!["Unnamed: 0", "Release Date", "Notes"]
        );
        assert_eq!(columns.get("Release Date"), Some("2010"));
    }

    #[test]
    fn test_rename_absent_column_is_noop() {
        let mut columns = legacy(&[("Notes", "x")]);
        assert!(!columns.rename("Release Year", "Release Date"));
        assert_eq!(columns, legacy(&[("Notes", "x")]));
    }

    #[test]
    fn test_rename_onto_existing_column_replaces_value() {
        let mut columns = legacy(&[("Release Date", "old"), ("Release Year", "2010")]);
        assert!(columns.rename("Release Year", "Release Date"));
        assert_eq!(columns, legacy(&[("Release Date", "2010")]));
    }

    #[test]
    fn test_natural_key_with_unknown_date() {
        let movie = RatedMovie::new("Heat", "jim", 9.0, None);
        assert_eq!(movie.natural_key().watched_date, "");
    }

    #[test]
    fn test_unmatched_accessors_are_absent() {
        let movie = EnrichedMovie::unmatched(RatedMovie::new("Heat", "jim", 9.0, None));
        assert!(!movie.is_matched());
        assert_eq!(movie.provider_id(), None);
        assert_eq!(movie.overview(), None);
        assert!(movie.genres().is_empty());
        assert_eq!(movie.release_date(), None);
        assert_eq!(movie.vote_average(), None);
        assert_eq!(movie.vote_count(), None);
        assert_eq!(movie.provider_link(), None);
    }
}
