//! Input loading and record normalization.
//!
//! Raw spreadsheet rows are cleaned into [`RatedMovie`] values: the picked-by
//! identity is trimmed and lower-cased, ratings are coerced to finite numbers
//! (rows that fail are dropped and counted), and exact duplicates are removed
//! before any provider lookups happen.

use crate::error::{MovieClubError, Result};
use crate::config::SchemaConfig;
use crate::models::{LegacyColumns, NaturalKey, RatedMovie};
use crate::schema::SchemaMapper;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

const TITLE_ALIASES: &[&str] = &["movie name", "movie", "title"];
const PICKED_BY_ALIASES: &[&str] = &["picked by", "picked_by", "picker"];
const RATING_ALIASES: &[&str] = &["avg rating", "average rating", "avg_rating", "rating"];
const WATCHED_ALIASES: &[&str] = &["date watched", "watched date", "watched_date", "watched", "date"];

// Two-digit years first: `%Y` would happily read "22" as year 22.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Raw tabular input: a header row plus string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Build a table from in-memory headers and rows.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Read a CSV file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file =
            std::fs::File::open(path).map_err(|e| MovieClubError::io_with_path(e, path))?;
        Self::from_reader(file)
    }

    /// Read CSV from any reader. Blank header cells become `Unnamed: {index}`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(index, header)| {
                let header = header.trim();
                if header.is_empty() {
                    format!("Unnamed: {}", index)
                } else {
                    header.to_string()
                }
            })
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }
}

/// Counters describing what normalization kept and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeReport {
    pub input_rows: usize,
    pub dropped_missing_title: usize,
    pub dropped_invalid_rating: usize,
    pub duplicates_removed: usize,
    /// Rows kept with an unknown watch date.
    pub unparsed_dates: usize,
    /// Kept rows sharing a natural key with an earlier, non-identical row.
    pub natural_key_collisions: usize,
    pub output_rows: usize,
}

/// Indices of the canonical columns within the input header.
#[derive(Debug, Clone)]
struct ColumnLayout {
    title: usize,
    rating: usize,
    picked_by: Option<usize>,
    watched: Option<usize>,
}

impl ColumnLayout {
    fn resolve(headers: &[String]) -> Result<Self> {
        let find = |aliases: &[&str]| {
            headers
                .iter()
                .position(|h| aliases.contains(&h.trim().to_lowercase().as_str()))
        };

        let title = find(TITLE_ALIASES).ok_or_else(|| MovieClubError::InvalidInput {
            message: format!(
                "no title column found (expected one of {:?}, got {:?})",
                TITLE_ALIASES, headers
            ),
        })?;
        let rating = find(RATING_ALIASES).ok_or_else(|| MovieClubError::InvalidInput {
            message: format!(
                "no rating column found (expected one of {:?}, got {:?})",
                RATING_ALIASES, headers
            ),
        })?;

        Ok(Self {
            title,
            rating,
            picked_by: find(PICKED_BY_ALIASES),
            watched: find(WATCHED_ALIASES),
        })
    }

    fn is_canonical(&self, index: usize) -> bool {
        index == self.title
            || index == self.rating
            || Some(index) == self.picked_by
            || Some(index) == self.watched
    }
}

/// Cleans raw rows into canonical rated movies.
///
/// Duplicate detection ignores legacy columns that schema mapping drops
/// later, such as a spreadsheet index column.
#[derive(Debug, Clone, Default)]
pub struct RecordNormalizer {
    mapper: SchemaMapper,
}

impl RecordNormalizer {
    /// Normalizer using the default column drop rules.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(schema: SchemaConfig) -> Self {
        Self {
            mapper: SchemaMapper::new(schema),
        }
    }

    /// Normalize every row of `table`.
    ///
    /// Fails only when the title or rating column is missing from the header;
    /// per-row problems are dropped or tolerated and reported in the counters.
    pub fn normalize(&self, table: &RawTable) -> Result<(Vec<RatedMovie>, NormalizeReport)> {
        let layout = ColumnLayout::resolve(&table.headers)?;
        let mut report = NormalizeReport {
            input_rows: table.rows.len(),
            ..NormalizeReport::default()
        };

        let mut seen = HashSet::new();
        let mut keys: HashMap<NaturalKey, usize> = HashMap::new();
        let mut movies = Vec::with_capacity(table.rows.len());

        for (line, row) in table.rows.iter().enumerate() {
            let cell = |index: usize| row.get(index).map(|c| c.trim()).unwrap_or("");

            let title = cell(layout.title);
            if title.is_empty() {
                debug!("Row {}: empty title, dropped", line + 1);
                report.dropped_missing_title += 1;
                continue;
            }

            let Some(avg_rating) = coerce_rating(cell(layout.rating)) else {
                debug!(
                    "Row {}: rating {:?} is not numeric, dropped",
                    line + 1,
                    cell(layout.rating)
                );
                report.dropped_invalid_rating += 1;
                continue;
            };

            let picked_by = layout
                .picked_by
                .map(|index| normalize_identity(cell(index)))
                .unwrap_or_default();

            let raw_date = layout.watched.map(cell).unwrap_or("");
            let watched_date = parse_watched_date(raw_date);
            if watched_date.is_none() {
                if !raw_date.is_empty() {
                    warn!("Row {}: unrecognized watch date {:?}", line + 1, raw_date);
                }
                report.unparsed_dates += 1;
            }

            let legacy: LegacyColumns = table
                .headers
                .iter()
                .enumerate()
                .filter(|(index, _)| !layout.is_canonical(*index))
                .map(|(index, header)| {
                    (header.clone(), row.get(index).cloned().unwrap_or_default())
                })
                .collect();

            let movie = RatedMovie {
                title: title.to_string(),
                picked_by,
                avg_rating,
                watched_date,
                legacy,
            };

            if !seen.insert(RowIdentity::of(&movie, &self.mapper)) {
                report.duplicates_removed += 1;
                continue;
            }

            let occurrences = keys.entry(movie.natural_key()).or_insert(0);
            *occurrences += 1;
            if *occurrences > 1 {
                warn!(
                    "'{}' watched {:?} appears more than once with different values",
                    movie.title, movie.watched_date
                );
                report.natural_key_collisions += 1;
            }

            movies.push(movie);
        }

        report.output_rows = movies.len();
        info!(
            "Normalized {} of {} rows ({} bad ratings, {} duplicates, {} missing titles)",
            report.output_rows,
            report.input_rows,
            report.dropped_invalid_rating,
            report.duplicates_removed,
            report.dropped_missing_title
        );

        Ok((movies, report))
    }
}

/// Field-wise identity of a normalized row, used for exact-duplicate removal.
#[derive(Debug, PartialEq, Eq, Hash)]
struct RowIdentity {
    title: String,
    picked_by: String,
    rating_bits: u64,
    watched_date: Option<NaiveDate>,
    legacy: LegacyColumns,
}

impl RowIdentity {
    fn of(movie: &RatedMovie, mapper: &SchemaMapper) -> Self {
        // -0.0 and 0.0 compare equal, so give them the same bits.
        let rating = if movie.avg_rating == 0.0 {
            0.0
        } else {
            movie.avg_rating
        };
        Self {
            title: movie.title.clone(),
            picked_by: movie.picked_by.clone(),
            rating_bits: rating.to_bits(),
            watched_date: movie.watched_date,
            legacy: movie
                .legacy
                .iter()
                .filter(|(name, _)| !mapper.is_dropped(name))
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }
    }
}

/// Trim and lower-case a member identity.
pub fn normalize_identity(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Coerce a rating cell to a finite number.
pub fn coerce_rating(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Parse a watch date in any of the accepted spreadsheet formats.
pub fn parse_watched_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
                .map(|dt| dt.date())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> RawTable {
        RawTable::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_normalizes_single_row() {
        let input = table("Movie Name,Picked By,Avg Rating,Date Watched\nInception, Jon ,8,2022-01-05\n");
        let (movies, report) = RecordNormalizer::new().normalize(&input).unwrap();

        assert_eq!(movies.len(), 1);
        assert_eq!(
            movies[0],
            RatedMovie::new(
                "Inception",
                "jon",
                8.0,
                NaiveDate::from_ymd_opt(2022, 1, 5)
            )
        );
        assert_eq!(report.output_rows, 1);
    }

    #[test]
    fn test_drops_non_numeric_ratings() {
        let input = table(
            "Movie Name,Picked By,Avg Rating,Date Watched\n\
             Heat,jim,9.5,2022-02-01\n\
             Alien,phil,n/a,2022-02-08\n\
             Ran,PHILL,,2022-02-15\n\
             Jaws,jon,NaN,2022-02-22\n",
        );
        let (movies, report) = RecordNormalizer::new().normalize(&input).unwrap();

        assert_eq!(movies.len(), 1);
        assert_eq!(report.dropped_invalid_rating, 3);
        assert!(movies.iter().all(|m| m.avg_rating.is_finite()));
    }

    #[test]
    fn test_removes_exact_duplicates_after_cleaning() {
        let input = table(
            "Movie Name,Picked By,Avg Rating,Date Watched\n\
             Heat,Jim,9,2022-02-01\n\
             Heat, jim ,9.0,2022-02-01\n\
             Heat,jim,8,2022-02-01\n",
        );
        let (movies, report) = RecordNormalizer::new().normalize(&input).unwrap();

        assert_eq!(movies.len(), 2);
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.natural_key_collisions, 1);
    }

    #[test]
    fn test_index_column_does_not_hide_duplicates() {
        let input = table(
            ",Movie Name,Picked By,Avg Rating,Date Watched,Notes\n\
             0,Heat,jim,9,2022-02-01,great\n\
             1,Heat,jim,9,2022-02-01,great\n\
             2,Heat,jim,9,2022-02-01,again\n",
        );
        let (movies, report) = RecordNormalizer::new().normalize(&input).unwrap();

        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.natural_key_collisions, 1);
        assert_eq!(movies.len(), 2);
        assert_eq!(movies[0].legacy.get("Unnamed: 0"), Some("0"));
        assert_eq!(movies[1].legacy.get("Notes"), Some("again"));
    }

    #[test]
    fn test_custom_schema_drop_rules_apply_to_identity() {
        let schema = SchemaConfig {
            drop_columns: vec!["Notes".to_string()],
            ..SchemaConfig::default()
        };
        let input = table(
            "Movie Name,Avg Rating,Date Watched,Notes\n\
             Heat,9,2022-02-01,great\n\
             Heat,9,2022-02-01,again\n",
        );
        let (movies, report) = RecordNormalizer::with_schema(schema)
            .normalize(&input)
            .unwrap();

        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(movies.len(), 1);
    }

    #[test]
    fn test_missing_rating_column_is_invalid_input() {
        let input = table("Movie Name,Picked By\nHeat,jim\n");
        let err = RecordNormalizer::new().normalize(&input).unwrap_err();
        assert!(matches!(err, MovieClubError::InvalidInput { .. }));
    }

    #[test]
    fn test_missing_title_column_is_invalid_input() {
        let input = table("Picked By,Avg Rating\njim,7\n");
        assert!(RecordNormalizer::new().normalize(&input).is_err());
    }

    #[test]
    fn test_missing_optional_columns_are_tolerated() {
        let input = table("Title,Rating\nHeat,7\n");
        let (movies, report) = RecordNormalizer::new().normalize(&input).unwrap();
        assert_eq!(movies[0].picked_by, "");
        assert_eq!(movies[0].watched_date, None);
        assert_eq!(report.unparsed_dates, 1);
    }

    #[test]
    fn test_legacy_columns_are_carried_in_order() {
        let input = table(",Movie Name,Picked By,Avg Rating,Date Watched,Release Year\n0,Heat,jim,9,2022-02-01,1995\n");
        let (movies, _) = RecordNormalizer::new().normalize(&input).unwrap();
        assert_eq!(
            movies[0].legacy.names().collect::<Vec<_>>(),
            vec!["Unnamed: 0", "Release Year"]
        );
        assert_eq!(movies[0].legacy.get("Release Year"), Some("1995"));
    }

    #[test]
    fn test_empty_title_rows_dropped() {
        let input = table("Movie Name,Avg Rating\n  ,7\nHeat,8\n");
        let (movies, report) = RecordNormalizer::new().normalize(&input).unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(report.dropped_missing_title, 1);
    }

    #[test]
    fn test_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2022, 1, 5);
        assert_eq!(parse_watched_date("2022-01-05"), expected);
        assert_eq!(parse_watched_date("1/5/2022"), expected);
        assert_eq!(parse_watched_date("01/05/22"), expected);
        assert_eq!(parse_watched_date("January 5, 2022"), expected);
        assert_eq!(parse_watched_date("2022-01-05 00:00:00"), expected);
        assert_eq!(parse_watched_date("last tuesday"), None);
    }

    #[test]
    fn test_identity_normalization() {
        assert_eq!(normalize_identity("  Phil \t"), "phil");
    }
}
