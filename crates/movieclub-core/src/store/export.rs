//! Flat CSV export of the analysis-ready rows.
//!
//! The file is written to a temp file next to the target and renamed into
//! place, so readers never see a partial export.

use crate::error::{MovieClubError, Result};
use crate::models::{watched_date_key, EnrichedMovie};
use crate::schema::legacy_column_order;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{join_genres, CANONICAL_COLUMNS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: Vec<String>,
}

/// Writes enriched rows as one CSV file.
#[derive(Debug, Clone)]
pub struct FlatExporter {
    path: PathBuf,
}

impl FlatExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the export with `rows`.
    ///
    /// Columns are the canonical ones followed by any surviving legacy
    /// columns in first-seen order. Absent values are written as empty cells.
    pub fn write(&self, rows: &[EnrichedMovie]) -> Result<ExportReport> {
        let legacy: Vec<String> = legacy_column_order(rows)
            .into_iter()
            .filter(|name| !CANONICAL_COLUMNS.contains(&name.as_str()))
            .collect();
        let columns: Vec<String> = CANONICAL_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(legacy.iter().cloned())
            .collect();

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| MovieClubError::io_with_path(e, parent))?;

        let temp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| MovieClubError::io_with_path(e, parent))?;
        let mut writer = csv::Writer::from_writer(temp);
        writer.write_record(&columns)?;

        for row in rows {
            let mut record = canonical_record(row);
            record.extend(
                legacy
                    .iter()
                    .map(|name| row.movie.legacy.get(name).unwrap_or_default().to_string()),
            );
            writer.write_record(&record)?;
        }

        let temp = writer.into_inner().map_err(|e| MovieClubError::Io {
            message: e.to_string(),
            path: Some(self.path.clone()),
            source: None,
        })?;
        temp.as_file()
            .sync_all()
            .map_err(|e| MovieClubError::io_with_path(e, &self.path))?;
        temp.persist(&self.path)
            .map_err(|e| MovieClubError::io_with_path(e.error, &self.path))?;

        debug!("Wrote {} rows to {}", rows.len(), self.path.display());
        Ok(ExportReport {
            path: self.path.clone(),
            rows: rows.len(),
            columns,
        })
    }
}

fn canonical_record(row: &EnrichedMovie) -> Vec<String> {
    let movie = &row.movie;
    let mut record = vec![
        movie.title.clone(),
        watched_date_key(movie.watched_date),
        movie.picked_by.clone(),
        format_float(movie.avg_rating),
    ];
    match &row.provider {
        Some(details) => record.extend([
            details.provider_id.to_string(),
            details.overview.clone(),
            join_genres(&details.genres),
            details.release_date.clone(),
            format_float(details.vote_average),
            details.vote_count.to_string(),
            details.provider_link.clone(),
        ]),
        None => record.extend(std::iter::repeat(String::new()).take(7)),
    }
    record
}

/// Whole numbers keep one decimal place (`8.0`, not `8`).
fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}
