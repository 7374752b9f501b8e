//! Writes one run's batch to both sinks.

use crate::cancel::CancellationToken;
use crate::error::{MovieClubError, Result};
use crate::models::EnrichedMovie;
use crate::store::{ExportReport, FlatExporter, MovieStore, UpsertReport};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistReport {
    pub export: ExportReport,
    pub store: UpsertReport,
}

/// Persists enriched rows to the flat export and the relational store.
///
/// The two sinks are independent: the export is written first and is not
/// undone when the store write fails.
#[derive(Debug, Clone)]
pub struct Persister {
    database_path: PathBuf,
    exporter: FlatExporter,
    prune_missing: bool,
}

impl Persister {
    pub fn new(database_path: impl Into<PathBuf>, export_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            exporter: FlatExporter::new(export_path),
            prune_missing: true,
        }
    }

    /// Whether stored rows absent from the batch are deleted.
    pub fn with_prune_missing(mut self, prune_missing: bool) -> Self {
        self.prune_missing = prune_missing;
        self
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn export_path(&self) -> &Path {
        self.exporter.path()
    }

    /// Write `analysis_ready` to the export and `full` to the store.
    ///
    /// A store failure is reported as [`MovieClubError::Persistence`] after
    /// the batch has been rolled back.
    pub fn persist(
        &self,
        full: &[EnrichedMovie],
        analysis_ready: &[EnrichedMovie],
        cancel: &CancellationToken,
    ) -> Result<PersistReport> {
        cancel.check()?;

        let export = self.exporter.write(analysis_ready);
        match &export {
            Ok(report) => info!("Exported {} rows to {}", report.rows, report.path.display()),
            Err(e) => error!("Flat export to {} failed: {}", self.export_path().display(), e),
        }

        let store = self.write_store(full, cancel);
        if let Err(e) = &store {
            error!(
                "Store write to {} failed, batch rolled back: {}",
                self.database_path.display(),
                e
            );
        }

        Ok(PersistReport {
            store: store?,
            export: export?,
        })
    }

    fn write_store(&self, rows: &[EnrichedMovie], cancel: &CancellationToken) -> Result<UpsertReport> {
        let mut store = MovieStore::open(&self.database_path).map_err(into_persistence)?;
        let report = store
            .upsert_batch(rows, self.prune_missing, cancel)
            .map_err(into_persistence)?;
        info!(
            "Stored {} rows in {} ({} pruned, {} total)",
            report.upserted,
            self.database_path.display(),
            report.pruned,
            report.total_rows
        );
        Ok(report)
    }
}

/// Store-side failures surface as persistence errors; cancellation stays as is.
fn into_persistence(err: MovieClubError) -> MovieClubError {
    match err {
        MovieClubError::Persistence { .. } | MovieClubError::Cancelled => err,
        other => MovieClubError::persistence(other.to_string()),
    }
}
