//! Legacy column mapping and the analysis-ready view.
//!
//! Mapping only renames and drops legacy columns; the canonical fields and the
//! provider fields are never touched. The exclusion policy is applied as a
//! separate view so the full-fidelity rows can still be persisted as-is.

use crate::config::SchemaConfig;
use crate::models::{EnrichedMovie, LegacyColumns};
use std::collections::BTreeSet;
use tracing::debug;

/// Applies the configured column renames, drops and exclusion ids.
#[derive(Debug, Clone, Default)]
pub struct SchemaMapper {
    config: SchemaConfig,
}

impl SchemaMapper {
    pub fn new(config: SchemaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    /// Rename and drop legacy columns on every row.
    ///
    /// Renames are label changes only: a `Release Year` value such as `1995`
    /// moves to `Release Date` unchanged. Dropping a column that is not there
    /// is a no-op, so mapping an already-mapped batch changes nothing.
    pub fn map(&self, rows: Vec<EnrichedMovie>) -> Vec<EnrichedMovie> {
        rows.into_iter()
            .map(|mut row| {
                self.map_columns(&mut row.movie.legacy);
                row
            })
            .collect()
    }

    fn map_columns(&self, columns: &mut LegacyColumns) {
        for rename in &self.config.renames {
            if columns.rename(&rename.from, &rename.to) {
                debug!("Renamed column '{}' to '{}'", rename.from, rename.to);
            }
        }
        columns.retain(|name| !self.is_dropped(name));
    }

    /// Whether a column name is on the drop list.
    ///
    /// Exact names and prefixes both match case-insensitively.
    pub fn is_dropped(&self, name: &str) -> bool {
        let name = name.trim();
        self.config
            .drop_columns
            .iter()
            .any(|dropped| dropped.eq_ignore_ascii_case(name))
            || self
                .config
                .drop_prefixes
                .iter()
                .any(|prefix| {
                    name.get(..prefix.len())
                        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
                })
    }

    pub fn is_excluded(&self, provider_id: i64) -> bool {
        self.config.excluded_provider_ids.contains(&provider_id)
    }

    /// The exclusion-filtered projection used for downstream analysis.
    ///
    /// Rows matched to an excluded provider id are reported as unmatched; all
    /// other rows pass through unchanged. The input is not modified.
    pub fn analysis_ready(&self, rows: &[EnrichedMovie]) -> Vec<EnrichedMovie> {
        rows.iter()
            .map(|row| match row.provider_id() {
                Some(id) if self.is_excluded(id) => {
                    debug!("'{}' matched excluded id {}, clearing", row.title(), id);
                    row.as_unmatched()
                }
                _ => row.clone(),
            })
            .collect()
    }

    /// Number of rows whose provider id is excluded.
    pub fn count_excluded(&self, rows: &[EnrichedMovie]) -> usize {
        rows.iter()
            .filter_map(EnrichedMovie::provider_id)
            .filter(|id| self.is_excluded(*id))
            .count()
    }
}

/// Legacy column names across a batch, in first-seen order.
pub fn legacy_column_order(rows: &[EnrichedMovie]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut order = Vec::new();
    for row in rows {
        for name in row.movie.legacy.names() {
            if seen.insert(name.to_string()) {
                order.push(name.to_string());
            }
        }
    }
    order
}
