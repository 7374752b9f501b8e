//! Provider genre catalog.
//!
//! The genre-id → name mapping is fetched once per run and then only read.
//! A failed fetch never aborts the run: the catalog comes back empty and every
//! genre id resolves to nothing.

use crate::error::{MovieClubError, Result};
use crate::models::GenreEntry;
use crate::provider::MetadataProvider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Immutable genre-id → name mapping for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenreCatalog {
    names: HashMap<i64, String>,
}

/// On-disk form of the catalog cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GenreCacheFile {
    fetched_at: DateTime<Utc>,
    genres: Vec<GenreEntry>,
}

impl GenreCatalog {
    /// A catalog with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = GenreEntry>) -> Self {
        Self {
            names: entries.into_iter().map(|g| (g.id, g.name)).collect(),
        }
    }

    /// Fetch the catalog from the provider, degrading to empty on failure.
    pub async fn fetch(provider: &dyn MetadataProvider) -> Self {
        match provider.genre_list().await {
            Ok(entries) => {
                let catalog = Self::from_entries(entries);
                info!("Fetched {} genres from {}", catalog.len(), provider.name());
                catalog
            }
            Err(e) => {
                warn!(
                    "Genre catalog unavailable from {} ({}); continuing without genre names",
                    provider.name(),
                    e
                );
                Self::empty()
            }
        }
    }

    /// Use a fresh disk cache if present, otherwise fetch and refresh it.
    ///
    /// When the fetch fails, a stale cache is still preferred over an empty
    /// catalog.
    pub async fn load_or_fetch(
        provider: &dyn MetadataProvider,
        cache_path: &Path,
        ttl: Duration,
    ) -> Self {
        let cached = read_cache(cache_path);

        if let Some(cache) = &cached {
            let age = Utc::now().signed_duration_since(cache.fetched_at);
            if age.num_seconds() >= 0 && (age.num_seconds() as u64) < ttl.as_secs() {
                debug!("Using cached genre catalog from {}", cache_path.display());
                return Self::from_entries(cache.genres.clone());
            }
        }

        match provider.genre_list().await {
            Ok(entries) => {
                if let Err(e) = write_cache(cache_path, &entries) {
                    warn!("Failed to write genre cache {}: {}", cache_path.display(), e);
                }
                let catalog = Self::from_entries(entries);
                info!("Fetched {} genres from {}", catalog.len(), provider.name());
                catalog
            }
            Err(e) => match cached {
                Some(cache) => {
                    warn!(
                        "Genre catalog fetch failed ({}); using stale cache from {}",
                        e, cache.fetched_at
                    );
                    Self::from_entries(cache.genres)
                }
                None => {
                    warn!("Genre catalog unavailable ({}); continuing without genre names", e);
                    Self::empty()
                }
            },
        }
    }

    /// Look up a genre name.
    pub fn resolve(&self, id: i64) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Map ids to names in order, skipping ids the catalog does not know.
    pub fn resolve_all(&self, ids: &[i64]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.resolve(*id).map(str::to_string))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn read_cache(path: &Path) -> Option<GenreCacheFile> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Failed to read genre cache {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(cache) => Some(cache),
        Err(e) => {
            warn!("Ignoring malformed genre cache {}: {}", path.display(), e);
            None
        }
    }
}

fn write_cache(path: &Path, genres: &[GenreEntry]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| MovieClubError::io_with_path(e, parent))?;

    let cache = GenreCacheFile {
        fetched_at: Utc::now(),
        genres: genres.to_vec(),
    };
    let serialized = serde_json::to_string_pretty(&cache)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| MovieClubError::io_with_path(e, parent))?;
    temp.write_all(serialized.as_bytes())
        .map_err(|e| MovieClubError::io_with_path(e, temp.path()))?;
    temp.persist(path)
        .map_err(|e| MovieClubError::io_with_path(e.error, path))?;
    Ok(())
}
