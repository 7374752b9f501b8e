//! SQLite table of enriched movies keyed by `(movie_name, watched_date)`.

use crate::cancel::CancellationToken;
use crate::config::StoreConfig;
use crate::error::{MovieClubError, Result};
use crate::models::{watched_date_key, EnrichedMovie, NaturalKey, ProviderDetails, RatedMovie};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{join_genres, split_genres, CANONICAL_COLUMNS};

const CREATE_TABLE_SQL: &str = "CREATE TABLE movies (
    movie_name TEXT NOT NULL,
    watched_date TEXT NOT NULL DEFAULT '',
    picked_by TEXT NOT NULL DEFAULT '',
    avg_rating REAL NOT NULL,
    provider_id INTEGER,
    overview TEXT,
    genres TEXT,
    release_date TEXT,
    vote_average REAL,
    vote_count INTEGER,
    provider_link TEXT,
    PRIMARY KEY (movie_name, watched_date)
)";

const UPSERT_SQL: &str = "INSERT INTO movies (movie_name, watched_date, picked_by, avg_rating,
                        provider_id, overview, genres, release_date,
                        vote_average, vote_count, provider_link)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
     ON CONFLICT(movie_name, watched_date) DO UPDATE SET
         picked_by=excluded.picked_by,
         avg_rating=excluded.avg_rating,
         provider_id=excluded.provider_id,
         overview=excluded.overview,
         genres=excluded.genres,
         release_date=excluded.release_date,
         vote_average=excluded.vote_average,
         vote_count=excluded.vote_count,
         provider_link=excluded.provider_link";

const SELECT_COLUMNS: &str = "movie_name, watched_date, picked_by, avg_rating, provider_id,
     overview, genres, release_date, vote_average, vote_count, provider_link";

/// Column types used when an older table is missing a column.
const COLUMN_TYPES: &[(&str, &str)] = &[
    ("movie_name", "TEXT"),
    ("watched_date", "TEXT NOT NULL DEFAULT ''"),
    ("picked_by", "TEXT NOT NULL DEFAULT ''"),
    ("avg_rating", "REAL"),
    ("provider_id", "INTEGER"),
    ("overview", "TEXT"),
    ("genres", "TEXT"),
    ("release_date", "TEXT"),
    ("vote_average", "REAL"),
    ("vote_count", "INTEGER"),
    ("provider_link", "TEXT"),
];

/// Outcome of one transactional batch write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertReport {
    /// Rows written (inserted or updated).
    pub upserted: usize,
    /// Distinct natural keys in the batch.
    pub distinct_keys: usize,
    /// Stored rows removed because their key was absent from the batch.
    pub pruned: usize,
    /// Row count after commit.
    pub total_rows: usize,
}

/// SQLite-backed store for enriched movies.
///
/// The store owns its connection; the persister opens one per run and drops
/// it when the run's batch has been written.
pub struct MovieStore {
    db_path: PathBuf,
    conn: Connection,
}

impl MovieStore {
    /// Create or open the store at the given path.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| MovieClubError::io_with_path(e, parent))?;
            }
        }

        let mut conn = Connection::open(&db_path)?;
        Self::configure_connection(&conn)?;
        Self::ensure_schema(&mut conn)?;

        Ok(Self { db_path, conn })
    }

    /// Open an in-memory store (tests, dry runs).
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        Self::ensure_schema(&mut conn)?;
        Ok(Self {
            db_path: PathBuf::from(":memory:"),
            conn,
        })
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA busy_timeout={};
            PRAGMA synchronous=NORMAL;
            ",
            StoreConfig::BUSY_TIMEOUT_MS
        ))?;
        Ok(())
    }

    /// Create the table, or bring a table from an older run up to date.
    ///
    /// Missing columns are added. A table whose primary key is not the natural
    /// key (earlier runs inserted unconditionally) is rebuilt with duplicates
    /// collapsed, last row winning.
    fn ensure_schema(conn: &mut Connection) -> Result<()> {
        let exists: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
                params![StoreConfig::TABLE_NAME],
                |row| row.get(0),
            )
            .optional()?;

        if exists.is_none() {
            conn.execute(CREATE_TABLE_SQL, [])?;
            debug!("Created movies table");
            return Ok(());
        }

        let columns = Self::table_columns(conn)?;
        for (name, column_type) in COLUMN_TYPES {
            if !columns.iter().any(|(column, _)| column == name) {
                warn!("movies table is missing column '{}', adding it", name);
                conn.execute(
                    &format!("ALTER TABLE movies ADD COLUMN {} {}", name, column_type),
                    [],
                )?;
            }
        }

        let mut key_columns: Vec<(i64, String)> = Self::table_columns(conn)?
            .into_iter()
            .filter(|(_, pk)| *pk > 0)
            .map(|(name, pk)| (pk, name))
            .collect();
        key_columns.sort();
        let key_names: Vec<&str> = key_columns.iter().map(|(_, n)| n.as_str()).collect();

        if key_names != ["movie_name", "watched_date"] {
            info!("Rebuilding movies table keyed by (movie_name, watched_date)");
            let tx = conn.transaction()?;
            tx.execute_batch(&format!(
                "
                ALTER TABLE movies RENAME TO movies_legacy;
                {create};
                INSERT OR REPLACE INTO movies ({cols})
                    SELECT movie_name, COALESCE(watched_date, ''), COALESCE(picked_by, ''),
                           COALESCE(avg_rating, 0), provider_id, overview, genres,
                           release_date, vote_average, vote_count, provider_link
                    FROM movies_legacy
                    WHERE movie_name IS NOT NULL
                    ORDER BY rowid;
                DROP TABLE movies_legacy;
                ",
                create = CREATE_TABLE_SQL,
                cols = CANONICAL_COLUMNS.join(", ")
            ))?;
            tx.commit()?;
        }

        Ok(())
    }

    /// `(name, pk position)` for each column of the movies table.
    fn table_columns(conn: &Connection) -> Result<Vec<(String, i64)>> {
        let mut stmt = conn.prepare("PRAGMA table_info(movies)")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i64>(5)?)))?;
        let mut columns = Vec::new();
        for row in rows {
            columns.push(row?);
        }
        Ok(columns)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Upsert a whole batch in one transaction.
    ///
    /// With `prune_missing`, stored rows whose key is absent from the batch are
    /// deleted in the same transaction. Any error, or a cancellation observed
    /// before commit, rolls everything back.
    pub fn upsert_batch(
        &mut self,
        rows: &[EnrichedMovie],
        prune_missing: bool,
        cancel: &CancellationToken,
    ) -> Result<UpsertReport> {
        let tx = self.conn.transaction()?;
        let mut report = UpsertReport::default();
        let mut batch_keys: HashSet<NaturalKey> = HashSet::with_capacity(rows.len());

        {
            let mut stmt = tx.prepare(UPSERT_SQL)?;
            for row in rows {
                cancel.check()?;
                let details = row.provider.as_ref();
                stmt.execute(params![
                    row.movie.title,
                    watched_date_key(row.movie.watched_date),
                    row.movie.picked_by,
                    row.movie.avg_rating,
                    details.map(|d| d.provider_id),
                    details.map(|d| d.overview.as_str()),
                    details.map(|d| join_genres(&d.genres)),
                    details.map(|d| d.release_date.as_str()),
                    details.map(|d| d.vote_average),
                    details.map(|d| d.vote_count),
                    details.map(|d| d.provider_link.as_str()),
                ])?;
                report.upserted += 1;
                batch_keys.insert(row.natural_key());
            }
        }
        report.distinct_keys = batch_keys.len();

        if prune_missing {
            let stored: Vec<NaturalKey> = {
                let mut stmt = tx.prepare("SELECT movie_name, watched_date FROM movies")?;
                let keys = stmt.query_map([], |row| {
                    Ok(NaturalKey {
                        title: row.get(0)?,
                        watched_date: row.get(1)?,
                    })
                })?;
                keys.collect::<std::result::Result<_, _>>()?
            };

            let mut delete =
                tx.prepare("DELETE FROM movies WHERE movie_name = ?1 AND watched_date = ?2")?;
            for key in stored.iter().filter(|key| !batch_keys.contains(*key)) {
                delete.execute(params![key.title, key.watched_date])?;
                report.pruned += 1;
            }
        }

        report.total_rows = tx.query_row("SELECT COUNT(*) FROM movies", [], |row| {
            row.get::<_, i64>(0)
        })? as usize;

        cancel.check()?;
        tx.commit()?;

        debug!(
            "Committed {} rows ({} pruned) to {}",
            report.upserted,
            report.pruned,
            self.db_path.display()
        );
        Ok(report)
    }

    /// Number of stored rows.
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM movies", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get a row by natural key.
    pub fn get(&self, title: &str, watched_date: Option<NaiveDate>) -> Result<Option<EnrichedMovie>> {
        let result = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM movies WHERE movie_name = ?1 AND watched_date = ?2",
                    SELECT_COLUMNS
                ),
                params![title, watched_date_key(watched_date)],
                Self::row_to_movie,
            )
            .optional()?;
        Ok(result)
    }

    /// Every stored row, ordered by natural key.
    pub fn load_all(&self) -> Result<Vec<EnrichedMovie>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM movies ORDER BY movie_name, watched_date",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map([], Self::row_to_movie)?;

        let mut movies = Vec::new();
        for row in rows {
            movies.push(row?);
        }
        Ok(movies)
    }

    fn row_to_movie(row: &Row) -> rusqlite::Result<EnrichedMovie> {
        let watched: String = row.get(1)?;
        let watched_date = NaiveDate::parse_from_str(&watched, "%Y-%m-%d").ok();

        let movie = RatedMovie::new(
            row.get::<_, String>(0)?,
            row.get::<_, String>(2)?,
            row.get::<_, f64>(3)?,
            watched_date,
        );

        let provider = match row.get::<_, Option<i64>>(4)? {
            Some(provider_id) => Some(ProviderDetails {
                provider_id,
                overview: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                genres: split_genres(&row.get::<_, Option<String>>(6)?.unwrap_or_default()),
                release_date: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                vote_average: row.get::<_, Option<f64>>(8)?.unwrap_or_default(),
                vote_count: row.get::<_, Option<i64>>(9)?.unwrap_or_default(),
                provider_link: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
            }),
            None => None,
        };

        Ok(EnrichedMovie { movie, provider })
    }
}
