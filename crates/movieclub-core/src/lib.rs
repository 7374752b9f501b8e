//! Movie-club rating enrichment.
//!
//! Turns the club's rating spreadsheet into analysis-ready records:
//!
//! - [`normalizer`]: cleans raw rows into [`RatedMovie`]s
//! - [`genres`]: genre id → name catalog, optionally cached on disk
//! - [`resolver`] and [`provider`]: title lookup against TMDB
//! - [`enricher`]: merges the first-ranked match into each row
//! - [`schema`]: legacy column renames/drops and the exclusion view
//! - [`persister`]: flat CSV export plus an idempotent SQLite upsert
//!
//! [`pipeline::Pipeline`] wires these together for one run.
//!
//! # Example
//!
//! ```no_run
//! use movieclub_core::{CancellationToken, Pipeline, PipelineConfig, ProviderConfig};
//!
//! # async fn example() -> movieclub_core::Result<()> {
//! let config = PipelineConfig::new(
//!     "ratings.csv",
//!     "movies.csv",
//!     "movies.db",
//!     ProviderConfig::default().with_env_api_key(),
//! );
//! let report = Pipeline::new(config)?.run(&CancellationToken::new()).await?;
//! println!("{} matched, {} unmatched", report.matched, report.unmatched);
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod config;
pub mod enricher;
pub mod error;
pub mod genres;
pub mod models;
pub mod network;
pub mod normalizer;
pub mod persister;
pub mod pipeline;
pub mod provider;
pub mod resolver;
pub mod schema;
pub mod store;

pub use cancel::CancellationToken;
pub use config::{PipelineConfig, ProviderConfig, RetrySettings, SchemaConfig};
pub use enricher::Enricher;
pub use error::{MovieClubError, Result};
pub use genres::GenreCatalog;
pub use models::{EnrichedMovie, GenreEntry, MatchCandidate, ProviderDetails, RatedMovie};
pub use normalizer::{NormalizeReport, RawTable, RecordNormalizer};
pub use persister::{PersistReport, Persister};
pub use pipeline::{Pipeline, RunReport};
pub use provider::{MetadataProvider, TmdbClient};
pub use resolver::{MetadataResolver, Resolution};
pub use schema::SchemaMapper;
pub use store::{FlatExporter, MovieStore};
