//! movieclub - enrich the club's rating spreadsheet with TMDB metadata.
//!
//! Reads the spreadsheet, resolves each title against TMDB, then writes the
//! flat export and upserts the SQLite store. Ctrl-C cancels the run without
//! committing a partial batch.

use anyhow::{Context, Result};
use clap::Parser;
use movieclub_core::{CancellationToken, MovieClubError, Pipeline, PipelineConfig, ProviderConfig};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "movieclub")]
#[command(about = "Enrich movie-club ratings with TMDB metadata")]
struct Args {
    /// JSON pipeline config; command-line flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rating spreadsheet (CSV)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Flat export path (defaults to the user data directory)
    #[arg(long)]
    export: Option<PathBuf>,

    /// SQLite database path (defaults to the user data directory)
    #[arg(long)]
    database: Option<PathBuf>,

    /// TMDB API key
    #[arg(long, env = "TMDB_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Maximum concurrent provider lookups
    #[arg(long)]
    concurrency: Option<usize>,

    /// Genre catalog cache file (defaults to the user cache directory)
    #[arg(long)]
    genre_cache: Option<PathBuf>,

    /// Keep stored rows that are missing from this run's input
    #[arg(long)]
    keep_missing: bool,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // RUST_LOG wins over --debug when set.
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    if let Err(err) = run(args).await {
        error!("{:#}", err);
        let code = err
            .downcast_ref::<MovieClubError>()
            .map(MovieClubError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(args: Args) -> Result<()> {
    let json = args.json;
    let config = build_config(args)?;
    info!("Input: {}", config.input_path.display());
    info!("Export: {}", config.export_path.display());
    info!("Database: {}", config.database_path.display());

    let pipeline = Pipeline::new(config)?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            signal_token.cancel();
        }
    });

    let report = pipeline.run(&cancel).await?;

    if json {
        // Intentional stdout for scripting
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} rows: {} matched, {} unmatched, {} excluded; {} stored",
            report.normalize.output_rows,
            report.matched,
            report.unmatched,
            report.excluded,
            report.persist.store.total_rows
        );
    }
    Ok(())
}

/// Merge the optional config file with command-line overrides and defaults.
fn build_config(args: Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => {
            let input = args.input.clone().ok_or_else(|| MovieClubError::Config {
                message: "--input is required when no --config is given".to_string(),
            })?;
            PipelineConfig::new(
                input,
                default_data_path("movies.csv"),
                default_data_path("movies.db"),
                ProviderConfig::default(),
            )
        }
    };

    if args.config.is_none() {
        config.genre_cache_path = dirs::cache_dir().map(|d| d.join("movieclub").join("genres.json"));
    }
    if let Some(input) = args.input {
        config.input_path = input;
    }
    if let Some(export) = args.export {
        config.export_path = export;
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(api_key) = args.api_key.filter(|k| !k.trim().is_empty()) {
        config.provider.api_key = api_key;
    }
    if let Some(concurrency) = args.concurrency {
        config.provider.max_concurrency = concurrency;
    }
    if let Some(cache) = args.genre_cache {
        config.genre_cache_path = Some(cache);
    }
    if args.keep_missing {
        config.prune_missing = false;
    }

    config.validate()?;
    Ok(config)
}

fn default_data_path(file_name: &str) -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("movieclub"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(file_name)
}
