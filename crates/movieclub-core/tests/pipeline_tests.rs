//! End-to-end pipeline runs against a mock TMDB server.

use movieclub_core::{
    CancellationToken, MovieClubError, MovieStore, Pipeline, PipelineConfig, ProviderConfig,
    RetrySettings,
};
use serde_json::json;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RATINGS: &str = "\
Unnamed: 0,Movie Name,Picked By,Avg Rating,Date Watched,Release Year,Vote Link
0,Inception, Jon ,8,2022-01-05,2010,http://old/1
1,Heat,AMY,7.5,03/01/23,1995,
2,Zzzyx Nonexistent Film,jon,3,2023-04-01,,
3,Split,amy,6,2023-05-01,2016,
";

fn fast_retry() -> RetrySettings {
    RetrySettings {
        max_attempts: 2,
        base_delay_ms: 1,
        max_delay_ms: 5,
        jitter: false,
    }
}

fn test_config(dir: &Path, server: &MockServer, ratings: &str) -> PipelineConfig {
    let input = dir.join("ratings.csv");
    std::fs::write(&input, ratings).unwrap();
    let provider = ProviderConfig::new("test-key")
        .with_base_url(server.uri())
        .with_max_concurrency(2)
        .with_retry(fast_retry());
    PipelineConfig::new(
        input,
        dir.join("out").join("movies.csv"),
        dir.join("out").join("movies.db"),
        provider,
    )
}

async fn mount_genres(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/genre/movie/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "genres": [
                {"id": 28, "name": "Action"},
                {"id": 878, "name": "Science Fiction"},
                {"id": 80, "name": "Crime"},
                {"id": 18, "name": "Drama"},
                {"id": 27, "name": "Horror"}
            ]
        })))
        .mount(server)
        .await;
}

async fn mount_title(server: &MockServer, title: &str, id: i64, genre_ids: &[i64]) {
    Mock::given(method("GET"))
        .and(path("/search/movie"))
        .and(query_param("query", title))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": 1,
            "results": [{
                "id": id,
                "overview": format!("About {}", title),
                "genre_ids": genre_ids,
                "release_date": "2000-01-01",
                "vote_average": 7.5,
                "vote_count": 100
            }]
        })))
        .mount(server)
        .await;
}

/// Any title without a specific mock gets zero results.
async fn mount_no_results(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search/movie"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"page": 1, "results": []})))
        .with_priority(10)
        .mount(server)
        .await;
}

async fn mount_catalog(server: &MockServer) {
    mount_genres(server).await;
    mount_title(server, "Inception", 27205, &[28, 878]).await;
    mount_title(server, "Heat", 949, &[80, 18]).await;
    mount_title(server, "Split", 384717, &[27]).await;
    mount_no_results(server).await;
}

fn read_export(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect()
}

fn column(records: &[Vec<String>], name: &str) -> usize {
    records[0].iter().position(|c| c == name).unwrap()
}

#[tokio::test]
async fn test_full_run_enriches_and_persists() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &server, RATINGS);

    let report = Pipeline::new(config.clone())
        .unwrap()
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.normalize.output_rows, 4);
    assert_eq!(report.matched, 3);
    assert_eq!(report.unmatched, 1);
    assert_eq!(report.provider_failures, 0);
    assert_eq!(report.excluded, 1);
    assert_eq!(report.genres_loaded, 5);
    assert_eq!(report.persist.store.total_rows, 4);

    let records = read_export(&config.export_path);
    assert_eq!(records.len(), 5);
    let inception = &records[1];
    assert_eq!(inception[column(&records, "movie_name")], "Inception");
    assert_eq!(inception[column(&records, "picked_by")], "jon");
    assert_eq!(inception[column(&records, "avg_rating")], "8.0");
    assert_eq!(inception[column(&records, "watched_date")], "2022-01-05");
    assert_eq!(inception[column(&records, "genres")], "Action, Science Fiction");
    assert_eq!(
        inception[column(&records, "provider_link")],
        "https://www.themoviedb.org/movie/27205"
    );
    // Legacy columns: the release year is renamed, index and vote link dropped.
    assert_eq!(inception[column(&records, "Release Date")], "2010");
    assert!(!records[0].iter().any(|c| c == "Release Year"));
    assert!(!records[0].iter().any(|c| c == "Vote Link"));
    assert!(!records[0].iter().any(|c| c.starts_with("Unnamed:")));

    let heat = &records[2];
    assert_eq!(heat[column(&records, "watched_date")], "2023-03-01");
    assert_eq!(heat[column(&records, "picked_by")], "amy");
}

#[tokio::test]
async fn test_zero_results_leave_provider_fields_absent() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &server, RATINGS);

    Pipeline::new(config.clone())
        .unwrap()
        .run(&CancellationToken::new())
        .await
        .unwrap();

    let store = MovieStore::open(&config.database_path).unwrap();
    let zzzyx = store
        .load_all()
        .unwrap()
        .into_iter()
        .find(|m| m.title() == "Zzzyx Nonexistent Film")
        .unwrap();
    assert!(!zzzyx.is_matched());
    assert_eq!(zzzyx.provider_link(), None);

    let records = read_export(&config.export_path);
    let row = records
        .iter()
        .find(|r| r[0] == "Zzzyx Nonexistent Film")
        .unwrap();
    for name in ["provider_id", "overview", "genres", "release_date", "provider_link"] {
        assert_eq!(row[column(&records, name)], "", "{} should be empty", name);
    }
}

#[tokio::test]
async fn test_excluded_match_is_cleared_only_in_export() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &server, RATINGS);

    Pipeline::new(config.clone())
        .unwrap()
        .run(&CancellationToken::new())
        .await
        .unwrap();

    let records = read_export(&config.export_path);
    let split = records.iter().find(|r| r[0] == "Split").unwrap();
    assert_eq!(split[column(&records, "provider_id")], "");
    assert_eq!(split[column(&records, "provider_link")], "");

    let store = MovieStore::open(&config.database_path).unwrap();
    let stored = store
        .load_all()
        .unwrap()
        .into_iter()
        .find(|m| m.title() == "Split")
        .unwrap();
    assert_eq!(stored.provider_id(), Some(384717));
}

#[tokio::test]
async fn test_genre_catalog_failure_still_completes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/genre/movie/list"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_title(&server, "Inception", 27205, &[28, 878]).await;
    mount_no_results(&server).await;

    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &server, RATINGS);

    let report = Pipeline::new(config.clone())
        .unwrap()
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.genres_loaded, 0);
    assert_eq!(report.matched, 1);
    assert!(config.export_path.exists());
    assert!(config.database_path.exists());

    let store = MovieStore::open(&config.database_path).unwrap();
    assert!(store.load_all().unwrap().iter().all(|m| m.genres().is_empty()));
    let inception = store
        .load_all()
        .unwrap()
        .into_iter()
        .find(|m| m.title() == "Inception")
        .unwrap();
    assert!(inception.is_matched());
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &server, RATINGS);
    let pipeline = Pipeline::new(config.clone()).unwrap();

    pipeline.run(&CancellationToken::new()).await.unwrap();
    let first_export = std::fs::read(&config.export_path).unwrap();
    let first_count = MovieStore::open(&config.database_path).unwrap().count().unwrap();

    pipeline.run(&CancellationToken::new()).await.unwrap();
    let second_export = std::fs::read(&config.export_path).unwrap();
    let second_count = MovieStore::open(&config.database_path).unwrap().count().unwrap();

    assert_eq!(first_export, second_export);
    assert_eq!(first_count, second_count);
    assert_eq!(second_count, 4);
}

#[tokio::test]
async fn test_rows_removed_from_input_are_pruned() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &server, RATINGS);

    Pipeline::new(config.clone())
        .unwrap()
        .run(&CancellationToken::new())
        .await
        .unwrap();

    let shorter = "\
Movie Name,Picked By,Avg Rating,Date Watched
Inception,jon,8,2022-01-05
";
    std::fs::write(&config.input_path, shorter).unwrap();
    let report = Pipeline::new(config.clone())
        .unwrap()
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.persist.store.pruned, 3);
    assert_eq!(MovieStore::open(&config.database_path).unwrap().count().unwrap(), 1);
}

#[tokio::test]
async fn test_provider_errors_become_unmatched_rows() {
    let server = MockServer::start().await;
    mount_genres(&server).await;
    Mock::given(method("GET"))
        .and(path("/search/movie"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &server, RATINGS);

    let report = Pipeline::new(config.clone())
        .unwrap()
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.matched, 0);
    assert_eq!(report.unmatched, 4);
    assert_eq!(report.provider_failures, 4);
    // Each lookup is retried once.
    assert_eq!(report.retries, 4);
    assert_eq!(report.persist.store.total_rows, 4);
}

#[tokio::test]
async fn test_missing_rating_column_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let config = test_config(
        temp.path(),
        &server,
        "Movie Name,Picked By\nInception,jon\n",
    );

    let err = Pipeline::new(config.clone())
        .unwrap()
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, MovieClubError::InvalidInput { .. }));
    assert_eq!(err.exit_code(), 2);
    assert!(!config.export_path.exists());
    assert!(!config.database_path.exists());
}

#[tokio::test]
async fn test_cancelled_run_writes_nothing() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &server, RATINGS);

    let token = CancellationToken::new();
    token.cancel();
    let err = Pipeline::new(config.clone())
        .unwrap()
        .run(&token)
        .await
        .unwrap_err();

    assert!(matches!(err, MovieClubError::Cancelled));
    assert!(!config.export_path.exists());
    assert!(!config.database_path.exists());
}

#[tokio::test]
async fn test_genre_cache_avoids_second_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/genre/movie/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "genres": [{"id": 28, "name": "Action"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_no_results(&server).await;

    let temp = TempDir::new().unwrap();
    let mut config = test_config(temp.path(), &server, RATINGS);
    config.genre_cache_path = Some(temp.path().join("cache").join("genres.json"));
    let pipeline = Pipeline::new(config).unwrap();

    let first = pipeline.run(&CancellationToken::new()).await.unwrap();
    let second = pipeline.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(first.genres_loaded, 1);
    assert_eq!(second.genres_loaded, 1);
}

#[tokio::test]
async fn test_cancel_abandons_in_flight_lookups() {
    let server = MockServer::start().await;
    mount_genres(&server).await;
    Mock::given(method("GET"))
        .and(path("/search/movie"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"page": 1, "results": []}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &server, RATINGS);
    let pipeline = Pipeline::new(config.clone()).unwrap();

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let err = pipeline.run(&token).await.unwrap_err();

    assert!(matches!(err, MovieClubError::Cancelled));
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "run took {:?} after cancellation",
        started.elapsed()
    );
    assert!(!config.export_path.exists());
    assert!(!config.database_path.exists());
}

#[tokio::test]
async fn test_index_column_duplicates_collapse_in_both_sinks() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    let temp = TempDir::new().unwrap();
    let ratings = "\
,Movie Name,Picked By,Avg Rating,Date Watched
0,Heat,jim,9,2022-02-01
1,Heat,jim,9,2022-02-01
";
    let config = test_config(temp.path(), &server, ratings);

    let report = Pipeline::new(config.clone())
        .unwrap()
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.normalize.duplicates_removed, 1);
    assert_eq!(report.normalize.natural_key_collisions, 0);
    assert_eq!(read_export(&config.export_path).len(), 2);
    assert_eq!(
        MovieStore::open(&config.database_path).unwrap().count().unwrap(),
        1
    );
}
