//! HTTP client construction and response classification.

use crate::config::{NetworkConfig, ProviderConfig};
use crate::error::{MovieClubError, Result};
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Build the reqwest client used for all provider calls.
///
/// The total request timeout bounds every lookup; exceeding it surfaces as
/// `MovieClubError::Timeout`, which the resolver treats as "no match".
pub fn build_client(config: &ProviderConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.request_timeout())
        .connect_timeout(NetworkConfig::CONNECT_TIMEOUT.min(config.request_timeout()))
        .user_agent(NetworkConfig::USER_AGENT)
        .build()
        .map_err(|e| MovieClubError::Network {
            message: format!("Failed to create HTTP client: {}", e),
            cause: None,
        })
}

/// Check if an HTTP status code indicates a retryable error.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Check if an HTTP status code indicates a permanent failure.
pub fn is_permanent_failure(status: u16) -> bool {
    matches!(status, 400 | 401 | 403 | 404)
}

/// Send a GET request and decode a JSON body.
///
/// `endpoint` is the provider path used in error messages; it never includes
/// the query string, so the API key stays out of logs.
pub async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: url::Url,
    endpoint: &str,
    timeout: Duration,
) -> Result<T> {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            MovieClubError::Timeout(timeout)
        } else {
            MovieClubError::Network {
                message: format!("GET {} failed: {}", endpoint, e.without_url()),
                cause: None,
            }
        }
    })?;

    let response = check_response_status(response, endpoint)?;

    let bytes = response.bytes().await.map_err(|e| MovieClubError::Network {
        message: format!("Failed to read {} response body: {}", endpoint, e.without_url()),
        cause: None,
    })?;

    serde_json::from_slice(&bytes).map_err(|e| MovieClubError::Json {
        message: format!("Failed to parse {} response: {}", endpoint, e),
        source: Some(e),
    })
}

fn check_response_status(response: Response, endpoint: &str) -> Result<Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        return Err(MovieClubError::RateLimited {
            service: extract_domain(response.url().as_str()),
            retry_after_secs: retry_after,
        });
    }

    debug!("{} returned {}", endpoint, status);
    Err(MovieClubError::ProviderStatus {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
    })
}

/// Extract domain from a URL.
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.host_str().unwrap_or("unknown").to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://api.themoviedb.org/3/search/movie?query=x"),
            "api.themoviedb.org"
        );
        assert_eq!(extract_domain("invalid-url"), "unknown");
    }

    #[test]
    fn test_retryable_status_codes() {
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(is_retryable_status(status), "{} should be retryable", status);
        }
        for status in [200, 401, 404] {
            assert!(!is_retryable_status(status), "{} should not be retryable", status);
        }
    }

    #[test]
    fn test_permanent_failure_status_codes() {
        assert!(is_permanent_failure(401));
        assert!(is_permanent_failure(404));
        assert!(!is_permanent_failure(503));
    }

    #[test]
    fn test_build_client_with_defaults() {
        assert!(build_client(&ProviderConfig::new("key")).is_ok());
    }
}
