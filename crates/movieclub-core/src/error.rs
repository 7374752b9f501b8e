//! Error types for the movie-club pipeline.
//!
//! Errors fall into three groups:
//! - structural input problems, fatal before any network or database work
//! - provider unavailability, recovered locally as "no match" or "empty catalog"
//! - persistence failures, fatal for the run after the batch is rolled back

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the movie-club library.
#[derive(Debug, Error)]
pub enum MovieClubError {
    // Input errors
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("CSV error: {message}")]
    Csv {
        message: String,
        #[source]
        source: Option<csv::Error>,
    },

    // Provider errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Rate limited by {service}, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Provider returned HTTP {status} for {endpoint}")]
    ProviderStatus { endpoint: String, status: u16 },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Persistence errors
    #[error("Persistence error: {message}")]
    Persistence {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Pipeline run cancelled")]
    Cancelled,
}

/// Result type alias for movie-club operations.
pub type Result<T> = std::result::Result<T, MovieClubError>;

impl From<std::io::Error> for MovieClubError {
    fn from(err: std::io::Error) -> Self {
        MovieClubError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for MovieClubError {
    fn from(err: serde_json::Error) -> Self {
        MovieClubError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for MovieClubError {
    fn from(err: rusqlite::Error) -> Self {
        MovieClubError::Persistence {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<csv::Error> for MovieClubError {
    fn from(err: csv::Error) -> Self {
        MovieClubError::Csv {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for MovieClubError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MovieClubError::Timeout(std::time::Duration::from_secs(0))
        } else if err.is_decode() {
            MovieClubError::Json {
                message: err.to_string(),
                source: None,
            }
        } else {
            MovieClubError::Network {
                message: err.to_string(),
                cause: err.url().map(|u| crate::network::extract_domain(u.as_str())),
            }
        }
    }
}

impl MovieClubError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        MovieClubError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a persistence error without an underlying SQLite error.
    pub fn persistence(message: impl Into<String>) -> Self {
        MovieClubError::Persistence {
            message: message.into(),
            source: None,
        }
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            MovieClubError::Network { .. }
            | MovieClubError::Timeout(_)
            | MovieClubError::RateLimited { .. } => true,
            MovieClubError::ProviderStatus { status, .. } => {
                crate::network::is_retryable_status(*status)
            }
            _ => false,
        }
    }

    /// Minimum wait the provider asked for before the next request.
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            MovieClubError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => Some(std::time::Duration::from_secs(*secs)),
            _ => None,
        }
    }

    /// Whether this error means the metadata provider could not answer.
    ///
    /// These are recovered locally and never abort a run.
    pub fn is_provider_unavailable(&self) -> bool {
        matches!(
            self,
            MovieClubError::Network { .. }
                | MovieClubError::Timeout(_)
                | MovieClubError::RateLimited { .. }
                | MovieClubError::ProviderStatus { .. }
                | MovieClubError::Json { .. }
        )
    }

    /// Process exit code for the command-line runner.
    pub fn exit_code(&self) -> i32 {
        match self {
            MovieClubError::InvalidInput { .. } | MovieClubError::Csv { .. } => 2,
            MovieClubError::Config { .. } => 3,
            MovieClubError::Persistence { .. } => 4,
            MovieClubError::Cancelled => 130,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MovieClubError::InvalidInput {
            message: "missing column 'Avg Rating'".into(),
        };
        assert_eq!(err.to_string(), "Invalid input: missing column 'Avg Rating'");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(MovieClubError::Timeout(std::time::Duration::from_secs(5)).is_retryable());
        assert!(MovieClubError::ProviderStatus {
            endpoint: "search/movie".into(),
            status: 503
        }
        .is_retryable());
        assert!(!MovieClubError::ProviderStatus {
            endpoint: "search/movie".into(),
            status: 401
        }
        .is_retryable());
        assert!(!MovieClubError::persistence("locked").is_retryable());
    }

    #[test]
    fn test_provider_unavailable_classification() {
        assert!(MovieClubError::Json {
            message: "expected value".into(),
            source: None
        }
        .is_provider_unavailable());
        assert!(!MovieClubError::InvalidInput {
            message: "x".into()
        }
        .is_provider_unavailable());
    }

    #[test]
    fn test_retry_after_only_for_rate_limits() {
        let limited = MovieClubError::RateLimited {
            service: "api.themoviedb.org".into(),
            retry_after_secs: Some(7),
        };
        assert_eq!(limited.retry_after(), Some(std::time::Duration::from_secs(7)));

        let no_header = MovieClubError::RateLimited {
            service: "api.themoviedb.org".into(),
            retry_after_secs: None,
        };
        assert_eq!(no_header.retry_after(), None);
        assert_eq!(MovieClubError::Timeout(std::time::Duration::from_secs(1)).retry_after(), None);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(MovieClubError::persistence("x").exit_code(), 4);
        assert_eq!(MovieClubError::Cancelled.exit_code(), 130);
        assert_eq!(
            MovieClubError::InvalidInput {
                message: "x".into()
            }
            .exit_code(),
            2
        );
    }
}
