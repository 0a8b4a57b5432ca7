//! Error types for PubForge stages
//!
//! `AppError` covers store, search and configuration failures shared by every
//! stage. Stage crates wrap it in their own error enums.

use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Terminal failures of a search API request.
///
/// Rate limiting is not an error: it is retried and, once the attempts are
/// used up, reported as "no result".
#[derive(Error, Debug)]
pub enum SearchError {
    /// Non-success status other than 429
    #[error("Search API returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// Body could not be decoded into a search response
    #[error("Search API response could not be decoded: {0}")]
    Decode(String),
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // External service errors
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_error_is_transparent() {
        let err = AppError::from(SearchError::UpstreamStatus {
            status: 500,
            body: "boom".into(),
        });
        assert!(matches!(err, AppError::Search(SearchError::UpstreamStatus { status: 500, .. })));
        assert_eq!(err.to_string(), "Search API returned 500: boom");
    }

    #[test]
    fn test_config_error_converts() {
        let err = AppError::from(config::ConfigError::NotFound("search.api_key".into()));
        assert!(matches!(err, AppError::Configuration { .. }));
        assert!(err.to_string().contains("search.api_key"));
    }
}
