//! Error types for koevault.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the koevault library.
#[derive(Debug, Error)]
pub enum KoevaultError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("HTTP status {status} for {url}")]
    Http { url: String, status: u16 },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Catalog resolution errors
    #[error("Character not found: {character_id}")]
    CharacterNotFound { character_id: i64 },

    // Download errors
    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for koevault operations.
pub type Result<T> = std::result::Result<T, KoevaultError>;

// Conversion implementations for common error types

impl From<std::io::Error> for KoevaultError {
    fn from(err: std::io::Error) -> Self {
        KoevaultError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for KoevaultError {
    fn from(err: serde_json::Error) -> Self {
        KoevaultError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for KoevaultError {
    fn from(err: rusqlite::Error) -> Self {
        KoevaultError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for KoevaultError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            KoevaultError::Timeout(crate::config::NetworkConfig::REQUEST_TIMEOUT)
        } else {
            KoevaultError::Network {
                message: err.to_string(),
                cause: err.url().map(|u| u.to_string()),
            }
        }
    }
}

impl KoevaultError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        KoevaultError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Check if this error should trigger a retry.
    ///
    /// Only transport-level failures are retryable; an HTTP response with
    /// a bad status is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KoevaultError::Network { .. } | KoevaultError::Timeout(_)
        )
    }
}
