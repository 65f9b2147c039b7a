//! Error types for the diagnostic-code lookup subsystem

use std::time::Duration;
use thiserror::Error;

/// Result type alias for lookup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Seed(#[from] SeedError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors talking to the classification registry
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Registry rejected the credential. Check clientId/clientSecret in the config file.")]
    Unauthorized,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded. Retry after {0:?}")]
    RateLimit(Duration),

    #[error("Registry server error: {0}")]
    ServerError(String),

    #[error("Invalid registry response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("Request timed out".to_string())
        } else if err.is_connect() {
            ApiError::Network("Failed to connect to registry".to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "Configuration file not found. Create one with clientId/clientSecret for the registry."
    )]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Registry credentials not configured. Set clientId and clientSecret in the config file.")]
    MissingCredentials,
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Offline catalog store errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Db(#[from] rusqlite::Error),

    #[error("Catalog I/O error: {0}")]
    Io(String),

    #[error("Catalog store lock poisoned")]
    Lock,
}

/// Bulk-import errors from the catalog seeder
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Seed dataset unreadable: {0}")]
    Io(#[from] std::io::Error),

    #[error("Seed dataset malformed: {0}")]
    Decode(String),

    #[error(transparent)]
    Store(#[from] CatalogError),
}
