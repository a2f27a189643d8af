//! Error types for data provider operations

use thiserror::Error;

/// Result type for data provider operations
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while fetching market or news data
#[derive(Error, Debug)]
pub enum DataError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Remote API returned an error status
    #[error("API error: {0}")]
    Api(String),

    /// Response did not match the expected shape
    #[error("Unexpected response format: {0}")]
    Format(String),

    /// Requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}
