//! Error types for provider queries and downloads.

use std::time::Duration;

use thiserror::Error;

/// Main error type for all musicnet operations.
#[derive(Debug, Error)]
pub enum MusicNetError {
    /// No network path is available.
    #[error("Network is unreachable")]
    Offline,

    /// The song has no downloadable quality variant.
    #[error("No quality variants for song: {0}")]
    NoVariants(String),

    /// HTTP request failed.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be decoded.
    #[error("Config error: {0}")]
    Config(String),

    /// Request signing failed.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Provider rejected the request or returned an unexpected shape.
    #[error("Provider error: {0}")]
    Provider(String),

    /// A transfer exceeded the configured time limit.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The operation was torn down before it finished.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

/// Result type alias for musicnet operations.
pub type Result<T> = std::result::Result<T, MusicNetError>;
