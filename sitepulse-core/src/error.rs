//! Error types for sitepulse-core

use thiserror::Error;

/// Main error type for the sitepulse-core library
///
/// Tracking operations never return this type; it surfaces from the host
/// substrate, storage backends, transports and configuration loading.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Key-value storage unavailable or failing
    #[error("storage error: {0}")]
    Storage(String),

    /// URL could not be parsed or resolved
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Transport/API error
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type alias for sitepulse-core
pub type Result<T> = std::result::Result<T, Error>;
