//! Error types for siteref-core

use thiserror::Error;

/// Main error type for the siteref-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A website with this (normalized) URL is already tracked
    #[error("website already tracked: {0}")]
    AlreadyExists(String),

    /// No website is tracked under this (normalized) URL
    #[error("website not found: {0}")]
    NotFound(String),

    /// The monitored channel could not be located
    #[error("channel {0} could not be resolved")]
    ChannelUnresolvable(u64),

    /// Channel connector error
    #[error("channel error: {0}")]
    Channel(String),
}

/// Result type alias for siteref-core
pub type Result<T> = std::result::Result<T, Error>;
