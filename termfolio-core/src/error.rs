//! Error types for termfolio-core

use thiserror::Error;

/// Main error type for the termfolio-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Completion service rejected our credentials or configuration.
    /// Detail is for the log only; the client sees a generic message.
    #[error("provider auth error: {0}")]
    ProviderAuth(String),

    /// Completion service is rate limiting or overloaded
    #[error("provider overloaded: {0}")]
    ProviderOverloaded(String),

    /// Any other completion service failure
    #[error("provider error: {0}")]
    Provider(String),
}

/// Result type alias for termfolio-core
pub type Result<T> = std::result::Result<T, Error>;
