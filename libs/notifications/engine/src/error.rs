//! Error types for the notification engine.

use thiserror::Error;

/// Result type for notification operations.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Errors that can occur in the notification engine.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Content varies in a mode the summarizer does not support.
    #[error("Unsupported content variation: {0}")]
    UnsupportedVariation(String),

    /// Content path string could not be parsed.
    #[error("Invalid content path: {0}")]
    InvalidPath(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Store error.
    #[error("Store error: {0}")]
    Store(String),

    /// Template rendering error.
    #[error("Template rendering error: {0}")]
    Template(String),

    /// Mail transport error.
    #[error("Transport error: {0}")]
    Transport(String),
}
