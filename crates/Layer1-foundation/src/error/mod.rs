//! Error types for Taskhook
//!
//! One taxonomy shared by the store, the services, the worker and the API.
//! The API layer maps each variant to exactly one HTTP status.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Taskhook error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Lookup / ownership
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // ========================================================================
    // Downstream / callback
    // ========================================================================
    #[error("Upstream failure: {0}")]
    UpstreamFailure(String),

    #[error("Callback delivery failed: {0}")]
    CallbackDelivery(String),

    // ========================================================================
    // Input / configuration
    // ========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Infrastructure
    // ========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether a worker should schedule another attempt after this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::UpstreamFailure(_) | Error::Http(_))
    }

    /// Whether the message is safe to show to API clients as-is
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::Forbidden(_)
                | Error::Unauthorized(_)
                | Error::AlreadyExists(_)
                | Error::InvalidInput(_)
        )
    }

    /// Not-found helper for task lookups
    pub fn task_not_found(id: impl std::fmt::Display) -> Self {
        Error::NotFound(format!("Task {} not found", id))
    }

    /// Forbidden helper used by ownership checks
    pub fn forbidden() -> Self {
        Error::Forbidden("You are not allowed to perform this action".to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
