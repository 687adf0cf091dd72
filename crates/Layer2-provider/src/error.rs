//! Provider-specific error types
//!
//! ProviderError keeps the detail of what went wrong downstream; it converts
//! into `taskhook_foundation::Error::UpstreamFailure` so the worker retries it.

use taskhook_foundation::Error as FoundationError;
use thiserror::Error;

/// Errors that can occur while calling a downstream service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Network error (connection failed, DNS, etc.)
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Server error (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// Request rejected (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Model not loaded / endpoint missing
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Client could not be built from configuration
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Create from a non-success HTTP status and the raw body text
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            429 => ProviderError::RateLimited(body.to_string()),
            404 => ProviderError::ModelNotAvailable(body.to_string()),
            400..=499 => ProviderError::InvalidRequest(format!("HTTP {}: {}", status, body)),
            500..=599 => ProviderError::ServerError(format!("HTTP {}: {}", status, body)),
            _ => ProviderError::ServerError(format!("Unexpected HTTP {}: {}", status, body)),
        }
    }

    /// Classify a transport-level reqwest failure
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

// ============================================================================
// taskhook_foundation::Error 변환
// ============================================================================

impl From<ProviderError> for FoundationError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured(msg) => FoundationError::Config(msg),
            other => FoundationError::UpstreamFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status() {
        assert!(matches!(
            ProviderError::from_http_status(503, "down"),
            ProviderError::ServerError(_)
        ));
        assert!(matches!(
            ProviderError::from_http_status(429, "slow down"),
            ProviderError::RateLimited(_)
        ));
        assert!(matches!(
            ProviderError::from_http_status(404, "model 'x' not found"),
            ProviderError::ModelNotAvailable(_)
        ));
        assert!(matches!(
            ProviderError::from_http_status(422, "bad"),
            ProviderError::InvalidRequest(_)
        ));
    }

    #[test]
    fn test_upstream_errors_are_retryable() {
        let err: FoundationError = ProviderError::from_http_status(500, "oops").into();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("oops"));

        let err: FoundationError = ProviderError::NotConfigured("no url".into()).into();
        assert!(!err.is_retryable());
    }
}
