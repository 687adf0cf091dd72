//! Provider traits and common request/response types
//!
//! Handlers depend on these traits, not on the concrete HTTP clients, so
//! tests can swap in fakes.

use crate::error::ProviderError;
use crate::providers::trends::{TrendPoint, TrendsQuery};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sampling options for a single generation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 250,
        }
    }
}

/// Text generation backend
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `prompt`; returns the raw response text
    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String, ProviderError>;

    /// Model the backend is configured for
    fn model(&self) -> &str;
}

/// Trends-data backend
#[async_trait]
pub trait TrendsSource: Send + Sync {
    /// Interest-over-time series for the query's keywords
    async fn interest_over_time(&self, query: &TrendsQuery)
        -> Result<Vec<TrendPoint>, ProviderError>;
}

/// Coarse health of a downstream backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Warning,
    Error,
}

/// Health report returned by `GET /health/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub message: String,
}

impl HealthReport {
    pub fn new(status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}
