//! Ollama-compatible generation client
//!
//! Non-streaming `POST {base}/generate`; `GET {base}/tags` for health.

use crate::{
    error::ProviderError,
    r#trait::{GenerationOptions, HealthReport, HealthStatus, TextGenerator},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use taskhook_foundation::LlmConfig;
use tracing::debug;

/// Generation client for an Ollama-style `/api` base URL
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f64,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    name: String,
}

impl OllamaClient {
    /// Create a client; `timeout` bounds every request
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        Self::new(&config.api_url, &config.model_name, config.request_timeout())
    }

    fn generate_url(&self) -> String {
        format!("{}/generate", self.base_url)
    }

    fn tags_url(&self) -> String {
        format!("{}/tags", self.base_url)
    }

    /// List models the server has loaded
    pub async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let response = self
            .client
            .get(self.tags_url())
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_http_status(status.as_u16(), &body));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// `ok` when the configured model is loaded, `warning` when the server is
    /// up without it, `error` when the server cannot be reached
    pub async fn health(&self) -> HealthReport {
        match self.list_models().await {
            Ok(models) if models.iter().any(|name| name == &self.model) => HealthReport::new(
                HealthStatus::Ok,
                format!("LLM service is running with {} loaded", self.model),
            ),
            Ok(_) => HealthReport::new(
                HealthStatus::Warning,
                format!("LLM service is running but {} is not loaded", self.model),
            ),
            Err(ProviderError::Network(_)) | Err(ProviderError::Timeout(_)) => {
                HealthReport::new(HealthStatus::Error, "Cannot connect to LLM service")
            }
            Err(_) => HealthReport::new(
                HealthStatus::Error,
                "LLM service returned unexpected response",
            ),
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String, ProviderError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
        };

        debug!(model = %self.model, max_tokens = options.max_tokens, "Calling LLM generate");

        let response = self
            .client
            .post(self.generate_url())
            .json(&request)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_http_status(status.as_u16(), &body));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(body.response.trim().to_string())
    }

    fn model(&self) -> &str {
        &self.model
    }
}
