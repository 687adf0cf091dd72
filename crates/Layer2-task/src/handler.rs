//! Task handlers - the bodies the worker runs, one per task kind

use crate::task::{TaskRequest, ThinkRequest};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use taskhook_foundation::{Error, Result, ServiceConfig, TaskKind};
use taskhook_provider::{
    build_think_prompt, split_think_content, OllamaClient, TextGenerator, TrendsClient,
    TrendsQuery, TrendsSource,
};
use tracing::debug;

/// Body of one task kind
///
/// Return `InvalidInput` for payloads that can never succeed and a
/// retryable error (`UpstreamFailure`) for downstream trouble.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn kind(&self) -> TaskKind;

    async fn run(&self, task_id: &str, payload: &Value) -> Result<Value>;
}

/// Handlers by kind
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<TaskKind, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for its kind
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn with(mut self, handler: Arc<dyn TaskHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn get(&self, kind: TaskKind) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<TaskKind> {
        self.handlers.keys().copied().collect()
    }

    /// Every built-in kind, backed by the configured HTTP clients
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let generator = OllamaClient::from_config(&config.llm)?;
        let trends = TrendsClient::from_config(&config.trends)?;

        Ok(Self::new()
            .with(Arc::new(ThinkHandler::new(Arc::new(generator))))
            .with(Arc::new(TrendsHandler::new(Arc::new(trends)))))
    }
}

// ============================================================================
// think
// ============================================================================

/// Answers a question with the reasoning model
pub struct ThinkHandler {
    generator: Arc<dyn TextGenerator>,
}

impl ThinkHandler {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl TaskHandler for ThinkHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::Think
    }

    async fn run(&self, task_id: &str, payload: &Value) -> Result<Value> {
        let request: ThinkRequest = match TaskRequest::parse(TaskKind::Think, payload)? {
            TaskRequest::Think(request) => request,
            other => {
                return Err(Error::Internal(format!(
                    "think handler got a {} request",
                    other.kind()
                )))
            }
        };

        let prompt = build_think_prompt(&request.question, request.context.as_deref());
        debug!(task_id = %task_id, model = self.generator.model(), "Generating answer");

        let text = self.generator.generate(&prompt, request.options()).await?;
        let (thinking, answer) = split_think_content(&text);

        Ok(json!({
            "answer": answer,
            "thinking": thinking,
        }))
    }
}

// ============================================================================
// trends
// ============================================================================

/// Fetches interest-over-time series
pub struct TrendsHandler {
    source: Arc<dyn TrendsSource>,
}

impl TrendsHandler {
    pub fn new(source: Arc<dyn TrendsSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl TaskHandler for TrendsHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::Trends
    }

    async fn run(&self, task_id: &str, payload: &Value) -> Result<Value> {
        let query: TrendsQuery = match TaskRequest::parse(TaskKind::Trends, payload)? {
            TaskRequest::Trends(query) => query,
            other => {
                return Err(Error::Internal(format!(
                    "trends handler got a {} request",
                    other.kind()
                )))
            }
        };

        debug!(task_id = %task_id, keywords = ?query.keywords(), "Querying trends");
        let points = self.source.interest_over_time(&query).await?;

        Ok(json!({ "points": points }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskhook_provider::{
        GenerationOptions, ProviderError, QueryValue, TrendPoint,
    };

    struct CannedGenerator(std::result::Result<String, ProviderError>);

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(
            &self,
            _prompt: &str,
            _options: GenerationOptions,
        ) -> std::result::Result<String, ProviderError> {
            self.0.clone()
        }

        fn model(&self) -> &str {
            "canned"
        }
    }

    struct CannedTrends;

    #[async_trait]
    impl TrendsSource for CannedTrends {
        async fn interest_over_time(
            &self,
            query: &TrendsQuery,
        ) -> std::result::Result<Vec<TrendPoint>, ProviderError> {
            Ok(vec![TrendPoint {
                date: "2024-01-07".into(),
                is_partial: false,
                q_list: query
                    .keywords()
                    .into_iter()
                    .map(|query| QueryValue { query, value: 1.0 })
                    .collect(),
            }])
        }
    }

    #[tokio::test]
    async fn test_think_handler_splits_answer() {
        let handler = ThinkHandler::new(Arc::new(CannedGenerator(Ok(
            "<think>hmm</think> forty-two".to_string(),
        ))));
        let out = handler
            .run("t1", &json!({"question": "meaning of life?"}))
            .await
            .unwrap();
        assert_eq!(out, json!({"answer": "forty-two", "thinking": "hmm"}));
    }

    #[tokio::test]
    async fn test_think_handler_errors() {
        let handler = ThinkHandler::new(Arc::new(CannedGenerator(Err(
            ProviderError::ServerError("HTTP 500: boom".into()),
        ))));

        let err = handler
            .run("t1", &json!({"question": "meaning of life?"}))
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        let err = handler.run("t1", &json!({"nope": 1})).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_trends_handler() {
        let handler = TrendsHandler::new(Arc::new(CannedTrends));
        let out = handler
            .run("t2", &json!({"q": ["rust", "go"]}))
            .await
            .unwrap();
        assert_eq!(out["points"][0]["q_list"][1]["query"], "go");
        assert_eq!(out["points"][0]["is_partial"], false);
    }

    #[test]
    fn test_registry_from_config() {
        let registry = HandlerRegistry::from_config(&ServiceConfig::default()).unwrap();
        assert!(registry.get(TaskKind::Think).is_some());
        assert!(registry.get(TaskKind::Trends).is_some());
    }

    #[test]
    fn test_registry() {
        let registry = HandlerRegistry::new()
            .with(Arc::new(TrendsHandler::new(Arc::new(CannedTrends))));
        assert!(registry.get(TaskKind::Trends).is_some());
        assert!(registry.get(TaskKind::Think).is_none());
    }
}
