//! Task kinds, creation payloads and request validation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskhook_foundation::{Error, Result, TaskKind};
use taskhook_provider::{GenerationOptions, TrendsQuery};

pub const QUESTION_MIN_CHARS: usize = 3;
pub const QUESTION_MAX_CHARS: usize = 500;
pub const CONTEXT_MAX_CHARS: usize = 2000;

/// Creation payload for a task, minus the owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCreate {
    /// Search task this one is chained to
    #[serde(default)]
    pub search_task_id: Option<String>,

    /// Run no earlier than this instant
    #[serde(default)]
    pub schedule_at: Option<DateTime<Utc>>,

    pub kind: TaskKind,

    /// Kind-specific request fields
    pub request_data: Value,
}

impl TaskCreate {
    pub fn new(kind: TaskKind, request_data: Value) -> Self {
        Self {
            search_task_id: None,
            schedule_at: None,
            kind,
            request_data,
        }
    }

    pub fn with_search_task(mut self, search_task_id: impl Into<String>) -> Self {
        self.search_task_id = Some(search_task_id.into());
        self
    }

    pub fn with_schedule_at(mut self, at: DateTime<Utc>) -> Self {
        self.schedule_at = Some(at);
        self
    }

    /// Parse `request_data` for `kind`; 422-class error when it does not fit
    pub fn validate(&self) -> Result<TaskRequest> {
        TaskRequest::parse(self.kind, &self.request_data)
    }
}

/// Typed request for each task kind
#[derive(Debug, Clone, PartialEq)]
pub enum TaskRequest {
    Think(ThinkRequest),
    Trends(TrendsQuery),
}

impl TaskRequest {
    /// Deserialize and validate a stored payload
    pub fn parse(kind: TaskKind, payload: &Value) -> Result<Self> {
        match kind {
            TaskKind::Think => {
                let request: ThinkRequest = serde_json::from_value(payload.clone())
                    .map_err(|e| Error::InvalidInput(format!("think request: {}", e)))?;
                request.validate()?;
                Ok(TaskRequest::Think(request))
            }
            TaskKind::Trends => {
                let query: TrendsQuery = serde_json::from_value(payload.clone())
                    .map_err(|e| Error::InvalidInput(format!("trends request: {}", e)))?;
                query.validate()?;
                Ok(TaskRequest::Trends(query))
            }
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            TaskRequest::Think(_) => TaskKind::Think,
            TaskRequest::Trends(_) => TaskKind::Trends,
        }
    }
}

// ============================================================================
// Think
// ============================================================================

/// Question for the reasoning model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkRequest {
    pub question: String,

    #[serde(default)]
    pub context: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f64 {
    GenerationOptions::default().temperature
}

fn default_max_tokens() -> u32 {
    GenerationOptions::default().max_tokens
}

impl ThinkRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        let question_len = self.question.trim().chars().count();
        if !(QUESTION_MIN_CHARS..=QUESTION_MAX_CHARS).contains(&question_len) {
            return Err(Error::InvalidInput(format!(
                "question must be {}..={} characters",
                QUESTION_MIN_CHARS, QUESTION_MAX_CHARS
            )));
        }
        if let Some(context) = &self.context {
            if context.chars().count() > CONTEXT_MAX_CHARS {
                return Err(Error::InvalidInput(format!(
                    "context must be at most {} characters",
                    CONTEXT_MAX_CHARS
                )));
            }
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::InvalidInput(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        if !(10..=512).contains(&self.max_tokens) {
            return Err(Error::InvalidInput(
                "max_tokens must be between 10 and 512".to_string(),
            ));
        }
        Ok(())
    }

    pub fn options(&self) -> GenerationOptions {
        GenerationOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}
