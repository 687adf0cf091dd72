//! Task record types persisted by [`TaskStore`](super::TaskStore)

use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status of a task
///
/// ```text
/// PENDING -> IN_PROGRESS -> COMPLETED
///                        -> FAILED
///                        -> RETRY -> IN_PROGRESS
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Retry,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Retry => "RETRY",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        }
    }

    /// Terminal for the current attempt
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether the state machine has an edge `self -> next`
    ///
    /// The store does not enforce this: callbacks are applied last-write-wins.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Retry)
                | (Retry, InProgress)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TaskStatus::Pending),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "RETRY" => Ok(TaskStatus::Retry),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "FAILED" => Ok(TaskStatus::Failed),
            other => Err(Error::InvalidInput(format!("Unknown task status: {}", other))),
        }
    }
}

// ============================================================================
// Kind
// ============================================================================

/// Which worker handler executes a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// LLM question answering
    Think,

    /// Trends-data search
    Trends,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Think => "think",
            TaskKind::Trends => "trends",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "think" => Ok(TaskKind::Think),
            "trends" => Ok(TaskKind::Trends),
            other => Err(Error::InvalidInput(format!("Unknown task kind: {}", other))),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// `{code, message}` reported by a failed or retried attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: u16,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A persisted task row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub user_id: i64,
    pub search_task_id: Option<String>,
    pub kind: TaskKind,
    pub request_data: serde_json::Value,
    pub schedule_at: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub result_data: Option<serde_json::Value>,
    pub error: Option<ErrorInfo>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload; the id is chosen by the caller
#[derive(Debug, Clone)]
pub struct NewTask {
    pub id: String,
    pub user_id: i64,
    pub search_task_id: Option<String>,
    pub kind: TaskKind,
    pub request_data: serde_json::Value,
    pub schedule_at: Option<DateTime<Utc>>,
}

/// Partial update of a task row
///
/// Outer `None` leaves the column untouched; `Some(None)` writes NULL.
/// When deserialized, an absent key is `None` and an explicit `null` is
/// `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,

    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub result_data: Option<Option<serde_json::Value>>,

    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<Option<ErrorInfo>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_result_data(mut self, value: serde_json::Value) -> Self {
        self.result_data = Some(Some(value));
        self
    }

    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(Some(error));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.result_data.is_none() && self.error.is_none()
    }
}

/// Present key (even `null`) becomes `Some(..)`; absent key stays at the
/// `#[serde(default)]` value of `None`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
