//! Task lifecycle state machine
//!
//! ```text
//! PENDING ─▶ IN_PROGRESS ─┬─▶ COMPLETED
//!                ▲        ├─▶ FAILED
//!                └─ RETRY ◀┘
//! ```
//!
//! The worker never writes the store; each event becomes one signed
//! callback that the API applies.

use crate::callback::CallbackRequest;
use serde_json::Value;
use taskhook_foundation::{ErrorInfo, TaskStatus};

/// Error code for upstream failures and exhausted retries
pub const CODE_UPSTREAM: u16 = 500;

/// Error code for payloads the handler cannot parse
pub const CODE_INVALID_PAYLOAD: u16 = 422;

/// Something that happened to a task on the worker side
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// Worker dequeued the task and is about to run it
    Started,

    /// Handler returned normally
    Succeeded(Value),

    /// Retryable failure; another attempt is scheduled
    Retrying(ErrorInfo),

    /// Fatal failure or retries exhausted
    Failed(ErrorInfo),
}

impl LifecycleEvent {
    /// Status the task moves to
    pub fn target_status(&self) -> TaskStatus {
        match self {
            LifecycleEvent::Started => TaskStatus::InProgress,
            LifecycleEvent::Succeeded(_) => TaskStatus::Completed,
            LifecycleEvent::Retrying(_) => TaskStatus::Retry,
            LifecycleEvent::Failed(_) => TaskStatus::Failed,
        }
    }

    /// Whether no further event follows for this task
    pub fn is_terminal(&self) -> bool {
        self.target_status().is_terminal()
    }

    /// Callback body that reports this event
    pub fn to_callback(&self) -> CallbackRequest {
        let request = CallbackRequest::status(self.target_status());
        match self {
            LifecycleEvent::Started => request,
            LifecycleEvent::Succeeded(result) => request.with_result_data(result.clone()),
            LifecycleEvent::Retrying(error) => {
                request.with_error(error.clone()).with_retry_increment()
            }
            LifecycleEvent::Failed(error) => request.with_error(error.clone()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Started => "before_start",
            LifecycleEvent::Succeeded(_) => "on_success",
            LifecycleEvent::Retrying(_) => "on_retry",
            LifecycleEvent::Failed(_) => "on_failure",
        }
    }
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_events_follow_state_machine() {
        let started = LifecycleEvent::Started.target_status();
        assert!(TaskStatus::Pending.can_transition_to(started));
        assert!(TaskStatus::Retry.can_transition_to(started));

        for event in [
            LifecycleEvent::Succeeded(json!({})),
            LifecycleEvent::Retrying(ErrorInfo::new(500, "x")),
            LifecycleEvent::Failed(ErrorInfo::new(500, "x")),
        ] {
            assert!(started.can_transition_to(event.target_status()), "{}", event);
        }
    }

    #[test]
    fn test_callback_bodies() {
        let body = serde_json::to_value(LifecycleEvent::Started.to_callback()).unwrap();
        assert_eq!(body, json!({"status": "IN_PROGRESS"}));

        let body =
            serde_json::to_value(LifecycleEvent::Succeeded(json!({"answer": "y"})).to_callback())
                .unwrap();
        assert_eq!(
            body,
            json!({"status": "COMPLETED", "result_data": {"answer": "y"}})
        );

        let retry = LifecycleEvent::Retrying(ErrorInfo::new(CODE_UPSTREAM, "timeout"));
        assert!(!retry.is_terminal());
        let body = serde_json::to_value(retry.to_callback()).unwrap();
        assert_eq!(
            body,
            json!({
                "status": "RETRY",
                "error": {"code": 500, "message": "timeout"},
                "increment_retry_count": true
            })
        );

        assert!(LifecycleEvent::Failed(ErrorInfo::new(422, "bad")).is_terminal());
    }
}
