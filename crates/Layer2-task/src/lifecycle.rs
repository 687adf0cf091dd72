//! Lifecycle hooks and the generic wrapper that runs a handler between them

use crate::broker::Job;
use crate::callback::CallbackClient;
use crate::handler::TaskHandler;
use crate::state::{LifecycleEvent, CODE_INVALID_PAYLOAD, CODE_UPSTREAM};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use taskhook_foundation::{Error, ErrorInfo, RetryPolicy};
use tracing::{error, info, warn};

/// Callbacks around one task execution
///
/// Hooks never fail the task: implementations log their own errors.
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    async fn before_start(&self, task_id: &str);

    async fn on_success(&self, task_id: &str, result: &Value);

    async fn on_retry(&self, task_id: &str, error: &ErrorInfo);

    async fn on_failure(&self, task_id: &str, error: &ErrorInfo);
}

/// Hooks that report each event with a signed callback
pub struct CallbackHooks {
    client: CallbackClient,
}

impl CallbackHooks {
    pub fn new(client: CallbackClient) -> Self {
        Self { client }
    }

    async fn notify(&self, task_id: &str, event: LifecycleEvent) {
        if let Err(e) = self.client.send(task_id, &event.to_callback()).await {
            // at-most-once: the store may lag until the next delivery succeeds
            warn!(task_id = %task_id, event = %event, error = %e, "Callback delivery failed");
        }
    }
}

#[async_trait]
impl LifecycleHooks for CallbackHooks {
    async fn before_start(&self, task_id: &str) {
        self.notify(task_id, LifecycleEvent::Started).await;
    }

    async fn on_success(&self, task_id: &str, result: &Value) {
        self.notify(task_id, LifecycleEvent::Succeeded(result.clone()))
            .await;
    }

    async fn on_retry(&self, task_id: &str, error: &ErrorInfo) {
        self.notify(task_id, LifecycleEvent::Retrying(error.clone()))
            .await;
    }

    async fn on_failure(&self, task_id: &str, error: &ErrorInfo) {
        self.notify(task_id, LifecycleEvent::Failed(error.clone()))
            .await;
    }
}

/// What the worker should do after one execution
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed,
    /// Re-enqueue the next attempt after `delay`
    Retry { delay: Duration },
    Failed,
}

/// Runs any [`TaskHandler`] between the hooks and decides retry vs fatal
pub struct TaskLifecycle<H: LifecycleHooks> {
    hooks: H,
    retry: RetryPolicy,
}

impl<H: LifecycleHooks> TaskLifecycle<H> {
    pub fn new(hooks: H, retry: RetryPolicy) -> Self {
        Self { hooks, retry }
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub async fn run(&self, job: &Job, handler: &dyn TaskHandler) -> Outcome {
        let task_id = job.task_id.as_str();
        self.hooks.before_start(task_id).await;

        match handler.run(task_id, &job.payload).await {
            Ok(result) => {
                info!(task_id = %task_id, attempt = job.attempt, "Task completed");
                self.hooks.on_success(task_id, &result).await;
                Outcome::Completed
            }
            Err(err) => self.handle_error(job, err).await,
        }
    }

    /// Report a job that cannot run at all (e.g. no handler for its kind)
    pub async fn reject(&self, job: &Job, reason: &str) -> Outcome {
        let info = ErrorInfo::new(CODE_INVALID_PAYLOAD, reason);
        error!(task_id = %job.task_id, reason, "Task rejected");
        self.hooks.on_failure(&job.task_id, &info).await;
        Outcome::Failed
    }

    /// Report a retry that could not be scheduled; the task ends FAILED
    pub async fn abandon_retry(&self, job: &Job, err: &Error) {
        let info = ErrorInfo::new(CODE_UPSTREAM, format!("Failed to schedule retry: {}", err));
        error!(task_id = %job.task_id, attempt = job.attempt, error = %err, "Retry not scheduled");
        self.hooks.on_failure(&job.task_id, &info).await;
    }

    async fn handle_error(&self, job: &Job, err: Error) -> Outcome {
        let task_id = job.task_id.as_str();

        if err.is_retryable() && self.retry.allows_retry(job.attempt) {
            let info = ErrorInfo::new(CODE_UPSTREAM, err.to_string());
            warn!(
                task_id = %task_id,
                attempt = job.attempt,
                max_retries = self.retry.max_retries,
                error = %err,
                "Task failed, retrying"
            );
            self.hooks.on_retry(task_id, &info).await;
            return Outcome::Retry {
                delay: self.retry.backoff(),
            };
        }

        let info = classify_fatal(&err, job.attempt, &self.retry);
        error!(task_id = %task_id, attempt = job.attempt, error = %err, "Task failed");
        self.hooks.on_failure(task_id, &info).await;
        Outcome::Failed
    }
}

fn classify_fatal(err: &Error, attempt: u32, retry: &RetryPolicy) -> ErrorInfo {
    match err {
        Error::InvalidInput(_) => ErrorInfo::new(CODE_INVALID_PAYLOAD, err.to_string()),
        _ if err.is_retryable() => ErrorInfo::new(
            CODE_UPSTREAM,
            format!(
                "{} (gave up after {} of {} retries)",
                err, attempt, retry.max_retries
            ),
        ),
        _ => ErrorInfo::new(CODE_UPSTREAM, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use taskhook_foundation::{Result, TaskKind};

    #[derive(Default)]
    struct RecordingHooks {
        events: Mutex<Vec<LifecycleEvent>>,
    }

    impl RecordingHooks {
        fn names(&self) -> Vec<&'static str> {
            self.events.lock().iter().map(|e| e.name()).collect()
        }
    }

    #[async_trait]
    impl LifecycleHooks for RecordingHooks {
        async fn before_start(&self, _task_id: &str) {
            self.events.lock().push(LifecycleEvent::Started);
        }
        async fn on_success(&self, _task_id: &str, result: &Value) {
            self.events
                .lock()
                .push(LifecycleEvent::Succeeded(result.clone()));
        }
        async fn on_retry(&self, _task_id: &str, error: &ErrorInfo) {
            self.events
                .lock()
                .push(LifecycleEvent::Retrying(error.clone()));
        }
        async fn on_failure(&self, _task_id: &str, error: &ErrorInfo) {
            self.events.lock().push(LifecycleEvent::Failed(error.clone()));
        }
    }

    struct FixedHandler(fn() -> Result<Value>);

    #[async_trait]
    impl TaskHandler for FixedHandler {
        fn kind(&self) -> TaskKind {
            TaskKind::Think
        }
        async fn run(&self, _task_id: &str, _payload: &Value) -> Result<Value> {
            (self.0)()
        }
    }

    fn job(attempt: u32) -> Job {
        Job {
            task_id: "t".into(),
            kind: TaskKind::Think,
            payload: json!({}),
            attempt,
        }
    }

    fn lifecycle() -> TaskLifecycle<RecordingHooks> {
        TaskLifecycle::new(
            RecordingHooks::default(),
            RetryPolicy {
                max_retries: 2,
                backoff_secs: 5,
            },
        )
    }

    #[tokio::test]
    async fn test_success_path() {
        let lc = lifecycle();
        let outcome = lc
            .run(&job(0), &FixedHandler(|| Ok(json!({"answer": "y"}))))
            .await;
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(lc.hooks().names(), vec!["before_start", "on_success"]);
    }

    #[tokio::test]
    async fn test_retryable_until_ceiling() {
        let lc = lifecycle();
        let failing = FixedHandler(|| Err(Error::UpstreamFailure("503".into())));

        let outcome = lc.run(&job(1), &failing).await;
        assert_eq!(
            outcome,
            Outcome::Retry {
                delay: Duration::from_secs(5)
            }
        );

        let outcome = lc.run(&job(2), &failing).await;
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(
            lc.hooks().names(),
            vec!["before_start", "on_retry", "before_start", "on_failure"]
        );

        let events = lc.hooks().events.lock();
        let LifecycleEvent::Failed(info) = &events[3] else {
            panic!("expected failure event");
        };
        assert_eq!(info.code, 500);
        assert!(info.message.contains("gave up after 2 of 2 retries"));
    }

    #[tokio::test]
    async fn test_invalid_payload_is_fatal() {
        let lc = lifecycle();
        let outcome = lc
            .run(
                &job(0),
                &FixedHandler(|| Err(Error::InvalidInput("question missing".into()))),
            )
            .await;
        assert_eq!(outcome, Outcome::Failed);

        let events = lc.hooks().events.lock();
        assert_eq!(
            events[1],
            LifecycleEvent::Failed(ErrorInfo::new(
                422,
                "Invalid input: question missing"
            ))
        );
    }

    #[tokio::test]
    async fn test_reject() {
        let lc = lifecycle();
        assert_eq!(lc.reject(&job(0), "no handler").await, Outcome::Failed);
        assert_eq!(lc.hooks().names(), vec!["on_failure"]);
    }
}
