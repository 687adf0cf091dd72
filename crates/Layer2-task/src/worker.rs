//! Worker - worker-side half of the execution adapter
//!
//! Polls the broker, runs each job through [`TaskLifecycle`] and
//! re-enqueues retries with the fixed backoff. The worker never touches
//! the Task Store; everything it learns goes out as signed callbacks.

use crate::broker::{Broker, Job};
use crate::handler::HandlerRegistry;
use crate::lifecycle::{LifecycleHooks, Outcome, TaskLifecycle};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use taskhook_foundation::{Result, WorkerConfig};
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

pub struct Worker<H: LifecycleHooks + 'static> {
    broker: Arc<dyn Broker>,
    registry: Arc<HandlerRegistry>,
    lifecycle: Arc<TaskLifecycle<H>>,
    concurrency: usize,
    poll_interval: Duration,
}

impl<H: LifecycleHooks + 'static> Worker<H> {
    pub fn new(
        broker: Arc<dyn Broker>,
        registry: HandlerRegistry,
        lifecycle: TaskLifecycle<H>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            broker,
            registry: Arc::new(registry),
            lifecycle: Arc::new(lifecycle),
            concurrency: config.concurrency.max(1),
            poll_interval: config.poll_interval(),
        }
    }

    pub fn lifecycle(&self) -> &TaskLifecycle<H> {
        &self.lifecycle
    }

    /// Claim and process one ready job; `false` when none was ready
    pub async fn run_once(&self) -> Result<bool> {
        match self.broker.dequeue().await? {
            Some(job) => {
                process(&self.broker, &self.registry, &self.lifecycle, job).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Process jobs until `shutdown` resolves, then wait for in-flight jobs
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        info!(
            broker = self.broker.name(),
            concurrency = self.concurrency,
            kinds = ?self.registry.kinds(),
            "Worker started"
        );

        let slots = Arc::new(Semaphore::new(self.concurrency));
        tokio::pin!(shutdown);

        loop {
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = Arc::clone(&slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let job = match self.broker.dequeue().await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(self.poll_interval) => continue,
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to dequeue job");
                    drop(permit);
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(self.poll_interval) => continue,
                    }
                }
            };

            let broker = Arc::clone(&self.broker);
            let registry = Arc::clone(&self.registry);
            let lifecycle = Arc::clone(&self.lifecycle);
            tokio::spawn(async move {
                process(&broker, &registry, &lifecycle, job).await;
                drop(permit);
            });
        }

        info!("Worker stopping, waiting for in-flight jobs");
        let _ = slots.acquire_many(self.concurrency as u32).await;
        info!("Worker stopped");
        Ok(())
    }
}

async fn process<H: LifecycleHooks>(
    broker: &Arc<dyn Broker>,
    registry: &HandlerRegistry,
    lifecycle: &TaskLifecycle<H>,
    job: Job,
) {
    debug!(
        task_id = %job.task_id,
        kind = %job.kind,
        attempt = job.attempt,
        "Job claimed"
    );

    let outcome = match registry.get(job.kind) {
        Some(handler) => lifecycle.run(&job, handler.as_ref()).await,
        None => {
            lifecycle
                .reject(&job, &format!("No handler registered for kind {}", job.kind))
                .await
        }
    };

    if let Outcome::Retry { delay } = outcome {
        // the RETRY callback is already out; without a next attempt the
        // row would stay in RETRY
        if let Err(e) = broker.enqueue(job.next_attempt(), delay).await {
            lifecycle.abandon_retry(&job, &e).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use crate::handler::TaskHandler;
    use crate::state::LifecycleEvent;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};
    use taskhook_foundation::{Error, ErrorInfo, RetryPolicy, TaskKind};

    #[derive(Default)]
    struct RecordingHooks {
        events: Mutex<Vec<LifecycleEvent>>,
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

    /// Fails the first `failures` calls, then succeeds
    struct FlakyHandler {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl TaskHandler for FlakyHandler {
        fn kind(&self) -> TaskKind {
            TaskKind::Think
        }
        async fn run(
            &self,
            _task_id: &str,
            _payload: &Value,
        ) -> taskhook_foundation::Result<Value> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(Error::UpstreamFailure("LLM unavailable".into()))
            } else {
                Ok(json!({"answer": "y"}))
            }
        }
    }

    fn worker(failures: u32) -> (Worker<RecordingHooks>, Arc<MemoryBroker>) {
        let broker = Arc::new(MemoryBroker::new());
        let registry = HandlerRegistry::new().with(Arc::new(FlakyHandler {
            failures,
            calls: AtomicU32::new(0),
        }));
        let lifecycle = TaskLifecycle::new(
            RecordingHooks::default(),
            RetryPolicy {
                max_retries: 5,
                backoff_secs: 0,
            },
        );
        let worker = Worker::new(broker.clone(), registry, lifecycle, &WorkerConfig::default());
        (worker, broker)
    }

    fn job(kind: TaskKind) -> Job {
        Job {
            task_id: "t".into(),
            kind,
            payload: json!({"question": "x?"}),
            attempt: 0,
        }
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let (worker, broker) = worker(1);
        broker.enqueue(job(TaskKind::Think), Duration::ZERO).await.unwrap();

        assert!(worker.run_once().await.unwrap());
        let redelivered = broker.dequeue().await.unwrap().unwrap();
        assert_eq!(redelivered.attempt, 1);
        broker.enqueue(redelivered, Duration::ZERO).await.unwrap();

        assert!(worker.run_once().await.unwrap());
        assert!(!worker.run_once().await.unwrap());

        let names: Vec<_> = worker
            .lifecycle()
            .hooks()
            .events
            .lock()
            .iter()
            .map(|e| e.name())
            .collect();
        assert_eq!(
            names,
            vec!["before_start", "on_retry", "before_start", "on_success"]
        );
    }

    /// Hands out one job, refuses every enqueue
    struct FullBroker {
        pending: Mutex<Option<Job>>,
    }

    #[async_trait]
    impl Broker for FullBroker {
        async fn enqueue(&self, _job: Job, _delay: Duration) -> taskhook_foundation::Result<()> {
            Err(Error::Broker("disk full".into()))
        }
        async fn dequeue(&self) -> taskhook_foundation::Result<Option<Job>> {
            Ok(self.pending.lock().take())
        }
        async fn len(&self) -> taskhook_foundation::Result<usize> {
            Ok(usize::from(self.pending.lock().is_some()))
        }
        fn name(&self) -> &'static str {
            "full"
        }
    }

    #[tokio::test]
    async fn test_unschedulable_retry_fails_task() {
        let broker = Arc::new(FullBroker {
            pending: Mutex::new(Some(job(TaskKind::Think))),
        });
        let registry = HandlerRegistry::new().with(Arc::new(FlakyHandler {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        }));
        let lifecycle = TaskLifecycle::new(
            RecordingHooks::default(),
            RetryPolicy {
                max_retries: 5,
                backoff_secs: 0,
            },
        );
        let worker = Worker::new(broker, registry, lifecycle, &WorkerConfig::default());

        assert!(worker.run_once().await.unwrap());

        let events = worker.lifecycle().hooks().events.lock();
        let names: Vec<_> = events.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["before_start", "on_retry", "on_failure"]);
        assert!(matches!(
            &events[2],
            LifecycleEvent::Failed(info) if info.code == 500 && info.message.contains("disk full")
        ));
    }

    #[tokio::test]
    async fn test_missing_handler_fails_job() {
        let (worker, broker) = worker(0);
        broker.enqueue(job(TaskKind::Trends), Duration::ZERO).await.unwrap();

        assert!(worker.run_once().await.unwrap());
        assert!(broker.is_empty().await.unwrap());

        let events = worker.lifecycle().hooks().events.lock();
        assert!(matches!(&events[0], LifecycleEvent::Failed(info) if info.code == 422));
    }

    #[tokio::test]
    async fn test_run_drains_queue_and_stops() {
        let (worker, broker) = worker(0);
        for _ in 0..3 {
            broker.enqueue(job(TaskKind::Think), Duration::ZERO).await.unwrap();
        }

        let shutdown = async {
            while !broker.is_empty().await.unwrap() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        worker.run(shutdown).await.unwrap();

        let successes = worker
            .lifecycle()
            .hooks()
            .events
            .lock()
            .iter()
            .filter(|e| matches!(e, LifecycleEvent::Succeeded(_)))
            .count();
        assert_eq!(successes, 3);
    }
}
