//! Task Dispatcher - API-side half of the execution adapter

use crate::broker::{Broker, Job};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use taskhook_foundation::{Result, TaskRecord};
use tracing::debug;

#[derive(Clone)]
pub struct TaskDispatcher {
    broker: Arc<dyn Broker>,
}

impl TaskDispatcher {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> Arc<dyn Broker> {
        Arc::clone(&self.broker)
    }

    /// Enqueue the first attempt of `task`, held back until `schedule_at`
    pub async fn submit(&self, task: &TaskRecord) -> Result<()> {
        let delay = initial_delay(task.schedule_at, Utc::now());
        self.broker.enqueue(Job::from_task(task), delay).await?;
        debug!(
            task_id = %task.id,
            broker = self.broker.name(),
            delay_secs = delay.as_secs(),
            "Task dispatched"
        );
        Ok(())
    }
}

/// Time until `schedule_at`; zero when unset or already past
pub fn initial_delay(schedule_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
    schedule_at
        .and_then(|at| (at - now).to_std().ok())
        .unwrap_or(Duration::ZERO)
}
