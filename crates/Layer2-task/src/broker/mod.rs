//! Broker - hands task invocations from the API process to workers
//!
//! - `memory://`: in-process queue (single process, tests)
//! - `sqlite://path`: `jobs` table shared by API and worker processes

mod memory;
mod sqlite;

pub use memory::MemoryBroker;
pub use sqlite::SqliteBroker;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use taskhook_foundation::{parse_sqlite_url, Result, SqliteLocation, TaskKind, TaskRecord};

pub const MEMORY_BROKER_URL: &str = "memory://";

/// One invocation of a task body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub task_id: String,
    pub kind: TaskKind,
    pub payload: Value,
    /// Retries already taken (0 on first delivery)
    pub attempt: u32,
}

impl Job {
    pub fn from_task(task: &TaskRecord) -> Self {
        Self {
            task_id: task.id.clone(),
            kind: task.kind,
            payload: task.request_data.clone(),
            attempt: 0,
        }
    }

    /// Same job, one retry later
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}

/// Delivery backend
///
/// `dequeue` claims a job: once returned, no other caller sees it again.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Make `job` available after `delay`
    async fn enqueue(&self, job: Job, delay: Duration) -> Result<()>;

    /// Claim the next ready job, if any
    async fn dequeue(&self) -> Result<Option<Job>>;

    /// Jobs waiting, ready or delayed
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    fn name(&self) -> &'static str;
}

/// Build a broker from `BROKER_URL`
pub fn open_broker(url: &str) -> Result<Arc<dyn Broker>> {
    if url.trim() == MEMORY_BROKER_URL {
        return Ok(Arc::new(MemoryBroker::new()));
    }
    match parse_sqlite_url(url)? {
        SqliteLocation::Memory => Ok(Arc::new(SqliteBroker::in_memory()?)),
        SqliteLocation::File(path) => Ok(Arc::new(SqliteBroker::open(&path)?)),
    }
}

/// Whether `url` names the in-process broker
pub fn is_in_process(url: &str) -> bool {
    url.trim() == MEMORY_BROKER_URL
}
