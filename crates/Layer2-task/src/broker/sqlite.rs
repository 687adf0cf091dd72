//! SQLite-backed broker
//!
//! Jobs live in a `jobs` table of a database file both processes open.
//! Claiming is an immediate transaction doing select + delete, so a job is
//! handed to exactly one worker. A worker that dies after claiming loses
//! the job; the task row stays in its last reported status.

use super::{Broker, Job};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use taskhook_foundation::{Error, Result, TaskKind};
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SqliteBroker {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBroker {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Broker(format!("Failed to create broker directory: {}", e)))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::Broker(format!("Failed to open broker database: {}", e)))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| Error::Broker(format!("Failed to set pragmas: {}", e)))?;

        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Broker(format!("Failed to create in-memory broker: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| Error::Broker(format!("Failed to set busy timeout: {}", e)))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                attempt INTEGER NOT NULL DEFAULT 0,
                available_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_available ON jobs(available_at, seq);
            "#,
        )
        .map_err(|e| Error::Broker(format!("Failed to initialize jobs table: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl Broker for SqliteBroker {
    async fn enqueue(&self, job: Job, delay: Duration) -> Result<()> {
        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let available_at = now_millis().saturating_add(delay_ms);
        let payload = serde_json::to_string(&job.payload)?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO jobs (task_id, kind, payload, attempt, available_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![job.task_id, job.kind.as_str(), payload, job.attempt, available_at],
        )
        .map_err(|e| Error::Broker(format!("Failed to enqueue job: {}", e)))?;

        debug!(
            task_id = %job.task_id,
            attempt = job.attempt,
            delay_ms,
            "Job enqueued"
        );
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<Job>> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| Error::Broker(format!("Failed to begin claim: {}", e)))?;

        let row = tx
            .query_row(
                "SELECT seq, task_id, kind, payload, attempt FROM jobs \
                 WHERE available_at <= ?1 ORDER BY available_at, seq LIMIT 1",
                params![now_millis()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, u32>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| Error::Broker(format!("Failed to read job: {}", e)))?;

        let Some((seq, task_id, kind, payload, attempt)) = row else {
            return Ok(None);
        };

        tx.execute("DELETE FROM jobs WHERE seq = ?1", params![seq])
            .map_err(|e| Error::Broker(format!("Failed to claim job: {}", e)))?;
        tx.commit()
            .map_err(|e| Error::Broker(format!("Failed to commit claim: {}", e)))?;

        let kind: TaskKind = kind
            .parse()
            .map_err(|_| Error::Broker(format!("Unknown task kind in jobs table: {}", kind)))?;

        Ok(Some(Job {
            task_id,
            kind,
            payload: serde_json::from_str(&payload)?,
            attempt,
        }))
    }

    async fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))
            .map_err(|e| Error::Broker(format!("Failed to count jobs: {}", e)))?;
        Ok(count.max(0) as usize)
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
