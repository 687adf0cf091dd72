//! SQLite task store
//!
//! Durable keyed storage for task rows. Every mutation is a single
//! read-modify-write inside one transaction while holding the connection
//! lock; that is the only concurrency guard. Two callbacks racing on the
//! same task are applied last-write-wins.
//!
//! ## Migration System
//!
//! Schema is versioned; migrations run on open.
//! - Version 1: tasks table
//! - Version 2: composite index for owner listings

use super::page::{Page, PageRequest};
use super::types::{ErrorInfo, NewTask, TaskKind, TaskPatch, TaskRecord, TaskStatus};
use super::{parse_sqlite_url, SqliteLocation};
use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, ToSql};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Current schema version
const CURRENT_SCHEMA_VERSION: i32 = 2;

const TASK_COLUMNS: &str = "id, user_id, search_task_id, kind, request_data, schedule_at, \
     status, result_data, error, retry_count, created_at, updated_at";

/// Task Store backed by SQLite
#[derive(Clone)]
pub struct TaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl TaskStore {
    /// Open (or create) a database file
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("Failed to create data directory: {}", e))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;

        // WAL lets the API and an operator shell read while callbacks write
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| Error::Storage(format!("Failed to set pragmas: {}", e)))?;

        Self::with_connection(conn)
    }

    /// Open from a `DATABASE_URL`
    pub fn open_url(url: &str) -> Result<Self> {
        match parse_sqlite_url(url)? {
            SqliteLocation::Memory => Self::in_memory(),
            SqliteLocation::File(path) => Self::open(&path),
        }
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to create in-memory database: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize_schema()?;
        store.run_migrations()?;
        Ok(store)
    }

    /// Get current schema version from database
    pub fn get_schema_version(&self) -> Result<i32> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| Error::Storage(format!("Failed to get schema version: {}", e)))
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                search_task_id TEXT,
                kind TEXT NOT NULL CHECK(kind IN ('think', 'trends')),
                request_data TEXT NOT NULL,
                schedule_at TEXT,
                status TEXT NOT NULL CHECK(status IN ('PENDING', 'IN_PROGRESS', 'RETRY', 'COMPLETED', 'FAILED')),
                result_data TEXT,
                error TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_search ON tasks(search_task_id);

            INSERT OR IGNORE INTO schema_version (version) VALUES (1);
            "#,
        )
        .map_err(|e| Error::Storage(format!("Failed to initialize schema: {}", e)))
    }

    fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version()?;

        if current_version >= CURRENT_SCHEMA_VERSION {
            debug!("Task schema is up to date (version {})", current_version);
            return Ok(());
        }

        info!(
            "Running task store migrations from version {} to {}",
            current_version, CURRENT_SCHEMA_VERSION
        );

        let conn = self.conn.lock();
        for version in (current_version + 1)..=CURRENT_SCHEMA_VERSION {
            match version {
                2 => Self::migrate_v2(&conn)?,
                _ => warn!("Unknown migration version: {}", version),
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![version],
            )
            .map_err(|e| Error::Storage(format!("Failed to record migration: {}", e)))?;

            info!("Applied migration to version {}", version);
        }

        Ok(())
    }

    /// Version 2: owner listings are ordered by creation time
    fn migrate_v2(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tasks_user_created ON tasks(user_id, created_at DESC)",
            [],
        )
        .map_err(|e| Error::Storage(format!("Migration v2 failed: {}", e)))?;
        Ok(())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert a PENDING task; fails with `AlreadyExists` on id collision
    pub fn create(&self, task: &NewTask) -> Result<TaskRecord> {
        let now = Utc::now();
        let record = TaskRecord {
            id: task.id.clone(),
            user_id: task.user_id,
            search_task_id: task.search_task_id.clone(),
            kind: task.kind,
            request_data: task.request_data.clone(),
            schedule_at: task.schedule_at,
            status: TaskStatus::Pending,
            result_data: None,
            error: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        };

        let conn = self.conn.lock();
        let inserted = conn.execute(
            &format!(
                "INSERT INTO tasks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                TASK_COLUMNS
            ),
            params![
                record.id,
                record.user_id,
                record.search_task_id,
                record.kind.as_str(),
                serde_json::to_string(&record.request_data)?,
                record.schedule_at.map(format_timestamp),
                record.status.as_str(),
                Option::<String>::None,
                Option::<String>::None,
                record.retry_count,
                format_timestamp(record.created_at),
                format_timestamp(record.updated_at),
            ],
        );

        match inserted {
            Ok(_) => {
                debug!(task_id = %record.id, user_id = record.user_id, "Task created");
                Ok(record)
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(Error::AlreadyExists(format!("Task {} already exists", task.id)))
            }
            Err(e) => Err(Error::Storage(format!("Failed to create task: {}", e))),
        }
    }

    /// Apply only the fields present in `patch`
    pub fn update(&self, id: &str, patch: &TaskPatch) -> Result<TaskRecord> {
        self.modify(id, |task| {
            if let Some(status) = patch.status {
                task.status = status;
            }
            if let Some(result_data) = &patch.result_data {
                task.result_data = result_data.clone();
            }
            if let Some(error) = &patch.error {
                task.error = error.clone();
            }
        })
    }

    /// Add `by` to `retry_count`
    pub fn increment_retry_count(&self, id: &str, by: u32) -> Result<TaskRecord> {
        self.modify(id, |task| {
            task.retry_count = task.retry_count.saturating_add(by);
        })
    }

    /// Remove a task row
    pub fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock();
        let removed = conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])
            .map_err(|e| Error::Storage(format!("Failed to delete task: {}", e)))?;

        if removed == 0 {
            return Err(Error::task_not_found(id));
        }
        debug!(task_id = %id, "Task deleted");
        Ok(())
    }

    /// Read-modify-write of one row in a single transaction
    fn modify<F>(&self, id: &str, apply: F) -> Result<TaskRecord>
    where
        F: FnOnce(&mut TaskRecord),
    {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(format!("Failed to begin transaction: {}", e)))?;

        let mut task = tx
            .query_row(
                &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                params![id],
                RawTask::from_row,
            )
            .optional()
            .map_err(|e| Error::Storage(format!("Failed to load task: {}", e)))?
            .ok_or_else(|| Error::task_not_found(id))?
            .into_record()?;

        apply(&mut task);
        task.updated_at = Utc::now().max(task.updated_at);

        tx.execute(
            r#"
            UPDATE tasks SET
                status = ?2,
                result_data = ?3,
                error = ?4,
                retry_count = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
            params![
                task.id,
                task.status.as_str(),
                task.result_data.as_ref().map(serde_json::to_string).transpose()?,
                task.error.as_ref().map(serde_json::to_string).transpose()?,
                task.retry_count,
                format_timestamp(task.updated_at),
            ],
        )
        .map_err(|e| Error::Storage(format!("Failed to update task: {}", e)))?;

        tx.commit()
            .map_err(|e| Error::Storage(format!("Failed to commit task update: {}", e)))?;

        Ok(task)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Point lookup; `NotFound` if absent
    pub fn get_by_id(&self, id: &str) -> Result<TaskRecord> {
        self.find_one("id = ?1", &[&id])?
            .ok_or_else(|| Error::task_not_found(id))
    }

    /// Point lookup scoped to an owner; `NotFound` if absent or owned by someone else
    pub fn get_by_user_and_id(&self, user_id: i64, id: &str) -> Result<TaskRecord> {
        self.find_one("id = ?1 AND user_id = ?2", &[&id, &user_id])?
            .ok_or_else(|| Error::task_not_found(id))
    }

    pub fn list_by_user(&self, user_id: i64, page: PageRequest) -> Result<Page<TaskRecord>> {
        self.list("user_id = ?1", &[&user_id], page)
    }

    /// Tasks chained to a search task
    pub fn list_by_search_task(
        &self,
        user_id: i64,
        search_task_id: &str,
        page: PageRequest,
    ) -> Result<Page<TaskRecord>> {
        self.list(
            "user_id = ?1 AND search_task_id = ?2",
            &[&user_id, &search_task_id],
            page,
        )
    }

    /// Unrestricted listing (admin)
    pub fn list_all(&self, page: PageRequest) -> Result<Page<TaskRecord>> {
        self.list("1 = 1", &[], page)
    }

    fn find_one(&self, filter: &str, args: &[&dyn ToSql]) -> Result<Option<TaskRecord>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM tasks WHERE {}", TASK_COLUMNS, filter),
            args,
            RawTask::from_row,
        )
        .optional()
        .map_err(|e| Error::Storage(format!("Failed to get task: {}", e)))?
        .map(RawTask::into_record)
        .transpose()
    }

    fn list(
        &self,
        filter: &str,
        args: &[&dyn ToSql],
        page: PageRequest,
    ) -> Result<Page<TaskRecord>> {
        let page = page.normalized();
        let conn = self.conn.lock();

        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM tasks WHERE {}", filter),
                args,
                |row| row.get(0),
            )
            .map_err(|e| Error::Storage(format!("Failed to count tasks: {}", e)))?;

        let query = format!(
            "SELECT {} FROM tasks WHERE {} ORDER BY created_at DESC, id LIMIT {} OFFSET {}",
            TASK_COLUMNS,
            filter,
            page.limit(),
            page.offset()
        );

        let mut stmt = conn
            .prepare(&query)
            .map_err(|e| Error::Storage(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(args, RawTask::from_row)
            .map_err(|e| Error::Storage(format!("Failed to query tasks: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Storage(format!("Failed to read tasks: {}", e)))?;

        let items = rows
            .into_iter()
            .map(RawTask::into_record)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(items, total.max(0) as u64, page))
    }
}

// ============================================================================
// Row mapping
// ============================================================================

/// Column values as stored, before JSON / timestamp decoding
struct RawTask {
    id: String,
    user_id: i64,
    search_task_id: Option<String>,
    kind: String,
    request_data: String,
    schedule_at: Option<String>,
    status: String,
    result_data: Option<String>,
    error: Option<String>,
    retry_count: u32,
    created_at: String,
    updated_at: String,
}

impl RawTask {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            search_task_id: row.get(2)?,
            kind: row.get(3)?,
            request_data: row.get(4)?,
            schedule_at: row.get(5)?,
            status: row.get(6)?,
            result_data: row.get(7)?,
            error: row.get(8)?,
            retry_count: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn into_record(self) -> Result<TaskRecord> {
        Ok(TaskRecord {
            kind: self.kind.parse::<TaskKind>()?,
            request_data: serde_json::from_str(&self.request_data)?,
            schedule_at: self.schedule_at.as_deref().map(parse_timestamp).transpose()?,
            status: self.status.parse::<TaskStatus>()?,
            result_data: self
                .result_data
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            error: self
                .error
                .as_deref()
                .map(serde_json::from_str::<ErrorInfo>)
                .transpose()?,
            retry_count: self.retry_count,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            id: self.id,
            user_id: self.user_id,
            search_task_id: self.search_task_id,
        })
    }
}

/// Fixed-width RFC 3339 so lexical order equals time order
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("Invalid timestamp {:?}: {}", raw, e)))
}
