//! Storage - SQLite task store
//!
//! - `db.rs` - TaskStore (tasks table, migrations)
//! - `types.rs` - TaskRecord, TaskPatch, TaskStatus
//! - `page.rs` - page-number pagination

mod db;
mod page;
mod types;

pub use db::TaskStore;
pub use page::{Page, PageRequest, MAX_PAGE_SIZE};
pub use types::{double_option, ErrorInfo, NewTask, TaskKind, TaskPatch, TaskRecord, TaskStatus};

use crate::{Error, Result};
use std::path::PathBuf;

/// Where a SQLite database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteLocation {
    Memory,
    File(PathBuf),
}

/// Parse `sqlite://path`, `sqlite:path`, `sqlite::memory:` or a bare path
pub fn parse_sqlite_url(url: &str) -> Result<SqliteLocation> {
    let url = url.trim();
    match url {
        "" => Err(Error::Config("Database URL is empty".to_string())),
        "sqlite::memory:" | ":memory:" | "memory://" => Ok(SqliteLocation::Memory),
        _ => {
            if let Some(path) = url.strip_prefix("sqlite://") {
                Ok(SqliteLocation::File(PathBuf::from(path)))
            } else if let Some(path) = url.strip_prefix("sqlite:") {
                Ok(SqliteLocation::File(PathBuf::from(path)))
            } else if url.contains("://") {
                Err(Error::Config(format!("Unsupported database URL: {}", url)))
            } else {
                Ok(SqliteLocation::File(PathBuf::from(url)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sqlite_url() {
        assert_eq!(parse_sqlite_url("sqlite::memory:").unwrap(), SqliteLocation::Memory);
        assert_eq!(parse_sqlite_url("memory://").unwrap(), SqliteLocation::Memory);
        assert_eq!(
            parse_sqlite_url("sqlite:///var/lib/taskhook.db").unwrap(),
            SqliteLocation::File(PathBuf::from("/var/lib/taskhook.db"))
        );
        assert_eq!(
            parse_sqlite_url("data/jobs.db").unwrap(),
            SqliteLocation::File(PathBuf::from("data/jobs.db"))
        );
        assert!(parse_sqlite_url("postgres://db/tasks").is_err());
        assert!(parse_sqlite_url("  ").is_err());
    }
}
