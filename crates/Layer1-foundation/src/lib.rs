//! # taskhook-foundation
//!
//! Foundation layer for Taskhook:
//! - Error: shared error taxonomy
//! - Config: ServiceConfig (defaults → TOML → environment)
//! - Storage: SQLite task store
//! - Security: HMAC task signatures
//!
//! ## 아키텍처
//!
//! ```text
//! ┌──────────────┐   create / read    ┌──────────────┐
//! │  API process │ ─────────────────▶ │  TaskStore   │
//! │              │ ◀── PUT callback ─ │   (SQLite)   │
//! └──────┬───────┘     (signed)       └──────────────┘
//!        │ enqueue                           ▲
//!        ▼                                   │ never touched
//! ┌──────────────┐                           │ by the worker
//! │    Broker    │ ──▶ Worker ───────────────┘
//! └──────────────┘
//! ```

pub mod config;
pub mod error;
pub mod security;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{
    ApiConfig, LlmConfig, RetryPolicy, ServiceConfig, SignatureConfig, TrendsConfig,
    WorkerConfig,
};

// ============================================================================
// Storage
// ============================================================================
pub use storage::{
    parse_sqlite_url, ErrorInfo, NewTask, Page, PageRequest, SqliteLocation, TaskKind,
    TaskPatch, TaskRecord, TaskStatus, TaskStore,
};

// ============================================================================
// Security
// ============================================================================
pub use security::{SignatureScope, TaskSigner, SIGNATURE_HEADER};
