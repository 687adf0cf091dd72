//! Config - process configuration
//!
//! - `service.rs` - ServiceConfig, built once at startup and passed down

mod service;

pub use service::{
    ApiConfig, LlmConfig, RetryPolicy, ServiceConfig, SignatureConfig, TrendsConfig,
    WorkerConfig, DEFAULT_DATABASE_FILE, MAX_BACKOFF_SECS,
};
