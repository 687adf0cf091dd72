//! Service Config - explicit process configuration
//!
//! Layered sources, later ones win:
//! 1. built-in defaults
//! 2. optional TOML file
//! 3. process environment (`TASK_SIGNATURE_KEY`, `BROKER_URL`, ...)
//!
//! The result is constructed once in `main` and shared by `Arc`; nothing in
//! the workspace reads the environment on its own.

use crate::security::SignatureScope;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default SQLite file name used when no `DATABASE_URL` is given
pub const DEFAULT_DATABASE_FILE: &str = "taskhook.db";

/// Upper bound for `TASK_RETRY_BACKOFF_SECS` (one day)
pub const MAX_BACKOFF_SECS: u64 = 24 * 60 * 60;

// ============================================================================
// ServiceConfig
// ============================================================================

/// Complete configuration for the API and worker processes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP surface and task store
    pub api: ApiConfig,

    /// Broker location (`memory://` or `sqlite://path`)
    pub broker_url: String,

    /// Callback signing
    pub signature: SignatureConfig,

    /// Worker retry ceiling and backoff
    pub retry: RetryPolicy,

    /// Worker process settings
    pub worker: WorkerConfig,

    /// LLM generation backend
    pub llm: LlmConfig,

    /// Trends-data backend
    pub trends: TrendsConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            broker_url: "memory://".to_string(),
            signature: SignatureConfig::default(),
            retry: RetryPolicy::default(),
            worker: WorkerConfig::default(),
            llm: LlmConfig::default(),
            trends: TrendsConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load defaults, then the optional TOML file, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file; missing keys fall back to defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse TOML text; missing keys fall back to defaults
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }

    /// Overlay values found through `lookup` (normally `std::env::var`)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BIND_ADDR") {
            self.api.bind_addr = v;
        }
        if let Some(v) = lookup("DATABASE_URL") {
            self.api.database_url = v;
        }
        if let Some(v) = lookup("USER_AUTH_URL") {
            self.api.user_auth_url = Some(v);
        }
        if let Some(v) = lookup("BROKER_URL") {
            self.broker_url = v;
        }

        if let Some(v) = lookup("TASK_SIGNATURE_KEY") {
            self.signature.key = v;
        }
        if let Some(v) = lookup("TASK_SIGNATURE_SCOPE") {
            self.signature.scope = v.parse()?;
        }

        if let Some(v) = lookup("TASK_MAX_RETRIES") {
            self.retry.max_retries = parse_env("TASK_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("TASK_RETRY_BACKOFF_SECS") {
            self.retry.backoff_secs = parse_env("TASK_RETRY_BACKOFF_SECS", &v)?;
        }

        if let Some(v) = lookup("TASK_CALLBACK_URL") {
            self.worker.callback_url = v;
        }
        if let Some(v) = lookup("CALLBACK_TIMEOUT_SECS") {
            self.worker.callback_timeout_secs = parse_env("CALLBACK_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("WORKER_CONCURRENCY") {
            self.worker.concurrency = parse_env("WORKER_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("WORKER_POLL_INTERVAL_MS") {
            self.worker.poll_interval_ms = parse_env("WORKER_POLL_INTERVAL_MS", &v)?;
        }

        if let Some(v) = lookup("OLLAMA_API_URL") {
            self.llm.api_url = v;
        }
        if let Some(v) = lookup("OLLAMA_MODEL_NAME") {
            self.llm.model_name = v;
        }
        if let Some(v) = lookup("OLLAMA_REQUEST_TIMEOUT") {
            self.llm.request_timeout_secs = parse_env("OLLAMA_REQUEST_TIMEOUT", &v)?;
        }

        if let Some(v) = lookup("TRENDS_API_URL") {
            self.trends.api_url = v;
        }
        if let Some(v) = lookup("TRENDS_REQUEST_TIMEOUT") {
            self.trends.request_timeout_secs = parse_env("TRENDS_REQUEST_TIMEOUT", &v)?;
        }

        Ok(())
    }

    /// Reject configurations no process can run with
    pub fn validate(&self) -> Result<()> {
        if self.signature.key.trim().is_empty() {
            return Err(Error::Config(
                "TASK_SIGNATURE_KEY must be set to a non-empty secret".to_string(),
            ));
        }
        if self.retry.backoff_secs > MAX_BACKOFF_SECS {
            return Err(Error::Config(format!(
                "TASK_RETRY_BACKOFF_SECS must be at most {}",
                MAX_BACKOFF_SECS
            )));
        }
        if self.worker.concurrency == 0 {
            return Err(Error::Config(
                "WORKER_CONCURRENCY must be at least 1".to_string(),
            ));
        }
        if self.worker.callback_url.trim().is_empty() {
            return Err(Error::Config("TASK_CALLBACK_URL must not be empty".to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // Builder (tests, embedded setups)
    // ========================================================================

    pub fn with_signature_key(mut self, key: impl Into<String>) -> Self {
        self.signature.key = key.into();
        self
    }

    pub fn with_callback_url(mut self, url: impl Into<String>) -> Self {
        self.worker.callback_url = url.into();
        self
    }

    pub fn with_retry(mut self, max_retries: u32, backoff_secs: u64) -> Self {
        self.retry = RetryPolicy {
            max_retries,
            backoff_secs,
        };
        self
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} has an invalid value: {:?}", key, value)))
}

// ============================================================================
// Sections
// ============================================================================

/// HTTP surface settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Listen address, e.g. `0.0.0.0:8000`
    pub bind_addr: String,

    /// `sqlite://path`, a bare path, or `sqlite::memory:`
    pub database_url: String,

    /// Users service endpoint that resolves a bearer token to an actor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_auth_url: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let database_url = dirs::data_dir()
            .map(|dir| dir.join("taskhook").join(DEFAULT_DATABASE_FILE))
            .map(|path| format!("sqlite://{}", path.display()))
            .unwrap_or_else(|| format!("sqlite://{}", DEFAULT_DATABASE_FILE));

        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            database_url,
            user_auth_url: None,
        }
    }
}

/// Shared secret and signing scope for worker callbacks
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// `TASK_SIGNATURE_KEY`
    pub key: String,

    /// What the MAC covers
    pub scope: SignatureScope,
}

impl std::fmt::Debug for SignatureConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureConfig")
            .field("key", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Fixed-delay retry policy applied by the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,

    /// Delay before a retried job becomes visible again
    pub backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_secs: 5,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    /// Whether a job that has already been retried `attempt` times may run again
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// Worker process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Base URL the worker calls back to, e.g. `http://api:8000/api/v1`
    pub callback_url: String,

    pub callback_timeout_secs: u64,

    /// Jobs executed in parallel
    pub concurrency: usize,

    /// Sleep between polls when the broker is empty
    pub poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            callback_url: "http://127.0.0.1:8000/api/v1".to_string(),
            callback_timeout_secs: 10,
            concurrency: 4,
            poll_interval_ms: 500,
        }
    }
}

impl WorkerConfig {
    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// LLM generation backend (Ollama-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_url: String,
    pub model_name: String,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:11434/api".to_string(),
            model_name: "deepseek-r1:1.5b".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Trends-data backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendsConfig {
    pub api_url: String,
    pub request_timeout_secs: u64,
}

impl Default for TrendsConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8100".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl TrendsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_need_a_key() {
        let config = ServiceConfig::default();
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.backoff(), Duration::from_secs(5));
        assert!(config.validate().is_err());
        assert!(config.with_signature_key("s3cret").validate().is_ok());
    }

    #[test]
    fn test_env_overlay() {
        let mut config = ServiceConfig::default();
        config
            .apply_env(lookup(&[
                ("TASK_SIGNATURE_KEY", "k"),
                ("TASK_SIGNATURE_SCOPE", "task_id_and_body"),
                ("TASK_MAX_RETRIES", "2"),
                ("TASK_RETRY_BACKOFF_SECS", "1"),
                ("BROKER_URL", "sqlite:///tmp/jobs.db"),
                ("TASK_CALLBACK_URL", "http://api/api/v1"),
            ]))
            .unwrap();

        assert_eq!(config.signature.key, "k");
        assert_eq!(config.signature.scope, SignatureScope::TaskIdAndBody);
        assert_eq!(config.retry, RetryPolicy { max_retries: 2, backoff_secs: 1 });
        assert_eq!(config.broker_url, "sqlite:///tmp/jobs.db");
        assert_eq!(config.worker.callback_url, "http://api/api/v1");
    }

    #[test]
    fn test_env_rejects_bad_numbers() {
        let mut config = ServiceConfig::default();
        let err = config
            .apply_env(lookup(&[("TASK_MAX_RETRIES", "many")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_toml_partial_file() {
        let config = ServiceConfig::from_toml_str(
            r#"
            broker_url = "sqlite://jobs.db"

            [retry]
            max_retries = 3

            [signature]
            key = "from-file"
            "#,
        )
        .unwrap();

        assert_eq!(config.broker_url, "sqlite://jobs.db");
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.backoff_secs, 5);
        assert_eq!(config.signature.scope, SignatureScope::TaskId);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = ServiceConfig::default().with_signature_key("super-secret");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = ServiceConfig::default()
            .with_signature_key("k")
            .with_retry(3, MAX_BACKOFF_SECS);
        assert!(config.validate().is_ok());

        let err = config
            .with_retry(3, MAX_BACKOFF_SECS + 1)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_retry_ceiling() {
        let policy = RetryPolicy { max_retries: 2, backoff_secs: 0 };
        assert!(policy.allows_retry(0));
        assert!(policy.allows_retry(1));
        assert!(!policy.allows_retry(2));
    }
}
