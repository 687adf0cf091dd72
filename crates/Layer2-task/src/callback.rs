//! Signed callback protocol
//!
//! The worker reports every lifecycle event with
//! `PUT {callback_url}/task/{task_id}/callback/` carrying an `X-Signature`
//! header. Delivery is best effort: failures come back as
//! `Error::CallbackDelivery` for the caller to log.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use taskhook_foundation::storage::double_option;
use taskhook_foundation::{
    Error, ErrorInfo, Result, TaskPatch, TaskSigner, TaskStatus, WorkerConfig, SIGNATURE_HEADER,
};
use tracing::debug;

/// Body of a callback: a partial task update plus the retry flag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,

    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub result_data: Option<Option<Value>>,

    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<Option<ErrorInfo>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment_retry_count: Option<bool>,
}

impl CallbackRequest {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_result_data(mut self, value: Value) -> Self {
        self.result_data = Some(Some(value));
        self
    }

    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(Some(error));
        self
    }

    pub fn with_retry_increment(mut self) -> Self {
        self.increment_retry_count = Some(true);
        self
    }

    pub fn increments_retry_count(&self) -> bool {
        self.increment_retry_count.unwrap_or(false)
    }

    /// Store patch for the row; the retry flag is applied separately
    pub fn to_patch(&self) -> TaskPatch {
        TaskPatch {
            status: self.status,
            result_data: self.result_data.clone(),
            error: self.error.clone(),
        }
    }

    /// Reject payloads that break the status/field pairing
    ///
    /// `result_data` may only be written together with COMPLETED, `error`
    /// only with FAILED or RETRY. Explicit `null` clears are always allowed.
    pub fn validate(&self) -> Result<()> {
        if matches!(self.result_data, Some(Some(_)))
            && self.status != Some(TaskStatus::Completed)
        {
            return Err(Error::InvalidInput(
                "result_data requires status COMPLETED".to_string(),
            ));
        }
        if matches!(self.error, Some(Some(_)))
            && !matches!(self.status, Some(TaskStatus::Failed | TaskStatus::Retry))
        {
            return Err(Error::InvalidInput(
                "error requires status FAILED or RETRY".to_string(),
            ));
        }
        Ok(())
    }
}

/// Endpoint path for a task's callback, relative to the API base
pub fn callback_path(task_id: &str) -> String {
    format!("/task/{}/callback/", task_id)
}

// ============================================================================
// Client
// ============================================================================

/// Outbound side of the callback protocol
#[derive(Clone)]
pub struct CallbackClient {
    client: Client,
    base_url: String,
    signer: Arc<TaskSigner>,
}

impl CallbackClient {
    pub fn new(
        base_url: impl Into<String>,
        signer: Arc<TaskSigner>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build callback client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            signer,
        })
    }

    pub fn from_config(config: &WorkerConfig, signer: Arc<TaskSigner>) -> Result<Self> {
        Self::new(&config.callback_url, signer, config.callback_timeout())
    }

    pub fn url_for(&self, task_id: &str) -> String {
        format!("{}{}", self.base_url, callback_path(task_id))
    }

    /// Send one signed callback; any transport error or non-2xx is
    /// `CallbackDelivery`
    pub async fn send(&self, task_id: &str, request: &CallbackRequest) -> Result<()> {
        let body = serde_json::to_vec(request)?;
        let signature = self.signer.sign_callback(task_id, &body);
        let url = self.url_for(task_id);

        let response = self
            .client
            .put(&url)
            .header(SIGNATURE_HEADER, signature)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::CallbackDelivery(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::CallbackDelivery(format!(
                "{} returned {}: {}",
                url, status, text
            )));
        }

        debug!(task_id = %task_id, status = ?request.status, "Callback delivered");
        Ok(())
    }
}
