//! Worker callback endpoint
//!
//! `PUT /task/{task_id}/callback/` with `X-Signature`. The signature is
//! checked before the task is looked up, so an unsigned request cannot learn
//! which ids exist. Replays are applied again (no idempotency key).

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use std::sync::Arc;
use taskhook_foundation::SIGNATURE_HEADER;
use taskhook_task::CallbackRequest;
use tracing::warn;

pub async fn task_callback(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !state.signer.verify_callback(&task_id, &body, signature) {
        warn!(task_id = %task_id, "Rejected callback with invalid signature");
        return Err(ApiError::invalid_signature());
    }

    let request: CallbackRequest = if body.is_empty() {
        CallbackRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::unprocessable(format!("Invalid callback body: {}", e)))?
    };

    state.service.apply_callback(&task_id, &request)?;
    Ok(StatusCode::NO_CONTENT)
}
