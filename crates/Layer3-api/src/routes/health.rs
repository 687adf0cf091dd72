use crate::server::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use taskhook_provider::HealthReport;

/// Always 200; the body carries `ok` / `warning` / `error`
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(state.health.check().await)
}
