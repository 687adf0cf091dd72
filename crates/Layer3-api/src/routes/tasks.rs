//! Owner-facing task routes

use crate::auth::Authenticated;
use crate::error::ApiResult;
use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use taskhook_foundation::{Page, PageRequest, TaskRecord};
use taskhook_task::TaskCreate;

/// `POST /task/` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskBody {
    pub user_id: i64,
    #[serde(flatten)]
    pub task: TaskCreate,
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Authenticated(actor): Authenticated,
    Json(body): Json<CreateTaskBody>,
) -> ApiResult<(StatusCode, Json<TaskRecord>)> {
    let task = state.service.create(body.user_id, &actor, body.task).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Authenticated(actor): Authenticated,
    Path((user_id, task_id)): Path<(i64, String)>,
) -> ApiResult<Json<TaskRecord>> {
    Ok(Json(state.service.get_by_owner(&task_id, user_id, &actor)?))
}

pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Authenticated(actor): Authenticated,
    Path((user_id, task_id)): Path<(i64, String)>,
) -> ApiResult<StatusCode> {
    state.service.delete(&task_id, user_id, &actor)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_user_tasks(
    State(state): State<Arc<AppState>>,
    Authenticated(actor): Authenticated,
    Path(user_id): Path<i64>,
    Query(page): Query<PageRequest>,
) -> ApiResult<Json<Page<TaskRecord>>> {
    Ok(Json(state.service.list_by_owner(user_id, &actor, page)?))
}

pub async fn list_search_task_tasks(
    State(state): State<Arc<AppState>>,
    Authenticated(actor): Authenticated,
    Path((user_id, search_task_id)): Path<(i64, String)>,
    Query(page): Query<PageRequest>,
) -> ApiResult<Json<Page<TaskRecord>>> {
    Ok(Json(state.service.list_by_search_task(
        user_id,
        &search_task_id,
        &actor,
        page,
    )?))
}

pub async fn list_all_tasks(
    State(state): State<Arc<AppState>>,
    Authenticated(actor): Authenticated,
    Query(page): Query<PageRequest>,
) -> ApiResult<Json<Page<TaskRecord>>> {
    Ok(Json(state.service.list_all(&actor, page)?))
}
