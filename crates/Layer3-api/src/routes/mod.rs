//! Route table
//!
//! ## Routes (under `/api/v1`)
//!
//! - `POST   /task/`                               - create a task (bearer)
//! - `GET    /{user_id}/task/{task_id}/`           - read one task (bearer)
//! - `DELETE /{user_id}/task/{task_id}/`           - delete one task (bearer)
//! - `GET    /{user_id}/tasks/`                    - owner listing (bearer)
//! - `GET    /{user_id}/tasks/{search_task_id}/`   - tasks chained to a search task (bearer)
//! - `GET    /tasks/`                              - all tasks (bearer, admin)
//! - `PUT    /task/{task_id}/callback/`            - worker callback (`X-Signature`)
//! - `GET    /health/`                             - downstream health

pub mod callback;
pub mod health;
pub mod tasks;

use crate::server::AppState;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/task/", post(tasks::create_task))
        .route("/task/:task_id/callback/", put(callback::task_callback))
        .route("/tasks/", get(tasks::list_all_tasks))
        .route(
            "/:user_id/task/:task_id/",
            get(tasks::get_task).delete(tasks::delete_task),
        )
        .route("/:user_id/tasks/", get(tasks::list_user_tasks))
        .route(
            "/:user_id/tasks/:search_task_id/",
            get(tasks::list_search_task_tasks),
        )
        .route("/health/", get(health::health_check))
}
