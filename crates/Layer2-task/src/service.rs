//! Task Service
//!
//! The only component that mutates the Task Store. Ownership is checked
//! here, once; the store itself knows nothing about actors.

use crate::callback::CallbackRequest;
use crate::dispatcher::TaskDispatcher;
use crate::task::TaskCreate;
use serde::{Deserialize, Serialize};
use taskhook_foundation::{
    Error, ErrorInfo, NewTask, Page, PageRequest, Result, TaskPatch, TaskRecord, TaskStatus,
    TaskStore,
};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Authenticated caller of a user-facing operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    #[serde(default)]
    pub is_admin: bool,
}

impl Actor {
    pub fn user(id: i64) -> Self {
        Self {
            id,
            is_admin: false,
        }
    }

    pub fn admin(id: i64) -> Self {
        Self { id, is_admin: true }
    }

    /// Owner or admin
    pub fn can_act_for(&self, user_id: i64) -> bool {
        self.is_admin || self.id == user_id
    }

    fn ensure_can_act_for(&self, user_id: i64) -> Result<()> {
        if self.can_act_for(user_id) {
            Ok(())
        } else {
            Err(Error::forbidden())
        }
    }
}

#[derive(Clone)]
pub struct TaskService {
    store: TaskStore,
    dispatcher: TaskDispatcher,
}

impl TaskService {
    pub fn new(store: TaskStore, dispatcher: TaskDispatcher) -> Self {
        Self { store, dispatcher }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    // ========================================================================
    // Owner-facing operations
    // ========================================================================

    /// Persist a PENDING task and hand it to the broker
    ///
    /// The id is generated here so the row and the job carry the same key.
    /// If the broker refuses the job the row is marked FAILED and the broker
    /// error is returned.
    pub async fn create(
        &self,
        user_id: i64,
        actor: &Actor,
        payload: TaskCreate,
    ) -> Result<TaskRecord> {
        actor.ensure_can_act_for(user_id)?;
        payload.validate()?;

        let new_task = NewTask {
            id: Uuid::new_v4().to_string(),
            user_id,
            search_task_id: payload.search_task_id,
            kind: payload.kind,
            request_data: payload.request_data,
            schedule_at: payload.schedule_at,
        };
        let record = self.store.create(&new_task)?;

        if let Err(e) = self.dispatcher.submit(&record).await {
            warn!(task_id = %record.id, error = %e, "Failed to enqueue task");
            let patch = TaskPatch::status(TaskStatus::Failed)
                .with_error(ErrorInfo::new(500, format!("Failed to enqueue task: {}", e)));
            if let Err(update_err) = self.store.update(&record.id, &patch) {
                error!(
                    task_id = %record.id,
                    error = %update_err,
                    "Failed to mark unqueued task as FAILED"
                );
            }
            return Err(e);
        }

        info!(task_id = %record.id, user_id, kind = %record.kind, "Task submitted");
        Ok(record)
    }

    /// Read one task of `user_id`
    pub fn get_by_owner(&self, id: &str, user_id: i64, actor: &Actor) -> Result<TaskRecord> {
        actor.ensure_can_act_for(user_id)?;
        self.store.get_by_user_and_id(user_id, id)
    }

    /// Delete one task of `user_id`
    pub fn delete(&self, id: &str, user_id: i64, actor: &Actor) -> Result<()> {
        actor.ensure_can_act_for(user_id)?;
        // 404 when the row belongs to someone else
        self.store.get_by_user_and_id(user_id, id)?;
        self.store.delete(id)?;
        info!(task_id = %id, user_id, actor = actor.id, "Task deleted");
        Ok(())
    }

    pub fn list_by_owner(
        &self,
        user_id: i64,
        actor: &Actor,
        page: PageRequest,
    ) -> Result<Page<TaskRecord>> {
        actor.ensure_can_act_for(user_id)?;
        self.store.list_by_user(user_id, page)
    }

    pub fn list_by_search_task(
        &self,
        user_id: i64,
        search_task_id: &str,
        actor: &Actor,
        page: PageRequest,
    ) -> Result<Page<TaskRecord>> {
        actor.ensure_can_act_for(user_id)?;
        self.store.list_by_search_task(user_id, search_task_id, page)
    }

    /// Unrestricted listing; admins only
    pub fn list_all(&self, actor: &Actor, page: PageRequest) -> Result<Page<TaskRecord>> {
        if !actor.is_admin {
            return Err(Error::forbidden());
        }
        self.store.list_all(page)
    }

    // ========================================================================
    // Callback-facing operations (caller authenticated by signature)
    // ========================================================================

    /// Partial update, no ownership check
    pub fn update(&self, id: &str, patch: &TaskPatch) -> Result<TaskRecord> {
        self.store.update(id, patch)
    }

    pub fn increment_retry_count(&self, id: &str, by: u32) -> Result<TaskRecord> {
        self.store.increment_retry_count(id, by)
    }

    /// Apply a verified callback: the patch, then the retry increment
    ///
    /// Not idempotent; replaying a callback with `increment_retry_count`
    /// bumps the counter again. A `result_data` or `error` value that does
    /// not match the reported status is rejected before the row is touched.
    pub fn apply_callback(&self, id: &str, request: &CallbackRequest) -> Result<TaskRecord> {
        request.validate()?;
        let mut record = self.update(id, &request.to_patch())?;
        if request.increments_retry_count() {
            record = self.increment_retry_count(id, 1)?;
        }
        info!(
            task_id = %id,
            status = %record.status,
            retry_count = record.retry_count,
            "Callback applied"
        );
        Ok(record)
    }
}
