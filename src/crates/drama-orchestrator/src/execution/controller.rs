//! Task Lifecycle Controller
//!
//! Owns every write to task records. Each write is a conditional update
//! against the current status, so the state graph holds even when a worker
//! and a caller race on the same task. The controller also keeps the
//! in-process cancellation tokens of running tasks and fires them on cancel.

use crate::db::models::TaskRecord;
use crate::db::repositories::TaskRepository;
use crate::db::DatabaseConnection;
use crate::{OrchestratorError, Result, TaskKind, TaskStatus};
use dashmap::DashMap;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default page size for task listings
pub const DEFAULT_LIST_LIMIT: i64 = 100;

/// Task lifecycle controller
pub struct TaskController {
    db: DatabaseConnection,

    /// Cancellation tokens of claimed tasks, keyed by task id
    tokens: DashMap<String, CancellationToken>,
}

impl TaskController {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            tokens: DashMap::new(),
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Create a pending task with a fresh id
    pub async fn create_task(
        &self,
        kind: TaskKind,
        resource_ref: Option<&str>,
        input: Option<&serde_json::Value>,
    ) -> Result<TaskRecord> {
        let task_id = Uuid::new_v4().to_string();
        let input = input.map(serde_json::to_string).transpose()?;

        let task = TaskRepository::create(
            self.db.pool(),
            &task_id,
            kind.as_str(),
            resource_ref,
            input.as_deref(),
        )
        .await?;

        info!(task_id = %task.task_id, kind = %kind, "Task created");
        Ok(task)
    }

    /// Current snapshot of a task
    pub async fn get_task(&self, task_id: &str) -> Result<TaskRecord> {
        TaskRepository::get_by_task_id(self.db.pool(), task_id)
            .await?
            .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))
    }

    /// Tasks newest first, optionally filtered
    pub async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
        kind: Option<TaskKind>,
        limit: Option<i64>,
    ) -> Result<Vec<TaskRecord>> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 1000);
        Ok(TaskRepository::list(
            self.db.pool(),
            status.as_ref().map(TaskStatus::as_str),
            kind.as_ref().map(TaskKind::as_str),
            limit,
        )
        .await?)
    }

    /// Tasks tied to a domain object, newest first
    pub async fn list_by_resource(&self, resource_ref: &str) -> Result<Vec<TaskRecord>> {
        Ok(TaskRepository::list_by_resource(self.db.pool(), resource_ref).await?)
    }

    /// Move a pending task to running and hand out its cancellation token
    ///
    /// Exactly one caller wins the claim; every other caller gets
    /// `InvalidStateTransition`.
    pub async fn claim_task(&self, task_id: &str) -> Result<(TaskRecord, CancellationToken)> {
        let claimed = TaskRepository::transition(
            self.db.pool(),
            task_id,
            &[TaskStatus::Pending],
            TaskStatus::Running,
            Some(0),
            Some("task claimed"),
        )
        .await?;

        if !claimed {
            return Err(self.rejection(task_id, TaskStatus::Running).await);
        }

        let token = CancellationToken::new();
        self.tokens.insert(task_id.to_string(), token.clone());

        let task = self.get_task(task_id).await?;
        info!(task_id = %task_id, kind = %task.kind, "Task claimed");
        Ok((task, token))
    }

    /// Write status, progress and message in one conditional update
    ///
    /// Progress is clamped to 0..=100 and never moves backwards. Writing
    /// `Failed` through here records `message` as the error. A pending task
    /// cannot be moved to running here; that is [`Self::claim_task`]'s job.
    pub async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        progress: i64,
        message: &str,
    ) -> Result<()> {
        let progress = progress.clamp(0, 100);

        let updated = match status {
            TaskStatus::Failed => {
                TaskRepository::fail(self.db.pool(), task_id, message).await?
            }
            _ => {
                TaskRepository::transition(
                    self.db.pool(),
                    task_id,
                    &TaskStatus::sources_for(status),
                    status,
                    Some(progress),
                    Some(message),
                )
                .await?
            }
        };

        if !updated {
            return Err(self.rejection(task_id, status).await);
        }

        if status.is_terminal() {
            if let Some((_, token)) = self.tokens.remove(task_id) {
                if status == TaskStatus::Cancelled {
                    token.cancel();
                }
            }
        }

        debug!(task_id = %task_id, status = %status, progress, detail = message, "Task status updated");
        Ok(())
    }

    /// Complete a running task with its result payload
    pub async fn update_result(&self, task_id: &str, result: &serde_json::Value) -> Result<()> {
        let payload = serde_json::to_string(result)?;
        let completed =
            TaskRepository::complete(self.db.pool(), task_id, &payload, "completed").await?;

        if !completed {
            return Err(self.rejection(task_id, TaskStatus::Completed).await);
        }

        self.release(task_id);
        info!(task_id = %task_id, "Task completed");
        Ok(())
    }

    /// Record the domain object a running task produced
    pub async fn attach_resource(&self, task_id: &str, resource_ref: &str) -> Result<()> {
        let attached =
            TaskRepository::set_resource_ref(self.db.pool(), task_id, resource_ref).await?;

        if !attached {
            let task = self.get_task(task_id).await?;
            return Err(OrchestratorError::AlreadyFinished {
                task_id: task_id.to_string(),
                status: task.status()?,
            });
        }

        debug!(task_id = %task_id, resource_ref, "Resource attached to task");
        Ok(())
    }

    /// Fail a running task; progress keeps its last value
    pub async fn update_error(&self, task_id: &str, error: &str) -> Result<()> {
        let failed = TaskRepository::fail(self.db.pool(), task_id, error).await?;

        if !failed {
            return Err(self.rejection(task_id, TaskStatus::Failed).await);
        }

        self.release(task_id);
        warn!(task_id = %task_id, error, "Task failed");
        Ok(())
    }

    /// Cancel a pending or running task
    ///
    /// A running worker observes the cancellation at its next checkpoint.
    pub async fn cancel_task(&self, task_id: &str) -> Result<TaskRecord> {
        let cancelled = TaskRepository::transition(
            self.db.pool(),
            task_id,
            &[TaskStatus::Pending, TaskStatus::Running],
            TaskStatus::Cancelled,
            None,
            Some("cancelled by user"),
        )
        .await?;

        if !cancelled {
            let task = self.get_task(task_id).await?;
            let status = task.status()?;
            return Err(if status.is_terminal() {
                OrchestratorError::AlreadyFinished {
                    task_id: task_id.to_string(),
                    status,
                }
            } else {
                OrchestratorError::InvalidStateTransition {
                    from: status,
                    to: TaskStatus::Cancelled,
                }
            });
        }

        if let Some((_, token)) = self.tokens.remove(task_id) {
            token.cancel();
        }

        info!(task_id = %task_id, "Task cancelled");
        self.get_task(task_id).await
    }

    /// Whether the task has been cancelled, by token or by record
    pub async fn is_cancelled(&self, task_id: &str) -> Result<bool> {
        let task = self.get_task(task_id).await?;
        Ok(task.status()? == TaskStatus::Cancelled)
    }

    /// Drop the cancellation token of a task that stopped running
    pub fn release(&self, task_id: &str) {
        self.tokens.remove(task_id);
    }

    /// Number of tasks holding a live cancellation token
    pub fn active_count(&self) -> usize {
        self.tokens.len()
    }

    /// Stored task count for every status, zero-filled
    pub async fn status_counts(&self) -> Result<BTreeMap<String, i64>> {
        let mut counts = BTreeMap::new();
        for status in TaskStatus::ALL {
            let count = TaskRepository::count_by_status(self.db.pool(), status).await?;
            counts.insert(status.as_str().to_string(), count);
        }
        Ok(counts)
    }

    async fn rejection(&self, task_id: &str, to: TaskStatus) -> OrchestratorError {
        match self.get_task(task_id).await {
            Ok(task) => match task.status() {
                Ok(from) => OrchestratorError::InvalidStateTransition { from, to },
                Err(e) => e,
            },
            Err(e) => e,
        }
    }
}
