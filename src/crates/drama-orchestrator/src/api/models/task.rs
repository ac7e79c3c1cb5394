//! Task API models

use serde::{Deserialize, Serialize};

use crate::db::models::TaskRecord;

/// Task as returned by the generic task endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task_id: String,
    pub kind: String,
    pub status: String,
    pub progress: i64,
    pub message: Option<String>,
    pub error_message: Option<String>,
    pub resource_ref: Option<String>,

    /// Pipeline result, present once completed
    pub result: Option<serde_json::Value>,

    pub created_at: String,
    pub updated_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl TaskResponse {
    pub fn from_record(task: TaskRecord) -> Self {
        // a corrupt result column degrades to null instead of failing the read
        let result = task.result_json().ok().flatten();
        Self {
            task_id: task.task_id,
            kind: task.kind,
            status: task.status,
            progress: task.progress,
            message: task.message,
            error_message: task.error_message,
            resource_ref: task.resource_ref,
            result,
            created_at: task.created_at,
            updated_at: task.updated_at,
            started_at: task.started_at,
            completed_at: task.completed_at,
        }
    }
}

/// Query parameters for `GET /api/v1/tasks`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskListQuery {
    /// Exact resource reference, e.g. `episode:12`
    pub resource_id: Option<String>,
    pub status: Option<String>,
    pub kind: Option<String>,
    pub limit: Option<i64>,
}

/// Minimal task handle returned when work is created or queued
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskHandleResponse {
    pub task_id: String,
    pub status: String,
    pub progress: i64,
    pub message: Option<String>,
}

impl TaskHandleResponse {
    pub fn from_record(task: &TaskRecord) -> Self {
        Self {
            task_id: task.task_id.clone(),
            status: task.status.clone(),
            progress: task.progress,
            message: task.message.clone(),
        }
    }
}
