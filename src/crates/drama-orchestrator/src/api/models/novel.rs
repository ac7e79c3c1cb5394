//! Novel-parse API models

use serde::{Deserialize, Serialize};

use crate::db::models::TaskRecord;

/// Status of a novel-parse task with its summary fields lifted out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NovelParseTaskResponse {
    pub task_id: String,
    pub status: String,
    pub progress: i64,
    pub message: Option<String>,
    pub error_message: Option<String>,
    pub drama_id: Option<i64>,
    pub total_episodes: i64,
    pub created_episodes: i64,
}

impl NovelParseTaskResponse {
    pub fn from_record(task: TaskRecord) -> Self {
        let result = task.result_json().ok().flatten();
        let field = |name: &str| result.as_ref().and_then(|r| r.get(name)).and_then(|v| v.as_i64());

        // drama_id may also be known from the input before completion
        let drama_id = field("drama_id").or_else(|| {
            task.input_json()
                .ok()
                .flatten()
                .and_then(|input| input.get("drama_id").and_then(|v| v.as_i64()))
        });

        Self {
            drama_id,
            total_episodes: field("total_episodes").unwrap_or(0),
            created_episodes: field("created_episodes").unwrap_or(0),
            task_id: task.task_id,
            status: task.status,
            progress: task.progress,
            message: task.message,
            error_message: task.error_message,
        }
    }
}
