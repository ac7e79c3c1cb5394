//! Task model for database persistence

use crate::{OrchestratorError, Result, TaskKind, TaskStatus};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Durable record of one long-running operation
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskRecord {
    /// Row id, internal only
    #[serde(skip)]
    pub id: i64,

    /// Externally visible identifier (UUID string)
    pub task_id: String,

    /// Pipeline kind, e.g. "novel_parse"
    pub kind: String,

    /// Domain object this task produced or operates on
    pub resource_ref: Option<String>,

    /// pending, running, completed, failed, cancelled
    pub status: String,

    /// 0..=100, never decreases while running
    pub progress: i64,

    /// Latest human-readable progress message
    pub message: Option<String>,

    /// Set only when status is failed
    pub error_message: Option<String>,

    /// Pipeline input as a JSON string
    pub input: Option<String>,

    /// Pipeline result as a JSON string, set only when completed
    pub result: Option<String>,

    pub created_at: String,
    pub updated_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl TaskRecord {
    /// Parsed status
    pub fn status(&self) -> Result<TaskStatus> {
        self.status.parse()
    }

    /// Parsed kind
    pub fn kind(&self) -> Result<TaskKind> {
        self.kind.parse()
    }

    /// Whether the task reached a terminal state
    pub fn is_finished(&self) -> bool {
        self.status().map(|s| s.is_terminal()).unwrap_or(false)
    }

    /// Decode the stored input payload
    pub fn input_json(&self) -> Result<Option<serde_json::Value>> {
        self.input
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(OrchestratorError::from)
    }

    /// Decode the stored result payload
    pub fn result_json(&self) -> Result<Option<serde_json::Value>> {
        self.result
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(OrchestratorError::from)
    }
}
