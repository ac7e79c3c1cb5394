//! Background task engine for turning novels into short-drama production plans
//!
//! A caller creates a task record, triggers it, and polls it. The engine claims
//! the task, runs the pipeline registered for its kind (prepare, generate,
//! persist), drives the text-generation collaborator through retried and
//! continued rounds, and carves structured payloads out of free-form model
//! output.

pub mod api;
pub mod config;
pub mod db;
pub mod document;
pub mod execution;
pub mod executor;
pub mod llm;
pub mod pipelines;

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

pub use execution::{
    Phase, Pipeline, PipelineContext, PipelineOutcome, SchedulerConfig, TaskController,
    TaskExecutionEngine, TaskScheduler,
};

/// Errors that can occur while managing or executing tasks
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Source document could not be read or decoded
    #[error("File read failed: {0}")]
    FileRead(String),

    /// Source document has an extension no parser handles
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Text-generation collaborator failed
    #[error("AI invocation failed: {0}")]
    AiInvocation(String),

    /// Model output did not contain a usable structured payload
    #[error("Extraction failed: {message}")]
    Extraction {
        message: String,
        /// Offending slice of the model output, kept for diagnostics
        payload: Option<String>,
    },

    /// Durable write or read failed
    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// Unknown task id
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Domain object referenced by a task does not exist
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Cancel attempted on a task in a terminal state
    #[error("Task {task_id} already finished with status {status}")]
    AlreadyFinished { task_id: String, status: TaskStatus },

    /// Transition outside the task state graph
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: TaskStatus, to: TaskStatus },

    /// Collaborator kept asking for more rounds
    #[error("Continuation limit of {0} rounds exceeded")]
    ContinuationLimitExceeded(u32),

    /// Task was cancelled while running
    #[error("Task was cancelled")]
    Cancelled,

    /// Scheduler queue has no room for another task
    #[error("Task queue is full (capacity {0})")]
    QueueFull(usize),

    /// Scheduler no longer accepts work
    #[error("Task scheduler is shutting down")]
    ShuttingDown,

    /// Invalid input supplied by a caller
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrchestratorError {
    /// Build an extraction error that keeps the offending text
    pub fn extraction(message: impl Into<String>, payload: Option<&str>) -> Self {
        OrchestratorError::Extraction {
            message: message.into(),
            payload: payload.map(str::to_string),
        }
    }

    /// Whether the round driver may retry after this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OrchestratorError::AiInvocation(_) | OrchestratorError::Extraction { .. }
        )
    }

    /// Stable identifier for logs and API error codes
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorError::FileRead(_) => "file_read",
            OrchestratorError::UnsupportedFormat(_) => "unsupported_format",
            OrchestratorError::AiInvocation(_) => "ai_invocation",
            OrchestratorError::Extraction { .. } => "extraction",
            OrchestratorError::Persistence(_) => "persistence",
            OrchestratorError::TaskNotFound(_) => "task_not_found",
            OrchestratorError::ResourceNotFound(_) => "resource_not_found",
            OrchestratorError::AlreadyFinished { .. } => "already_finished",
            OrchestratorError::InvalidStateTransition { .. } => "task_state",
            OrchestratorError::ContinuationLimitExceeded(_) => "continuation_limit_exceeded",
            OrchestratorError::Cancelled => "cancelled",
            OrchestratorError::QueueFull(_) => "queue_full",
            OrchestratorError::ShuttingDown => "shutting_down",
            OrchestratorError::Validation(_) => "validation",
            OrchestratorError::Config(_) => "config",
            OrchestratorError::Serialization(_) => "serialization",
        }
    }
}

impl From<db::DatabaseError> for OrchestratorError {
    fn from(err: db::DatabaseError) -> Self {
        OrchestratorError::Persistence(err.to_string())
    }
}

impl From<sqlx::Error> for OrchestratorError {
    fn from(err: sqlx::Error) -> Self {
        OrchestratorError::from(db::DatabaseError::from(err))
    }
}

/// Result type for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Task execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created, waiting to be started
    Pending,
    /// Claimed by a worker
    Running,
    /// Finished with a result
    Completed,
    /// Finished with an error message
    Failed,
    /// Stopped by a caller
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];

    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states accept no further mutation
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Whether `self -> next` is an edge of the state graph
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Cancelled)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::Cancelled)
        )
    }

    /// States from which a status update may write `target`: graph
    /// predecessors, plus `target` itself when it is non-terminal
    /// (progress/message refresh).
    ///
    /// `pending -> running` is left out; only the claim takes that edge.
    pub fn sources_for(target: TaskStatus) -> Vec<TaskStatus> {
        TaskStatus::ALL
            .into_iter()
            .filter(|from| {
                let claim_edge = *from == TaskStatus::Pending && target == TaskStatus::Running;
                !claim_edge
                    && (from.can_transition_to(target)
                        || (*from == target && !target.is_terminal()))
            })
            .collect()
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(OrchestratorError::Validation(format!(
                "Unknown task status: {}",
                other
            ))),
        }
    }
}

/// Which pipeline a task runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Novel document to drama episodes
    NovelParse,
    /// Episode script to scene backgrounds
    BackgroundExtraction,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::NovelParse => "novel_parse",
            TaskKind::BackgroundExtraction => "background_extraction",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "novel_parse" => Ok(TaskKind::NovelParse),
            "background_extraction" => Ok(TaskKind::BackgroundExtraction),
            other => Err(OrchestratorError::Validation(format!(
                "Unknown task kind: {}",
                other
            ))),
        }
    }
}

/// Get version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
