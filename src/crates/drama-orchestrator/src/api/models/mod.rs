//! API data transfer objects

pub mod novel;
pub mod task;

pub use novel::NovelParseTaskResponse;
pub use task::{TaskHandleResponse, TaskListQuery, TaskResponse};

use std::collections::BTreeMap;

/// Health check response
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    /// "ok" or "error"
    pub status: String,

    /// Server name from configuration
    pub name: String,

    /// "connected" or "error"
    pub database: String,

    /// Tasks currently held by workers
    pub active_tasks: usize,

    /// Stored tasks per status; empty when the database is unreachable
    pub tasks: BTreeMap<String, i64>,

    pub version: String,
    pub timestamp: String,
}

impl HealthResponse {
    pub fn new(
        status: impl Into<String>,
        name: impl Into<String>,
        database: impl Into<String>,
        active_tasks: usize,
        tasks: BTreeMap<String, i64>,
    ) -> Self {
        Self {
            status: status.into(),
            name: name.into(),
            database: database.into(),
            active_tasks,
            tasks,
            version: crate::version().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
