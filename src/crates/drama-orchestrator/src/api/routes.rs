//! API route definitions

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::{handlers, middleware};
use crate::config::StorageConfig;
use crate::db::{DatabaseConnection, DramaStore};
use crate::execution::{TaskController, TaskScheduler};

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub controller: Arc<TaskController>,
    pub scheduler: Arc<TaskScheduler>,
    pub store: Arc<dyn DramaStore>,
    pub storage: StorageConfig,
    pub server_name: String,
}

/// Build the complete API router
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.storage.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(handlers::health))
        // Novel parsing
        .route(
            "/api/v1/novel-parse/tasks",
            post(handlers::create_novel_parse_task).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/v1/novel-parse/tasks/:task_id",
            get(handlers::get_novel_parse_task),
        )
        .route(
            "/api/v1/novel-parse/tasks/:task_id/start",
            post(handlers::start_novel_parse_task),
        )
        .route(
            "/api/v1/novel-parse/tasks/:task_id/cancel",
            post(handlers::cancel_novel_parse_task),
        )
        // Scene backgrounds
        .route(
            "/api/v1/episodes/:episode_id/backgrounds/extract",
            post(handlers::extract_backgrounds),
        )
        // Generic task endpoints
        .route("/api/v1/tasks", get(handlers::list_tasks))
        .route("/api/v1/tasks/:task_id", get(handlers::get_task))
        .route("/api/v1/tasks/:task_id/cancel", post(handlers::cancel_task))
        .layer(middleware::logging_layer())
        .with_state(state)
}

/// Router with CORS for the configured origins
pub fn create_router_with_cors(state: AppState, allowed_origins: &[String]) -> Router {
    let cors = if allowed_origins.is_empty() {
        middleware::cors_layer()
    } else {
        let origins: Vec<&str> = allowed_origins.iter().map(String::as_str).collect();
        middleware::cors_layer_restricted(&origins)
    };
    create_router(state).layer(cors)
}
