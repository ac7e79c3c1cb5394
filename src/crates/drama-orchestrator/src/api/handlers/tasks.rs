//! Generic task endpoint handlers
//!
//! Read and cancel tasks of any kind.

use axum::extract::{Path, Query, State};

use crate::api::{
    error::{ApiError, ApiResult},
    middleware::validation,
    models::{TaskListQuery, TaskResponse},
    response,
    routes::AppState,
};
use crate::execution::controller::DEFAULT_LIST_LIMIT;
use crate::{TaskKind, TaskStatus};

const MAX_LIST_LIMIT: i64 = 1000;

/// Get a single task
///
/// GET /api/v1/tasks/:task_id
pub async fn get_task(
    State(app_state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<impl axum::response::IntoResponse> {
    validation::validate_task_id(&task_id)?;

    let task = app_state.controller.get_task(&task_id).await?;
    Ok(response::ok(TaskResponse::from_record(task)))
}

/// List tasks, newest first
///
/// GET /api/v1/tasks?resource_id=..&status=..&kind=..&limit=..
pub async fn list_tasks(
    State(app_state): State<AppState>,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let tasks = match query.resource_id.as_deref() {
        Some(resource) => app_state.controller.list_by_resource(resource).await?,
        None => {
            let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
            validation::validate_limit(limit, MAX_LIST_LIMIT)?;

            let status = query
                .status
                .as_deref()
                .map(str::parse::<TaskStatus>)
                .transpose()
                .map_err(|e| ApiError::ValidationError(e.to_string()))?;
            let kind = query
                .kind
                .as_deref()
                .map(str::parse::<TaskKind>)
                .transpose()
                .map_err(|e| ApiError::ValidationError(e.to_string()))?;

            app_state
                .controller
                .list_tasks(status, kind, Some(limit))
                .await?
        }
    };

    let responses: Vec<TaskResponse> = tasks.into_iter().map(TaskResponse::from_record).collect();
    Ok(response::ok(responses))
}

/// Cancel a pending or running task
///
/// POST /api/v1/tasks/:task_id/cancel
pub async fn cancel_task(
    State(app_state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<impl axum::response::IntoResponse> {
    validation::validate_task_id(&task_id)?;

    let task = app_state.controller.cancel_task(&task_id).await?;
    Ok(response::ok(TaskResponse::from_record(task)))
}
