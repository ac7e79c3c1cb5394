//! Scene background extraction handler

use axum::extract::{Path, State};

use crate::api::{
    error::{ApiError, ApiResult},
    models::TaskHandleResponse,
    response,
    routes::AppState,
};
use crate::pipelines::background::{episode_ref, BackgroundInput};
use crate::TaskKind;

/// Create and queue a background-extraction task for an episode
///
/// POST /api/v1/episodes/:episode_id/backgrounds/extract
pub async fn extract_backgrounds(
    State(app_state): State<AppState>,
    Path(episode_id): Path<i64>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let episode = app_state
        .store
        .get_episode(episode_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Episode not found: {}", episode_id)))?;

    if episode
        .script_content
        .as_deref()
        .map_or(true, |s| s.trim().is_empty())
    {
        return Err(ApiError::ValidationError(format!(
            "Episode {} has no script to extract backgrounds from",
            episode_id
        )));
    }

    let input = serde_json::to_value(BackgroundInput { episode_id })
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    let resource = episode_ref(episode_id);
    let task = app_state
        .controller
        .create_task(TaskKind::BackgroundExtraction, Some(&resource), Some(&input))
        .await?;

    if let Err(e) = app_state.scheduler.submit(&task.task_id) {
        // a task that never got queued must not linger as pending
        if let Err(cancel_err) = app_state.controller.cancel_task(&task.task_id).await {
            tracing::warn!(task_id = %task.task_id, error = %cancel_err, "Could not cancel unqueued task");
        }
        return Err(ApiError::from(e));
    }

    tracing::info!(task_id = %task.task_id, episode_id, "Background extraction queued");
    Ok(response::accepted(TaskHandleResponse::from_record(&task)))
}
