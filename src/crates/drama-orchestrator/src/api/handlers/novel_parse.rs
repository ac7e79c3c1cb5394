//! Novel-parse endpoint handlers
//!
//! Upload a novel, start parsing it in the background, poll and cancel.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
};
use std::path::PathBuf;
use uuid::Uuid;

use crate::api::{
    error::{ApiError, ApiResult},
    middleware::validation,
    models::{NovelParseTaskResponse, TaskHandleResponse},
    response,
    routes::AppState,
};
use crate::config::StorageConfig;
use crate::db::models::TaskRecord;
use crate::document;
use crate::pipelines::NovelParseInput;
use crate::TaskKind;

#[derive(Default)]
struct UploadForm {
    file_name: Option<String>,
    bytes: Option<Vec<u8>>,
    drama_id: Option<i64>,
    title: Option<String>,
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

async fn read_form(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                form.file_name = field.file_name().map(str::to_string);
                form.bytes = Some(field.bytes().await.map_err(multipart_error)?.to_vec());
            }
            "drama_id" => {
                let text = field.text().await.map_err(multipart_error)?;
                let text = text.trim();
                if !text.is_empty() {
                    let id = text.parse::<i64>().map_err(|_| {
                        ApiError::ValidationError(format!("drama_id is not a number: {}", text))
                    })?;
                    // 0 and below mean "create a new drama"
                    form.drama_id = (id > 0).then_some(id);
                }
            }
            "title" => {
                let text = field.text().await.map_err(multipart_error)?;
                if !text.trim().is_empty() {
                    form.title = Some(text.trim().to_string());
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Write the upload under `<upload_dir>/novels/{uuid}_{unix}{ext}`
async fn store_upload(
    storage: &StorageConfig,
    file_name: &str,
    bytes: &[u8],
) -> ApiResult<PathBuf> {
    let dir = storage.novel_dir();
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ApiError::InternalError(format!("cannot create upload dir: {}", e)))?;

    let ext = document::extension_of(std::path::Path::new(file_name))
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    let stored_name = format!("{}_{}{}", Uuid::new_v4(), chrono::Utc::now().timestamp(), ext);
    let path = dir.join(stored_name);

    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| ApiError::InternalError(format!("cannot store upload: {}", e)))?;

    Ok(path)
}

/// Fetch a task and make sure it is a novel-parse task
async fn novel_task(app_state: &AppState, task_id: &str) -> ApiResult<TaskRecord> {
    validation::validate_task_id(task_id)?;

    let task = app_state.controller.get_task(task_id).await?;
    if task.kind()? != TaskKind::NovelParse {
        return Err(ApiError::NotFound(format!(
            "Novel-parse task not found: {}",
            task_id
        )));
    }
    Ok(task)
}

/// Upload a novel and create a pending parse task
///
/// POST /api/v1/novel-parse/tasks (multipart: file, drama_id?, title?)
pub async fn create_novel_parse_task(
    State(app_state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<impl axum::response::IntoResponse> {
    let form = read_form(multipart).await?;

    let bytes = form
        .bytes
        .ok_or_else(|| ApiError::BadRequest("missing multipart field: file".to_string()))?;
    let file_name = form
        .file_name
        .ok_or_else(|| ApiError::BadRequest("uploaded file has no name".to_string()))?;

    validation::validate_upload_name(&file_name)?;
    validation::validate_upload_size(bytes.len(), app_state.storage.max_upload_bytes)?;

    let path = store_upload(&app_state.storage, &file_name, &bytes).await?;

    let input = NovelParseInput {
        file_path: path.to_string_lossy().into_owned(),
        file_name,
        drama_id: form.drama_id,
        title: form.title,
    };
    let input = serde_json::to_value(&input).map_err(|e| ApiError::InternalError(e.to_string()))?;

    let task = app_state
        .controller
        .create_task(TaskKind::NovelParse, None, Some(&input))
        .await?;

    tracing::info!(task_id = %task.task_id, path = %path.display(), "Novel uploaded");
    Ok(response::created(TaskHandleResponse::from_record(&task)))
}

/// Queue a pending parse task; returns immediately
///
/// POST /api/v1/novel-parse/tasks/:task_id/start
pub async fn start_novel_parse_task(
    State(app_state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let task = novel_task(&app_state, &task_id).await?;
    if task.status != crate::TaskStatus::Pending.as_str() {
        return Err(ApiError::Conflict(format!(
            "Task {} is {} and cannot be started",
            task_id, task.status
        )));
    }

    app_state.scheduler.submit(&task_id)?;
    Ok(response::accepted(TaskHandleResponse::from_record(&task)))
}

/// Poll a parse task
///
/// GET /api/v1/novel-parse/tasks/:task_id
pub async fn get_novel_parse_task(
    State(app_state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let task = novel_task(&app_state, &task_id).await?;
    Ok(response::ok(NovelParseTaskResponse::from_record(task)))
}

/// Cancel a parse task
///
/// POST /api/v1/novel-parse/tasks/:task_id/cancel
pub async fn cancel_novel_parse_task(
    State(app_state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<impl axum::response::IntoResponse> {
    novel_task(&app_state, &task_id).await?;
    let task = app_state.controller.cancel_task(&task_id).await?;
    Ok(response::ok(NovelParseTaskResponse::from_record(task)))
}
