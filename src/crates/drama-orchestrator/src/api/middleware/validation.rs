//! Request validation helpers

use crate::api::error::{ApiError, ApiResult};
use crate::document;
use std::path::Path;

/// Task ids are UUID strings
pub fn validate_task_id(value: &str) -> ApiResult<uuid::Uuid> {
    uuid::Uuid::parse_str(value)
        .map_err(|_| ApiError::ValidationError(format!("Invalid task id: {}", value)))
}

/// Upload name must carry an extension a document parser handles
pub fn validate_upload_name(file_name: &str) -> ApiResult<()> {
    if file_name.trim().is_empty() {
        return Err(ApiError::ValidationError("file name cannot be empty".to_string()));
    }
    if !document::is_supported(Path::new(file_name)) {
        return Err(ApiError::ValidationError(format!(
            "unsupported file format, expected one of: {}",
            document::SUPPORTED_FORMATS.join(", ")
        )));
    }
    Ok(())
}

/// Upload must be non-empty and within the configured limit
pub fn validate_upload_size(len: usize, max: usize) -> ApiResult<()> {
    if len == 0 {
        return Err(ApiError::ValidationError("uploaded file is empty".to_string()));
    }
    if len > max {
        return Err(ApiError::PayloadTooLarge(format!(
            "file is {} bytes, limit is {} bytes",
            len, max
        )));
    }
    Ok(())
}

/// List limits accepted by task listing
pub fn validate_limit(limit: i64, max: i64) -> ApiResult<()> {
    if limit <= 0 {
        return Err(ApiError::ValidationError("limit must be greater than 0".to_string()));
    }
    if limit > max {
        return Err(ApiError::ValidationError(format!("limit cannot exceed {}", max)));
    }
    Ok(())
}
