//! Health check endpoint handler

use axum::{extract::State, http::StatusCode, Json};
use std::collections::BTreeMap;

use crate::api::{models::HealthResponse, routes::AppState};

/// Handler for GET /health
///
/// Reports database connectivity, the number of running tasks and the
/// stored task count per status.
pub async fn health(State(app_state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let active = app_state.controller.active_count();
    let checked = match app_state.db.health_check().await {
        Ok(()) => app_state.controller.status_counts().await,
        Err(e) => Err(e.into()),
    };

    match checked {
        Ok(counts) => (
            StatusCode::OK,
            Json(HealthResponse::new(
                "ok",
                &app_state.server_name,
                "connected",
                active,
                counts,
            )),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::new(
                    "error",
                    &app_state.server_name,
                    "error",
                    active,
                    BTreeMap::new(),
                )),
            )
        }
    }
}
