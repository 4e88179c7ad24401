use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use alertpost_core::{EndpointConfig, UpdateMode};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub message: String,
    pub applied: usize,
    pub endpoints: Vec<EndpointConfig>,
}

/// GET /api/v1/endpoints
pub(super) async fn list_endpoints(State(state): State<AppState>) -> Json<Vec<EndpointConfig>> {
    let endpoints = state.service.registry().list().await;
    Json(endpoints.iter().map(EndpointConfig::redacted).collect())
}

/// GET /api/v1/endpoints/:name
pub(super) async fn get_endpoint(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<EndpointConfig>, ApiError> {
    state
        .service
        .registry()
        .lookup(&name)
        .await
        .map(|c| Json(c.redacted()))
        .ok_or_else(|| ApiError::NotFound(format!("Endpoint {} not found", name)))
}

/// PUT /api/v1/endpoints
pub(super) async fn replace_endpoints(
    State(state): State<AppState>,
    Json(records): Json<Vec<serde_json::Value>>,
) -> Result<Json<UpdateResponse>, ApiError> {
    apply(&state, UpdateMode::Replace, records).await
}

/// PATCH /api/v1/endpoints
pub(super) async fn merge_endpoints(
    State(state): State<AppState>,
    Json(records): Json<Vec<serde_json::Value>>,
) -> Result<Json<UpdateResponse>, ApiError> {
    apply(&state, UpdateMode::Merge, records).await
}

async fn apply(
    state: &AppState,
    mode: UpdateMode,
    records: Vec<serde_json::Value>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let applied = state.service.update(mode, records).await?;
    let endpoints = state.service.registry().list().await;

    Ok(Json(UpdateResponse {
        message: match mode {
            UpdateMode::Replace => "Endpoints replaced".into(),
            UpdateMode::Merge => "Endpoints merged".into(),
        },
        applied,
        endpoints: endpoints.iter().map(EndpointConfig::redacted).collect(),
    }))
}
