use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use alertpost_core::{AlertEvent, AlertHandler, HandlerConfig, TestOptions};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PostAlertRequest {
    pub handler: HandlerConfig,
    pub event: AlertEvent,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub message: String,
    pub id: String,
}

/// POST /api/v1/alerts
///
/// Delivery runs in the background; the response only says the alert was
/// accepted.
pub(super) async fn post_alert(
    State(state): State<AppState>,
    Json(body): Json<PostAlertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.handler.url.is_empty() && body.handler.endpoint.is_empty() {
        return Err(ApiError::BadRequest(
            "handler must specify url or endpoint".into(),
        ));
    }

    let handler = state.service.handler(body.handler);
    let id = body.event.id.clone();
    let event = body.event;
    tokio::spawn(async move {
        handler.handle(&event).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            message: "Alert accepted".into(),
            id,
        }),
    ))
}

/// GET /api/v1/test
pub(super) async fn test_options(State(state): State<AppState>) -> Json<TestOptions> {
    Json(state.service.test_options())
}

/// POST /api/v1/test
pub(super) async fn run_test(
    State(state): State<AppState>,
    Json(options): Json<TestOptions>,
) -> &'static str {
    state.service.test(&options);
    "ok"
}
