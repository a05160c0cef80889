use axum::{extract::State, http::StatusCode, Json};
use serde_json::Value;

use crate::server::config::AppState;
use crate::server::services::qa::types::QaResponse;

/// `POST /qa`: runs the full pipeline and maps the envelope onto an HTTP
/// status (200 for success envelopes, 400 otherwise).
pub async fn handle_qa(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<QaResponse>) {
    let response = state.controller.handle_request(&body).await;
    let status = if response.is_success() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(response))
}

pub async fn health() -> &'static str {
    "OK"
}
