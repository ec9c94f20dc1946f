use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Health check: always returns 200 while the process is serving.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "UP"})))
}
