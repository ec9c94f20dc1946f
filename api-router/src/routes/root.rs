use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::api_state::ApiState;

pub const WELCOME_MESSAGE: &str = "Welcome to the Chain Texts Service";

/// Root endpoint: greeting plus the state of the index.
pub async fn root(State(state): State<ApiState>) -> Json<Value> {
    let status = state.knowledge.status().await;
    Json(json!({
        "message": WELCOME_MESSAGE,
        "index": status,
    }))
}
