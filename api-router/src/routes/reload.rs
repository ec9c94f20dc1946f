use axum::{
    extract::{Query, State},
    Json,
};
use retrieval_pipeline::ReloadResult;
use serde::Deserialize;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ReloadParams {
    pub test_prompt: Option<String>,
}

/// Rebuilds the index from the source directory, optionally verifying it with a test prompt.
pub async fn reload_index(
    State(state): State<ApiState>,
    Query(params): Query<ReloadParams>,
) -> Result<Json<ReloadResult>, ApiError> {
    info!(
        with_test_prompt = params.test_prompt.is_some(),
        "Reloading index"
    );
    let result = state
        .knowledge
        .reload(params.test_prompt.as_deref())
        .await?;

    Ok(Json(result))
}
