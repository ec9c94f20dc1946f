use axum::{
    extract::{Query, State},
    Json,
};
use retrieval_pipeline::QueryResult;
use serde::Deserialize;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub prompt: Option<String>,
}

pub async fn query_index(
    State(state): State<ApiState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<QueryResult>, ApiError> {
    let prompt = params
        .prompt
        .filter(|prompt| !prompt.trim().is_empty())
        .ok_or_else(|| ApiError::ValidationError("prompt is required".to_string()))?;

    info!(prompt_len = prompt.len(), "Received query");
    let result = state.knowledge.query(&prompt).await?;

    Ok(Json(result))
}
