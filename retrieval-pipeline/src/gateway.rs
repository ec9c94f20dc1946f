use std::sync::Arc;

use async_trait::async_trait;
use common::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::{
    indexer::Indexer,
    lifecycle::{IndexLifecycle, IndexStatus},
};

pub const RELOADED_MESSAGE: &str = "Index reloaded";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub prompt: String,
    pub response: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReloadResult {
    pub message: String,
    /// Always serialized; `null` when no test prompt was given.
    pub query: Option<QueryResult>,
}

/// Everything the HTTP layer needs from the knowledge base.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn query(&self, prompt: &str) -> Result<QueryResult, AppError>;

    /// Rebuilds the index, then optionally verifies it with `test_prompt`.
    async fn reload(&self, test_prompt: Option<&str>) -> Result<ReloadResult, AppError>;

    async fn status(&self) -> IndexStatus;
}

/// Answers prompts against whatever index the lifecycle manager currently holds.
pub struct QueryGateway<I: Indexer> {
    lifecycle: Arc<IndexLifecycle<I>>,
}

impl<I: Indexer> QueryGateway<I> {
    pub fn new(lifecycle: Arc<IndexLifecycle<I>>) -> Self {
        Self { lifecycle }
    }

    pub fn lifecycle(&self) -> &Arc<IndexLifecycle<I>> {
        &self.lifecycle
    }

    #[instrument(skip(self))]
    pub async fn query(&self, prompt: &str) -> Result<QueryResult, AppError> {
        let index = self
            .lifecycle
            .get_index()
            .await
            .map_err(AppError::index_unavailable)?;

        let answer = self
            .lifecycle
            .indexer()
            .query(&index, prompt)
            .await
            .map_err(|err| match err {
                AppError::UpstreamQuery(_) => err,
                other => AppError::UpstreamQuery(other.to_string()),
            })?;
        debug!(answer_len = answer.text.len(), "Query answered");

        Ok(QueryResult {
            prompt: prompt.to_string(),
            response: answer.text,
            extra: answer.extra,
        })
    }

    pub async fn reload(&self, test_prompt: Option<&str>) -> Result<ReloadResult, AppError> {
        self.lifecycle.reload().await?;

        let query = match test_prompt.filter(|prompt| !prompt.is_empty()) {
            Some(prompt) => Some(self.query(prompt).await?),
            None => None,
        };

        Ok(ReloadResult {
            message: RELOADED_MESSAGE.to_string(),
            query,
        })
    }
}

#[async_trait]
impl<I: Indexer> KnowledgeBase for QueryGateway<I> {
    async fn query(&self, prompt: &str) -> Result<QueryResult, AppError> {
        QueryGateway::query(self, prompt).await
    }

    async fn reload(&self, test_prompt: Option<&str>) -> Result<ReloadResult, AppError> {
        QueryGateway::reload(self, test_prompt).await
    }

    async fn status(&self) -> IndexStatus {
        self.lifecycle.status().await
    }
}
