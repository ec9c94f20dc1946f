use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{store::IndexStore, types::document::Document},
};
use serde_json::{Map, Value};

/// Answer produced by an [`Indexer`] for a single prompt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryAnswer {
    pub text: String,
    /// Extra fields forwarded to callers untouched.
    pub extra: Map<String, Value>,
}

impl QueryAnswer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            extra: Map::new(),
        }
    }
}

/// The retrieval engine driven by the lifecycle manager.
///
/// Implementations own the index format entirely: they decide what a built index looks like in
/// memory and which objects it writes to the [`IndexStore`].
#[async_trait]
pub trait Indexer: Send + Sync + 'static {
    type Index: Send + Sync + 'static;

    /// Builds a fresh index from the given documents.
    async fn build_from_documents(&self, documents: Vec<Document>) -> Result<Self::Index, AppError>;

    /// Writes the durable representation of `index` into `store`.
    async fn persist(&self, index: &Self::Index, store: &IndexStore) -> Result<(), AppError>;

    /// Reconstructs an index from `store` alone. Unreadable contents yield
    /// [`AppError::CorruptStore`].
    async fn restore_from_store(&self, store: &IndexStore) -> Result<Self::Index, AppError>;

    /// Retrieves context for `prompt` from `index` and generates an answer.
    async fn query(&self, index: &Self::Index, prompt: &str) -> Result<QueryAnswer, AppError>;
}
