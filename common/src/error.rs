use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing source documents: {0}")]
    MissingSource(String),
    #[error("Corrupt index store: {0}")]
    CorruptStore(String),
    #[error("Missing credential: {0}")]
    MissingCredential(String),
    #[error("Upstream query error: {0}")]
    UpstreamQuery(String),
    #[error("Index unavailable: {0}")]
    IndexUnavailable(Box<AppError>),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Storage error: {0}")]
    Storage(#[from] object_store::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Wraps an index acquisition failure, without nesting an existing umbrella error.
    pub fn index_unavailable(cause: AppError) -> Self {
        match cause {
            Self::IndexUnavailable(_) => cause,
            other => Self::IndexUnavailable(Box::new(other)),
        }
    }

    /// Stable, machine-readable label for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingSource(_) => "missing_source",
            Self::CorruptStore(_) => "corrupt_store",
            Self::MissingCredential(_) => "missing_credential",
            Self::UpstreamQuery(_) => "upstream_query",
            Self::IndexUnavailable(_) => "index_unavailable",
            Self::Validation(_) => "validation",
            _ => "internal",
        }
    }
}
