use common::{
    error::AppError,
    utils::config::{AppConfig, OPENAI_API_KEY_VAR},
};
use ingestion_pipeline::source_is_ready;
use tracing::{info, warn};

/// Checks the environment the service needs before anything else is constructed.
///
/// The persist directory is created when absent. A missing or empty source directory is created
/// too, but still fails startup since there is nothing to index.
pub async fn validate_startup(config: &AppConfig) -> Result<(), AppError> {
    let persist_dir = config.persist_path();
    if !tokio::fs::try_exists(&persist_dir).await? {
        info!(path = %persist_dir.display(), "Creating persist directory");
        tokio::fs::create_dir_all(&persist_dir).await?;
    }

    let source_dir = config.source_dir();
    if !source_is_ready(&source_dir).await? {
        tokio::fs::create_dir_all(&source_dir).await?;
        warn!(path = %source_dir.display(), "Data directory is empty");
        return Err(AppError::MissingSource(format!(
            "Data directory {} is empty, please add documents to the directory",
            source_dir.display()
        )));
    }

    if config.api_key().is_none() {
        return Err(AppError::MissingCredential(format!(
            "API key not found, please set the environment variable {OPENAI_API_KEY_VAR}"
        )));
    }

    Ok(())
}
