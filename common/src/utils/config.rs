use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::utils::{completion::CompletionBackend, embedding::EmbeddingBackend};

/// Name of the environment variable carrying the upstream API key.
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_texts_data_path")]
    pub texts_data_path: String,
    #[serde(default = "default_persist_dir")]
    pub persist_dir: String,
    #[serde(default)]
    pub embedding_backend: EmbeddingBackend,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default)]
    pub completion_backend: CompletionBackend,
    #[serde(default = "default_query_model")]
    pub query_model: String,
    #[serde(default = "default_similarity_top_k")]
    pub similarity_top_k: usize,
    #[serde(default = "default_chunk_min_chars")]
    pub chunk_min_chars: usize,
    #[serde(default = "default_chunk_max_chars")]
    pub chunk_max_chars: usize,
    #[serde(default = "default_chunk_overlap_chars")]
    pub chunk_overlap_chars: usize,
    #[serde(default)]
    pub log_verbose: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: default_base_url(),
            host: default_host(),
            http_port: default_http_port(),
            texts_data_path: default_texts_data_path(),
            persist_dir: default_persist_dir(),
            embedding_backend: EmbeddingBackend::default(),
            embedding_model: None,
            embedding_dimensions: default_embedding_dimensions(),
            completion_backend: CompletionBackend::default(),
            query_model: default_query_model(),
            similarity_top_k: default_similarity_top_k(),
            chunk_min_chars: default_chunk_min_chars(),
            chunk_max_chars: default_chunk_max_chars(),
            chunk_overlap_chars: default_chunk_overlap_chars(),
            log_verbose: false,
        }
    }
}

impl AppConfig {
    /// Directory holding the raw documents to index.
    pub fn source_dir(&self) -> PathBuf {
        resolve_dir(&self.texts_data_path)
    }

    /// Directory holding the persisted index.
    pub fn persist_path(&self) -> PathBuf {
        resolve_dir(&self.persist_dir)
    }

    /// The API key, if one is configured and not blank.
    pub fn api_key(&self) -> Option<&str> {
        self.openai_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_texts_data_path() -> String {
    "backend/knowledge_base".to_string()
}

fn default_persist_dir() -> String {
    "backend/persist".to_string()
}

fn default_embedding_dimensions() -> u32 {
    1536
}

fn default_query_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_similarity_top_k() -> usize {
    2
}

fn default_chunk_min_chars() -> usize {
    500
}

fn default_chunk_max_chars() -> usize {
    2000
}

fn default_chunk_overlap_chars() -> usize {
    100
}

/// Resolves relative paths against the current working directory.
pub fn resolve_dir(path: &str) -> PathBuf {
    let candidate = PathBuf::from(path);
    if candidate.is_absolute() {
        candidate
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(candidate)
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
