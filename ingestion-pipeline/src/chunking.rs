use common::{
    error::AppError,
    storage::types::{document::Document, text_chunk::TextChunk},
    utils::config::AppConfig,
};
use text_splitter::{ChunkCapacity, ChunkConfig, MarkdownSplitter, TextSplitter};

/// Character bounds used when splitting documents into passages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub min_chars: usize,
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl ChunkingConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            min_chars: config.chunk_min_chars,
            max_chars: config.chunk_max_chars,
            overlap_chars: config.chunk_overlap_chars,
        }
    }

    fn to_chunk_config(self) -> Result<ChunkConfig<text_splitter::Characters>, AppError> {
        if self.min_chars == 0 || self.max_chars == 0 || self.min_chars > self.max_chars {
            return Err(AppError::Validation(
                "invalid chunk bounds; ensure 0 < min <= max".into(),
            ));
        }

        if self.overlap_chars >= self.min_chars {
            return Err(AppError::Validation(format!(
                "chunk_min_chars must be greater than the configured overlap of {}",
                self.overlap_chars
            )));
        }

        let chunk_capacity = ChunkCapacity::new(self.min_chars)
            .with_max(self.max_chars)
            .map_err(|e| AppError::Validation(format!("invalid chunk bounds: {e}")))?;

        ChunkConfig::new(chunk_capacity)
            .with_overlap(self.overlap_chars)
            .map_err(|e| AppError::Validation(format!("invalid chunk overlap: {e}")))
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Splits a document into passages; markdown documents are split along their structure.
pub fn split_document(
    document: &Document,
    config: &ChunkingConfig,
) -> Result<Vec<TextChunk>, AppError> {
    let chunk_config = config.to_chunk_config()?;

    let pieces: Vec<String> = if document.is_markdown() {
        MarkdownSplitter::new(chunk_config)
            .chunks(&document.text)
            .map(str::to_owned)
            .collect()
    } else {
        TextSplitter::new(chunk_config)
            .chunks(&document.text)
            .map(str::to_owned)
            .collect()
    };

    Ok(pieces
        .into_iter()
        .filter(|piece| !piece.trim().is_empty())
        .map(|piece| TextChunk::new(document.id.clone(), document.file_name.clone(), piece))
        .collect())
}
