use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use common::{
    error::AppError,
    storage::{
        store::IndexStore,
        types::{document::Document, text_chunk::TextChunk},
    },
    utils::{
        completion::{CompletionProvider, ContextPassage},
        config::AppConfig,
        embedding::{cosine_similarity, EmbeddingProvider},
    },
};
use ingestion_pipeline::{split_document, ChunkingConfig};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map};
use tracing::{debug, info};
use uuid::Uuid;

use crate::indexer::{Indexer, QueryAnswer};

pub const DOCSTORE_FILE: &str = "docstore.json";
pub const VECTOR_STORE_FILE: &str = "vector_store.json";
pub const INDEX_STORE_FILE: &str = "index_store.json";

const FORMAT_VERSION: u32 = 1;
const EMBED_BATCH_SIZE: usize = 64;

/// Describes a persisted index and the embedding space it lives in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexMetadata {
    pub format_version: u32,
    pub index_id: String,
    pub embedding_backend: String,
    pub embedding_model: Option<String>,
    pub dimension: usize,
    pub document_count: usize,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DocStore {
    chunks: Vec<TextChunk>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VectorStore {
    embeddings: BTreeMap<String, Vec<f32>>,
}

#[derive(Debug, Clone)]
struct IndexedChunk {
    chunk: TextChunk,
    embedding: Vec<f32>,
}

/// In-memory chunk/embedding index built by [`VectorIndexer`].
#[derive(Debug, Clone)]
pub struct VectorIndex {
    metadata: IndexMetadata,
    entries: Vec<IndexedChunk>,
}

impl VectorIndex {
    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Chunks ranked by similarity to `query_embedding`, best first.
    fn top_k(&self, query_embedding: &[f32], k: usize) -> Vec<(&IndexedChunk, f32)> {
        let mut scored: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (entry, cosine_similarity(&entry.embedding, query_embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        scored
    }
}

/// Chunks documents, embeds the chunks, and answers prompts with the top matches as context.
pub struct VectorIndexer {
    embedding: Arc<EmbeddingProvider>,
    completion: Arc<CompletionProvider>,
    chunking: ChunkingConfig,
    similarity_top_k: usize,
}

impl VectorIndexer {
    pub fn new(
        embedding: Arc<EmbeddingProvider>,
        completion: Arc<CompletionProvider>,
        chunking: ChunkingConfig,
        similarity_top_k: usize,
    ) -> Self {
        Self {
            embedding,
            completion,
            chunking,
            similarity_top_k: similarity_top_k.max(1),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        embedding: Arc<EmbeddingProvider>,
        completion: Arc<CompletionProvider>,
    ) -> Self {
        Self::new(
            embedding,
            completion,
            ChunkingConfig::from_config(config),
            config.similarity_top_k,
        )
    }

    async fn embed_chunks(&self, chunks: &[TextChunk]) -> Result<Vec<Vec<f32>>, AppError> {
        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts = batch.iter().map(|chunk| chunk.chunk.clone()).collect();
            let vectors = self
                .embedding
                .embed_batch(texts)
                .await
                .map_err(|e| AppError::UpstreamQuery(format!("embedding documents failed: {e}")))?;
            if vectors.len() != batch.len() {
                return Err(AppError::UpstreamQuery(format!(
                    "embedding backend returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                )));
            }
            embeddings.extend(vectors);
        }
        debug!(count = embeddings.len(), "Embedded chunks");
        Ok(embeddings)
    }

    fn check_compatible(&self, metadata: &IndexMetadata) -> Result<(), AppError> {
        if metadata.format_version != FORMAT_VERSION {
            return Err(AppError::CorruptStore(format!(
                "unsupported index format version {}",
                metadata.format_version
            )));
        }
        if metadata.embedding_backend != self.embedding.backend_label()
            || metadata.dimension != self.embedding.dimension()
        {
            return Err(AppError::CorruptStore(format!(
                "index was built with {} embeddings of dimension {}, current provider is {} with dimension {}",
                metadata.embedding_backend,
                metadata.dimension,
                self.embedding.backend_label(),
                self.embedding.dimension()
            )));
        }
        if metadata.embedding_model != self.embedding.model_code() {
            return Err(AppError::CorruptStore(format!(
                "index was built with embedding model {:?}, current model is {:?}",
                metadata.embedding_model,
                self.embedding.model_code()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Indexer for VectorIndexer {
    type Index = VectorIndex;

    async fn build_from_documents(
        &self,
        documents: Vec<Document>,
    ) -> Result<VectorIndex, AppError> {
        let document_count = documents.len();
        let mut chunks = Vec::new();
        for document in &documents {
            chunks.extend(split_document(document, &self.chunking)?);
        }

        if chunks.is_empty() {
            return Err(AppError::MissingSource(
                "source documents contain no text to index".into(),
            ));
        }

        let embeddings = self.embed_chunks(&chunks).await?;
        let dimension = self.embedding.dimension();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(AppError::InternalError(format!(
                "embedding has dimension {}, expected {dimension}",
                bad.len()
            )));
        }

        let entries: Vec<IndexedChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedChunk { chunk, embedding })
            .collect();

        let metadata = IndexMetadata {
            format_version: FORMAT_VERSION,
            index_id: Uuid::new_v4().to_string(),
            embedding_backend: self.embedding.backend_label().to_string(),
            embedding_model: self.embedding.model_code(),
            dimension,
            document_count,
            chunk_count: entries.len(),
            created_at: Utc::now(),
        };

        info!(
            index_id = %metadata.index_id,
            documents = document_count,
            chunks = metadata.chunk_count,
            "Built vector index"
        );

        Ok(VectorIndex { metadata, entries })
    }

    async fn persist(&self, index: &VectorIndex, store: &IndexStore) -> Result<(), AppError> {
        let docstore = DocStore {
            chunks: index.entries.iter().map(|e| e.chunk.clone()).collect(),
        };
        let vector_store = VectorStore {
            embeddings: index
                .entries
                .iter()
                .map(|e| (e.chunk.id.clone(), e.embedding.clone()))
                .collect(),
        };

        store
            .put(DOCSTORE_FILE, Bytes::from(serde_json::to_vec(&docstore)?))
            .await?;
        store
            .put(VECTOR_STORE_FILE, Bytes::from(serde_json::to_vec(&vector_store)?))
            .await?;
        // Metadata goes last so a partial write never looks complete.
        store
            .put(
                INDEX_STORE_FILE,
                Bytes::from(serde_json::to_vec_pretty(&index.metadata)?),
            )
            .await?;

        debug!(index_id = %index.metadata.index_id, "Persisted vector index");
        Ok(())
    }

    async fn restore_from_store(&self, store: &IndexStore) -> Result<VectorIndex, AppError> {
        let metadata: IndexMetadata = read_json(store, INDEX_STORE_FILE).await?;
        self.check_compatible(&metadata)?;

        let docstore: DocStore = read_json(store, DOCSTORE_FILE).await?;
        let mut vector_store: VectorStore = read_json(store, VECTOR_STORE_FILE).await?;

        if docstore.chunks.len() != metadata.chunk_count {
            return Err(AppError::CorruptStore(format!(
                "docstore holds {} chunks, metadata expects {}",
                docstore.chunks.len(),
                metadata.chunk_count
            )));
        }

        let mut entries = Vec::with_capacity(docstore.chunks.len());
        for chunk in docstore.chunks {
            let embedding = vector_store.embeddings.remove(&chunk.id).ok_or_else(|| {
                AppError::CorruptStore(format!("chunk {} has no embedding", chunk.id))
            })?;
            if embedding.len() != metadata.dimension {
                return Err(AppError::CorruptStore(format!(
                    "chunk {} has embedding dimension {}, expected {}",
                    chunk.id,
                    embedding.len(),
                    metadata.dimension
                )));
            }
            entries.push(IndexedChunk { chunk, embedding });
        }

        info!(
            index_id = %metadata.index_id,
            chunks = entries.len(),
            "Restored vector index"
        );

        Ok(VectorIndex { metadata, entries })
    }

    async fn query(&self, index: &VectorIndex, prompt: &str) -> Result<QueryAnswer, AppError> {
        let query_embedding = self
            .embedding
            .embed(prompt)
            .await
            .map_err(|e| AppError::UpstreamQuery(format!("embedding prompt failed: {e}")))?;

        let matches = index.top_k(&query_embedding, self.similarity_top_k);
        let passages: Vec<ContextPassage> = matches
            .iter()
            .map(|(entry, score)| ContextPassage {
                document: entry.chunk.file_name.clone(),
                content: entry.chunk.chunk.clone(),
                score: *score,
            })
            .collect();

        let text = self
            .completion
            .complete(prompt, &passages)
            .await
            .map_err(|e| AppError::UpstreamQuery(format!("generating answer failed: {e}")))?;

        let sources: Vec<_> = matches
            .iter()
            .map(|(entry, score)| {
                json!({
                    "document": entry.chunk.file_name,
                    "chunk_id": entry.chunk.id,
                    "score": score,
                })
            })
            .collect();

        let mut extra = Map::new();
        extra.insert("sources".into(), json!(sources));

        Ok(QueryAnswer { text, extra })
    }
}

async fn read_json<T: DeserializeOwned>(store: &IndexStore, location: &str) -> Result<T, AppError> {
    let bytes = store.get(location).await.map_err(|e| match e {
        object_store::Error::NotFound { .. } => {
            AppError::CorruptStore(format!("{location} is missing from the index store"))
        }
        other => AppError::Storage(other),
    })?;

    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::CorruptStore(format!("{location} could not be parsed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::tests::{three_sources, write_sources};
    use crate::lifecycle::IndexLifecycle;

    fn hashed_indexer(dimension: usize) -> VectorIndexer {
        VectorIndexer::new(
            Arc::new(EmbeddingProvider::new_hashed(dimension).expect("hashed")),
            Arc::new(CompletionProvider::Extractive),
            ChunkingConfig::default(),
            2,
        )
    }

    fn documents() -> Vec<Document> {
        vec![
            Document::new(
                "x.txt".into(),
                "x.txt".into(),
                "text/plain".into(),
                "X is a chain text that promises luck to whoever forwards it.".into(),
            ),
            Document::new(
                "weather.txt".into(),
                "weather.txt".into(),
                "text/plain".into(),
                "Rain is expected across the valley tomorrow afternoon.".into(),
            ),
        ]
    }

    #[tokio::test]
    async fn query_answers_from_the_most_similar_chunk() {
        let indexer = hashed_indexer(256);
        let index = indexer
            .build_from_documents(documents())
            .await
            .expect("build");
        assert_eq!(index.len(), 2);

        let answer = indexer.query(&index, "what is X chain text").await.expect("query");

        assert!(answer.text.contains("X is a chain text"));
        let sources = answer.extra.get("sources").expect("sources");
        assert_eq!(
            sources.pointer("/0/document").and_then(|v| v.as_str()),
            Some("x.txt")
        );
    }

    #[tokio::test]
    async fn persisted_index_round_trips_through_store() {
        let indexer = hashed_indexer(64);
        let store = IndexStore::in_memory();
        let index = indexer
            .build_from_documents(documents())
            .await
            .expect("build");

        indexer.persist(&index, &store).await.expect("persist");
        for file in [DOCSTORE_FILE, VECTOR_STORE_FILE, INDEX_STORE_FILE] {
            assert!(store.exists(file).await.expect("exists"), "{file} missing");
        }

        let restored = indexer.restore_from_store(&store).await.expect("restore");
        assert_eq!(restored.metadata(), index.metadata());
        assert_eq!(restored.len(), index.len());
    }

    #[tokio::test]
    async fn missing_or_garbled_files_are_corrupt_store() {
        let indexer = hashed_indexer(64);
        let store = IndexStore::in_memory();
        let index = indexer
            .build_from_documents(documents())
            .await
            .expect("build");
        indexer.persist(&index, &store).await.expect("persist");

        store
            .put(VECTOR_STORE_FILE, Bytes::from_static(b"{\"embeddings\": 12"))
            .await
            .expect("garble");
        let err = indexer
            .restore_from_store(&store)
            .await
            .expect_err("garbled");
        assert!(matches!(err, AppError::CorruptStore(_)));

        let empty = IndexStore::in_memory();
        let err = indexer.restore_from_store(&empty).await.expect_err("missing");
        assert!(matches!(err, AppError::CorruptStore(_)));
    }

    #[tokio::test]
    async fn store_from_other_embedding_space_is_corrupt() {
        let store = IndexStore::in_memory();
        let builder = hashed_indexer(64);
        let index = builder
            .build_from_documents(documents())
            .await
            .expect("build");
        builder.persist(&index, &store).await.expect("persist");

        let err = hashed_indexer(128)
            .restore_from_store(&store)
            .await
            .expect_err("dimension mismatch");
        assert!(matches!(err, AppError::CorruptStore(_)));
    }

    #[tokio::test]
    async fn documents_without_text_are_missing_source() {
        let indexer = hashed_indexer(64);
        let blank = vec![Document::new(
            "blank.txt".into(),
            "blank.txt".into(),
            "text/plain".into(),
            "  \n ".into(),
        )];

        let err = indexer
            .build_from_documents(blank)
            .await
            .expect_err("nothing to index");
        assert!(matches!(err, AppError::MissingSource(_)));
    }

    #[tokio::test]
    async fn lifecycle_builds_then_restores_vector_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("source");
        let persist = dir.path().join("persist");
        three_sources(&source);

        let store = IndexStore::local(&persist).await.expect("store");
        let lifecycle =
            IndexLifecycle::new(Arc::new(hashed_indexer(128)), store.clone(), &source);
        let built = lifecycle.get_index().await.expect("build");
        let answer = lifecycle
            .indexer()
            .query(&built, "what is X")
            .await
            .expect("query");
        assert!(!answer.text.is_empty());

        // Changing the sources must not matter for a restore.
        write_sources(&source, &[("four.txt", "Unrelated new text.")]);
        let restarted = IndexLifecycle::new(Arc::new(hashed_indexer(128)), store, &source);
        let restored = restarted.get_index().await.expect("restore");

        assert_eq!(restored.metadata().index_id, built.metadata().index_id);
        assert_eq!(restored.metadata().document_count, 3);
    }
}
