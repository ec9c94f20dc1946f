use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

use common::{error::AppError, storage::store::IndexStore};
use ingestion_pipeline::{read_documents, source_is_ready};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};

use crate::indexer::Indexer;

/// Shared reference to a built index.
pub type IndexHandle<I> = Arc<<I as Indexer>::Index>;

/// Snapshot of the lifecycle state, for status reporting.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct IndexStatus {
    pub loaded: bool,
    /// Number of handles installed since startup.
    pub generation: u64,
}

/// Owns the single live index of the process.
///
/// The index is created lazily on first use, either restored from the store or built from the
/// source directory, and replaced wholesale by [`IndexLifecycle::reload`]. Builds and restores
/// are serialized by `build_guard`; readers only ever take the `current` read lock long enough
/// to clone the handle, so a rebuild never blocks queries.
pub struct IndexLifecycle<I: Indexer> {
    indexer: Arc<I>,
    store: IndexStore,
    source_dir: PathBuf,
    current: RwLock<Option<IndexHandle<I>>>,
    build_guard: Mutex<()>,
    generation: AtomicU64,
}

impl<I: Indexer> IndexLifecycle<I> {
    pub fn new(indexer: Arc<I>, store: IndexStore, source_dir: impl Into<PathBuf>) -> Self {
        Self {
            indexer,
            store,
            source_dir: source_dir.into(),
            current: RwLock::new(None),
            build_guard: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn indexer(&self) -> &Arc<I> {
        &self.indexer
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub async fn status(&self) -> IndexStatus {
        IndexStatus {
            loaded: self.current.read().await.is_some(),
            generation: self.generation.load(Ordering::SeqCst),
        }
    }

    /// Returns the current handle, loading or building it on first use.
    ///
    /// Concurrent first callers all observe the same handle; exactly one of them performs the
    /// load or build.
    pub async fn get_index(&self) -> Result<IndexHandle<I>, AppError> {
        if let Some(handle) = self.current_handle().await {
            return Ok(handle);
        }

        let _guard = self.build_guard.lock().await;
        if let Some(handle) = self.current_handle().await {
            return Ok(handle);
        }

        self.load_or_build_locked().await
    }

    /// Restores from the store when it holds anything, otherwise builds from source.
    pub async fn load_or_build(&self) -> Result<IndexHandle<I>, AppError> {
        let _guard = self.build_guard.lock().await;
        self.load_or_build_locked().await
    }

    /// Reconstructs an index purely from the store, without installing it.
    pub async fn restore(&self) -> Result<IndexHandle<I>, AppError> {
        let _guard = self.build_guard.lock().await;
        self.restore_locked().await
    }

    /// Rebuilds the index from the source directory, replacing the persisted store and the
    /// current handle.
    pub async fn build(&self) -> Result<IndexHandle<I>, AppError> {
        let _guard = self.build_guard.lock().await;
        self.build_locked().await
    }

    /// Recomputes the index from the current source documents. Never restores.
    pub async fn reload(&self) -> Result<(), AppError> {
        self.build().await.map(|_| ())
    }

    async fn current_handle(&self) -> Option<IndexHandle<I>> {
        self.current.read().await.clone()
    }

    async fn install(&self, handle: IndexHandle<I>) {
        *self.current.write().await = Some(handle);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        info!(generation, "Installed new index handle");
    }

    async fn load_or_build_locked(&self) -> Result<IndexHandle<I>, AppError> {
        if self.store.is_empty().await? {
            info!("Index store is empty; building from source documents");
            return self.build_locked().await;
        }

        let handle = self.restore_locked().await?;
        self.install(Arc::clone(&handle)).await;
        Ok(handle)
    }

    #[instrument(skip(self))]
    async fn restore_locked(&self) -> Result<IndexHandle<I>, AppError> {
        let started = Instant::now();
        let index = self.indexer.restore_from_store(&self.store).await?;
        info!(
            elapsed_ms = started.elapsed().as_millis(),
            "Restored index from store"
        );
        Ok(Arc::new(index))
    }

    #[instrument(skip(self), fields(source_dir = %self.source_dir.display()))]
    async fn build_locked(&self) -> Result<IndexHandle<I>, AppError> {
        if !source_is_ready(&self.source_dir).await? {
            return Err(AppError::MissingSource(format!(
                "data directory {} does not exist or is empty",
                self.source_dir.display()
            )));
        }

        let started = Instant::now();
        let documents = read_documents(&self.source_dir).await?;
        let document_count = documents.len();
        let index = self.indexer.build_from_documents(documents).await?;

        // Only a fully built index may replace what is on disk.
        self.store.clear().await?;
        if let Err(err) = self.indexer.persist(&index, &self.store).await {
            warn!(error = %err, "Persisting index failed; clearing partial store");
            if let Err(clear_err) = self.store.clear().await {
                warn!(error = %clear_err, "Failed to clear partially written store");
            }
            return Err(err);
        }

        let handle = Arc::new(index);
        self.install(Arc::clone(&handle)).await;
        info!(
            documents = document_count,
            elapsed_ms = started.elapsed().as_millis(),
            "Built and persisted index"
        );

        Ok(handle)
    }
}
