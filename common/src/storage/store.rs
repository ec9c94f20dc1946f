use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{path::Path as ObjPath, ObjectStore};

use crate::utils::config::AppConfig;

pub type DynStore = Arc<dyn ObjectStore>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Local,
    Memory,
}

/// Durable home of a persisted index.
///
/// The store is opaque to callers: the indexer decides which objects it writes, the lifecycle
/// manager only asks whether anything is there and wipes it before a rebuild.
#[derive(Clone)]
pub struct IndexStore {
    store: DynStore,
    backend_kind: StoreKind,
    local_base: Option<PathBuf>,
}

impl IndexStore {
    /// Open the persist directory named by the configuration, creating it if absent.
    pub async fn new(cfg: &AppConfig) -> object_store::Result<Self> {
        Self::local(cfg.persist_path()).await
    }

    /// Open a local directory as an index store, creating it if absent.
    pub async fn local(base: impl Into<PathBuf>) -> object_store::Result<Self> {
        let base = base.into();
        if !base.exists() {
            tokio::fs::create_dir_all(&base)
                .await
                .map_err(|e| object_store::Error::Generic {
                    store: "LocalFileSystem",
                    source: e.into(),
                })?;
        }
        let store = LocalFileSystem::new_with_prefix(base.clone())?;

        Ok(Self {
            store: Arc::new(store),
            backend_kind: StoreKind::Local,
            local_base: Some(base),
        })
    }

    /// A process-local store that disappears with the value.
    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(InMemory::new()), StoreKind::Memory)
    }

    /// Create an IndexStore with a custom storage backend.
    pub fn with_backend(store: DynStore, backend_kind: StoreKind) -> Self {
        Self {
            store,
            backend_kind,
            local_base: None,
        }
    }

    pub fn backend_kind(&self) -> &StoreKind {
        &self.backend_kind
    }

    /// Access the resolved local base directory when using the local backend.
    pub fn local_base_path(&self) -> Option<&Path> {
        self.local_base.as_deref()
    }

    /// Store bytes at the specified location.
    pub async fn put(&self, location: &str, data: Bytes) -> object_store::Result<()> {
        let path = ObjPath::from(location);
        let payload = object_store::PutPayload::from_bytes(data);
        self.store.put(&path, payload).await.map(|_| ())
    }

    /// Retrieve bytes from the specified location.
    pub async fn get(&self, location: &str) -> object_store::Result<Bytes> {
        let path = ObjPath::from(location);
        let result = self.store.get(&path).await?;
        result.bytes().await
    }

    /// Check if an object exists at the specified location.
    pub async fn exists(&self, location: &str) -> object_store::Result<bool> {
        let path = ObjPath::from(location);
        self.store
            .head(&path)
            .await
            .map(|_| true)
            .or_else(|e| match e {
                object_store::Error::NotFound { .. } => Ok(false),
                _ => Err(e),
            })
    }

    /// List every object in the store.
    pub async fn list(&self) -> object_store::Result<Vec<object_store::ObjectMeta>> {
        self.store.list(None).try_collect().await
    }

    /// Whether the store holds nothing at all.
    ///
    /// For the local backend any directory entry counts, including files the object store
    /// would not list itself.
    pub async fn is_empty(&self) -> object_store::Result<bool> {
        if let Some(base) = &self.local_base {
            return match tokio::fs::read_dir(base).await {
                Ok(mut entries) => Ok(entries.next_entry().await.map_err(io_error)?.is_none()),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(true),
                Err(err) => Err(io_error(err)),
            };
        }

        Ok(self.store.list(None).next().await.transpose()?.is_none())
    }

    /// Delete every entry in the store.
    pub async fn clear(&self) -> object_store::Result<()> {
        let locations = self.store.list(None).map_ok(|m| m.location).boxed();
        self.store
            .delete_stream(locations)
            .try_collect::<Vec<_>>()
            .await?;

        if matches!(self.backend_kind, StoreKind::Local) {
            self.cleanup_filesystem_entries().await?;
        }

        Ok(())
    }

    /// Removes whatever the object store listing left behind in the local directory.
    async fn cleanup_filesystem_entries(&self) -> object_store::Result<()> {
        let Some(base) = &self.local_base else {
            return Ok(());
        };

        let mut entries = match tokio::fs::read_dir(base).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(io_error(err)),
        };

        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(io_error)?;
            let removal = if file_type.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };

            match removal {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed stale store entry"),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(io_error(err)),
            }
        }

        Ok(())
    }
}

fn io_error(err: std::io::Error) -> object_store::Error {
    object_store::Error::Generic {
        store: "LocalFileSystem",
        source: err.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_put_get_and_clear() {
        let store = IndexStore::in_memory();
        assert!(store.is_empty().await.expect("is_empty"));

        store
            .put("docstore.json", Bytes::from_static(b"{}"))
            .await
            .expect("put");
        assert!(!store.is_empty().await.expect("is_empty"));
        assert!(store.exists("docstore.json").await.expect("exists"));
        assert_eq!(
            store.get("docstore.json").await.expect("get").as_ref(),
            b"{}"
        );

        store.clear().await.expect("clear");
        assert!(store.is_empty().await.expect("is_empty"));
        assert!(!store.exists("docstore.json").await.expect("exists"));
    }

    #[tokio::test]
    async fn local_store_creates_missing_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path().join("persist");

        let store = IndexStore::local(&base).await.expect("local store");
        assert!(base.is_dir());
        assert_eq!(store.local_base_path(), Some(base.as_path()));
        assert_eq!(*store.backend_kind(), StoreKind::Local);
        assert!(store.is_empty().await.expect("is_empty"));
    }

    #[tokio::test]
    async fn local_clear_removes_foreign_files_and_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::local(dir.path()).await.expect("local store");

        store
            .put("vector_store.json", Bytes::from_static(b"[]"))
            .await
            .expect("put");
        std::fs::write(dir.path().join("stray.txt"), b"left over").expect("write stray");
        std::fs::create_dir_all(dir.path().join("nested/deeper")).expect("nested dir");

        assert!(!store.is_empty().await.expect("is_empty"));
        store.clear().await.expect("clear");

        assert!(store.is_empty().await.expect("is_empty"));
        assert!(dir.path().is_dir());
    }

    #[tokio::test]
    async fn local_store_counts_any_entry_as_non_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::local(dir.path()).await.expect("local store");

        std::fs::create_dir(dir.path().join("empty-subdir")).expect("subdir");
        assert!(!store.is_empty().await.expect("is_empty"));
        assert!(store.list().await.expect("list").is_empty());
    }
}
