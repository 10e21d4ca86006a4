use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use quill_types::ContentPointer;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::BlobStore;

/// Filesystem blob store.
///
/// Blobs live under `root/<first two hex chars>/<remaining hex>`. Writes go
/// to a temporary file in the root and are renamed into place, so a reader
/// never observes a partially written blob. File I/O runs on the blocking
/// thread pool.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, pointer: &ContentPointer) -> PathBuf {
        let hex = pointer.to_hex();
        let (fan, rest) = hex.split_at(2);
        self.root.join(fan).join(rest)
    }

    /// Run `op` against a clone of the store on the blocking thread pool.
    async fn blocking<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> StoreResult<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| StoreError::Internal(format!("blob task failed: {e}")))?
    }

    fn write_blob(&self, data: &[u8]) -> StoreResult<ContentPointer> {
        let pointer = ContentPointer::for_content(data);
        let path = self.path_for(&pointer);
        match std::fs::read(&path) {
            Ok(existing) if pointer.matches(&existing) => return Ok(pointer),
            Ok(_) => warn!(%pointer, "overwriting blob that failed its integrity check"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(%pointer, bytes = data.len(), "blob written");
        Ok(pointer)
    }

    fn read_blob(&self, pointer: &ContentPointer) -> StoreResult<Option<Vec<u8>>> {
        let data = match std::fs::read(self.path_for(pointer)) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !pointer.matches(&data) {
            warn!(%pointer, "blob failed its integrity check");
            return Err(StoreError::BlobMismatch { pointer: *pointer });
        }
        Ok(Some(data))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, data: Bytes) -> StoreResult<ContentPointer> {
        self.blocking(move |store| store.write_blob(&data)).await
    }

    async fn get(&self, pointer: &ContentPointer) -> StoreResult<Option<Vec<u8>>> {
        let pointer = *pointer;
        self.blocking(move |store| store.read_blob(&pointer)).await
    }
}
