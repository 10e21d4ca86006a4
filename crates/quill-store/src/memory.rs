use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use quill_types::{
    ContentPointer, DocumentId, DocumentStatus, VersionId, VersionNumber, VersionStage,
};

use crate::error::{StoreError, StoreResult};
use crate::record::{
    AppendedVersion, CreatedDocument, DocumentRecord, NewDocument, NewVersion, VersionRecord,
};
use crate::traits::{BlobStore, VersionStore};

/// In-memory version store.
///
/// Intended for tests, embedding, and demo runs. A single `RwLock` guards
/// documents and versions together, so every write sees and leaves a
/// consistent state.
pub struct InMemoryVersionStore {
    inner: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    documents: HashMap<DocumentId, DocumentRecord>,
    versions: HashMap<DocumentId, Vec<VersionRecord>>,
}

impl InMemoryVersionStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryState::default()),
        }
    }

    pub fn document_count(&self) -> usize {
        self.inner.read().map(|s| s.documents.len()).unwrap_or_default()
    }

    pub fn version_count(&self) -> usize {
        self.inner
            .read()
            .map(|s| s.versions.values().map(Vec::len).sum())
            .unwrap_or_default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, MemoryState>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Internal("version store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, MemoryState>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Internal("version store lock poisoned".into()))
    }
}

impl Default for InMemoryVersionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryVersionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVersionStore")
            .field("documents", &self.document_count())
            .field("versions", &self.version_count())
            .finish()
    }
}

impl MemoryState {
    fn versions_of(&self, id: &DocumentId) -> StoreResult<&Vec<VersionRecord>> {
        if !self.documents.contains_key(id) {
            return Err(StoreError::document_not_found(id));
        }
        self.versions
            .get(id)
            .ok_or_else(|| StoreError::Corrupt(format!("document {id} has no versions")))
    }
}

fn version_record(
    document_id: DocumentId,
    number: VersionNumber,
    version: NewVersion,
) -> VersionRecord {
    VersionRecord {
        id: VersionId::new(),
        document_id,
        number,
        stage: version.stage,
        hash: version.hash,
        content: version.content,
        anchor: version.anchor,
        created_by: version.created_by,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl VersionStore for InMemoryVersionStore {
    async fn create_document_with_version(&self, doc: NewDocument) -> StoreResult<CreatedDocument> {
        let mut state = self.write()?;
        if state
            .documents
            .values()
            .any(|d| d.owner == doc.owner && d.name == doc.name)
        {
            return Err(StoreError::Conflict(format!(
                "document named {:?} already exists for {}",
                doc.name, doc.owner
            )));
        }

        let document_id = DocumentId::new();
        let version = version_record(document_id, VersionNumber::BASE, doc.first_version);
        let version_id = version.id;
        let now = version.created_at;

        state.documents.insert(
            document_id,
            DocumentRecord {
                id: document_id,
                owner: doc.owner,
                name: doc.name,
                password_hash: doc.password_hash,
                original_filename: doc.original_filename,
                mime_type: doc.mime_type,
                original_hash: doc.original_hash,
                original_content: doc.original_content,
                current_version: Some(version_id),
                status: doc.status,
                required_signatures: doc.required_signatures,
                created_at: now,
                updated_at: now,
            },
        );
        state.versions.insert(document_id, vec![version]);

        Ok(CreatedDocument {
            document_id,
            version_id,
            number: VersionNumber::BASE,
        })
    }

    async fn add_version(
        &self,
        document_id: &DocumentId,
        version: NewVersion,
    ) -> StoreResult<AppendedVersion> {
        let mut state = self.write()?;
        let state = &mut *state;

        let document = state
            .documents
            .get_mut(document_id)
            .ok_or_else(|| StoreError::document_not_found(document_id))?;
        let versions = state
            .versions
            .get_mut(document_id)
            .ok_or_else(|| StoreError::Corrupt(format!("document {document_id} has no versions")))?;

        let stage = version.stage;
        let signed_before = versions
            .iter()
            .filter(|v| v.stage == VersionStage::Signed)
            .count() as u32;
        let next_status = match stage {
            VersionStage::Signed => {
                DocumentStatus::after_signature(signed_before + 1, document.required_signatures)
            }
            VersionStage::Unsigned => document.status,
        };
        let allowed = match stage {
            VersionStage::Signed => document.status.accepts_signatures(),
            VersionStage::Unsigned => !document.status.is_terminal(),
        };
        if !allowed {
            return Err(StoreError::InvalidTransition {
                document: *document_id,
                from: document.status,
                to: next_status,
            });
        }

        let number = versions
            .last()
            .map(|v| v.number.next())
            .unwrap_or(VersionNumber::BASE);
        let record = version_record(*document_id, number, version);
        let version_id = record.id;

        document.current_version = Some(version_id);
        document.status = next_status;
        document.updated_at = record.created_at;
        versions.push(record);

        Ok(AppendedVersion {
            version_id,
            number,
            status: next_status,
        })
    }

    async fn get_document(&self, document_id: &DocumentId) -> StoreResult<DocumentRecord> {
        self.read()?
            .documents
            .get(document_id)
            .cloned()
            .ok_or_else(|| StoreError::document_not_found(document_id))
    }

    async fn get_version(
        &self,
        document_id: &DocumentId,
        number: VersionNumber,
    ) -> StoreResult<VersionRecord> {
        self.read()?
            .versions_of(document_id)?
            .iter()
            .find(|v| v.number == number)
            .cloned()
            .ok_or_else(|| StoreError::version_not_found(document_id, number))
    }

    async fn get_current_version(&self, document_id: &DocumentId) -> StoreResult<VersionRecord> {
        let state = self.read()?;
        let current = state
            .documents
            .get(document_id)
            .ok_or_else(|| StoreError::document_not_found(document_id))?
            .current_version
            .ok_or_else(|| StoreError::version_not_found(document_id, "current"))?;
        state
            .versions_of(document_id)?
            .iter()
            .find(|v| v.id == current)
            .cloned()
            .ok_or_else(|| StoreError::Corrupt(format!("current version {current} is missing")))
    }

    async fn list_versions(&self, document_id: &DocumentId) -> StoreResult<Vec<VersionRecord>> {
        Ok(self.read()?.versions_of(document_id)?.clone())
    }

    async fn update_status(
        &self,
        document_id: &DocumentId,
        next: DocumentStatus,
    ) -> StoreResult<DocumentRecord> {
        let mut state = self.write()?;
        let document = state
            .documents
            .get_mut(document_id)
            .ok_or_else(|| StoreError::document_not_found(document_id))?;
        if !document.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                document: *document_id,
                from: document.status,
                to: next,
            });
        }
        document.status = next;
        document.updated_at = Utc::now();
        Ok(document.clone())
    }

    async fn find_version_by_tx(&self, tx_signature: &str) -> StoreResult<Option<VersionRecord>> {
        Ok(self
            .read()?
            .versions
            .values()
            .flatten()
            .find(|v| v.tx_signature() == Some(tx_signature))
            .cloned())
    }
}

/// In-memory, HashMap-based blob store.
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<ContentPointer, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|m| m.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .map(|m| m.values().map(|b| b.len() as u64).sum())
            .unwrap_or_default()
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, data: Bytes) -> StoreResult<ContentPointer> {
        let pointer = ContentPointer::for_content(&data);
        let mut map = self
            .blobs
            .write()
            .map_err(|_| StoreError::Internal("blob store lock poisoned".into()))?;
        map.entry(pointer).or_insert_with(|| data.to_vec());
        Ok(pointer)
    }

    async fn get(&self, pointer: &ContentPointer) -> StoreResult<Option<Vec<u8>>> {
        let map = self
            .blobs
            .read()
            .map_err(|_| StoreError::Internal("blob store lock poisoned".into()))?;
        Ok(map.get(pointer).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::{document, version};
    use crate::traits::conformance;
    use std::sync::Arc;

    #[tokio::test]
    async fn conformance_suite() {
        conformance::run_all(&InMemoryVersionStore::new()).await;
    }

    #[tokio::test]
    async fn concurrent_appends_get_distinct_numbers() {
        let store = Arc::new(InMemoryVersionStore::new());
        let id = store
            .create_document_with_version(document("race", 1))
            .await
            .unwrap()
            .document_id;

        let mut handles = Vec::new();
        for byte in 0..16u8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .add_version(&id, version(byte, VersionStage::Unsigned, false))
                    .await
                    .unwrap()
                    .number
                    .get()
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap());
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (2..=17).collect::<Vec<u32>>());
        assert_eq!(store.version_count(), 17);
    }

    #[tokio::test]
    async fn blob_put_is_idempotent() {
        let blobs = InMemoryBlobStore::new();
        let a = blobs.put(Bytes::from_static(b"signed pdf bytes")).await.unwrap();
        let b = blobs.put(Bytes::from_static(b"signed pdf bytes")).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs.get(&a).await.unwrap().unwrap(), b"signed pdf bytes");
    }

    #[tokio::test]
    async fn missing_blob_is_none() {
        let blobs = InMemoryBlobStore::new();
        let pointer = ContentPointer::for_content(b"never stored");
        assert!(blobs.get(&pointer).await.unwrap().is_none());
        assert!(blobs.is_empty());
    }
}
