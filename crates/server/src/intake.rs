//! Chunk store: validated intake and bookkeeping of chunk blobs.
//!
//! Chunks are addressed by (session, index). Writing the same index twice
//! overwrites the previous blob, which is what makes client retries after
//! ambiguous network failures safe.

use crate::error::{ApiError, ApiResult};
use bytes::Bytes;
use depot_core::{UploadId, UploadSession};
use depot_storage::{ObjectStore, StorageResult};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Durable, addressable storage for individual chunk blobs.
pub struct ChunkStore {
    storage: Arc<dyn ObjectStore>,
}

impl ChunkStore {
    /// Create a chunk store on top of an object store.
    pub fn new(storage: Arc<dyn ObjectStore>) -> Self {
        Self { storage }
    }

    /// Validate and persist one chunk.
    ///
    /// The index must be in range and the payload must have exactly the
    /// expected length for that index (full chunk size, or the remainder for
    /// the last index). Overwrites are accepted.
    pub async fn put(&self, session: &UploadSession, index: u32, data: Bytes) -> ApiResult<()> {
        session
            .validate_chunk(index, data.len() as u64)
            .map_err(|e| ApiError::ChunkMismatch(e.to_string()))?;
        self.storage.put(&session.id.chunk_key(index), data).await?;
        Ok(())
    }

    /// Read the stored blob for `index`.
    pub async fn get(&self, id: &UploadId, index: u32) -> StorageResult<Bytes> {
        self.storage.get(&id.chunk_key(index)).await
    }

    /// Chunk indices that have a stored blob, ascending.
    ///
    /// Derived from storage rather than the session registry; the assembler
    /// uses it to detect registry/storage divergence before writing anything.
    pub async fn stored_indices(&self, id: &UploadId) -> StorageResult<BTreeSet<u32>> {
        let keys = self.storage.list(&id.chunk_prefix()).await?;
        Ok(keys
            .iter()
            .filter_map(|key| key.rsplit('/').next())
            .filter_map(|segment| segment.parse::<u32>().ok())
            .collect())
    }

    /// Remove every chunk blob for a session.
    pub async fn purge(&self, id: &UploadId) -> StorageResult<()> {
        for key in self.storage.list(&id.chunk_prefix()).await? {
            self.storage.delete(&key).await?;
        }
        Ok(())
    }
}
