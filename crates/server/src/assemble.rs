//! Artifact assembly.
//!
//! Concatenates a session's chunks, strictly in ascending index order, into a
//! single artifact. The artifact becomes visible atomically on finish; any
//! inconsistency between the uploaded set and what storage actually holds
//! aborts the write instead of producing a truncated file.

use crate::error::{ApiError, ApiResult};
use crate::intake::ChunkStore;
use depot_core::UploadSession;
use depot_core::chunk::chunk_len;
use depot_storage::ObjectStore;
use std::sync::Arc;

/// Assembles completed uploads into final artifacts.
pub struct Assembler {
    storage: Arc<dyn ObjectStore>,
    chunks: Arc<ChunkStore>,
}

impl Assembler {
    /// Create an assembler writing artifacts to `storage`.
    pub fn new(storage: Arc<dyn ObjectStore>, chunks: Arc<ChunkStore>) -> Self {
        Self { storage, chunks }
    }

    /// Assemble all chunks of `session` into the final artifact.
    ///
    /// Returns the artifact's storage path. A chunk missing from storage at
    /// read time — despite the uploaded set claiming completeness — is a
    /// storage-consistency bug and surfaces as an assembly error; the caller
    /// must move the session to failed.
    pub async fn assemble(&self, session: &UploadSession) -> ApiResult<String> {
        let stored = self.chunks.stored_indices(&session.id).await?;
        let missing: Vec<u32> = (0..session.total_chunks)
            .filter(|index| !stored.contains(index))
            .collect();
        if !missing.is_empty() {
            return Err(ApiError::Assembly(format!(
                "{} chunk(s) missing from storage at assembly time (first: {})",
                missing.len(),
                missing[0]
            )));
        }

        let key = artifact_key(session);
        let mut upload = self.storage.put_stream(&key).await?;

        for index in 0..session.total_chunks {
            let data = match self.chunks.get(&session.id, index).await {
                Ok(data) => data,
                Err(e) if e.is_not_found() => {
                    let _ = upload.abort().await;
                    return Err(ApiError::Assembly(format!(
                        "chunk {index} disappeared during assembly"
                    )));
                }
                Err(e) => {
                    let _ = upload.abort().await;
                    return Err(e.into());
                }
            };

            let expected = chunk_len(session.size, session.chunk_size, index);
            if data.len() as u64 != expected {
                let _ = upload.abort().await;
                return Err(ApiError::Assembly(format!(
                    "chunk {index} has {} bytes in storage, expected {expected}",
                    data.len()
                )));
            }

            if let Err(e) = upload.write(data).await {
                let _ = upload.abort().await;
                return Err(e.into());
            }
        }

        let written = upload.finish().await?;
        if written != session.size {
            let _ = self.storage.delete(&key).await;
            return Err(ApiError::Assembly(format!(
                "assembled {written} bytes, expected {}",
                session.size
            )));
        }

        Ok(key)
    }
}

/// Storage key for a session's assembled artifact.
pub fn artifact_key(session: &UploadSession) -> String {
    format!(
        "files/{}/{}",
        session.id,
        sanitize_filename(&session.filename)
    )
}

/// Flatten a client-supplied filename into a single safe path segment.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    // Storage keys reject ".." anywhere; break up dot runs before trimming.
    let cleaned = cleaned.replace("..", "__");
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "artifact".to_string()
    } else {
        trimmed.to_string()
    }
}
