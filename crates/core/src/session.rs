//! Upload session types and lifecycle.

use crate::chunk;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Unique identifier for an upload session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadId(Uuid);

impl UploadId {
    /// Generate a new random upload ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidUploadId(e.to_string()))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Storage key for the chunk blob at `index`.
    pub fn chunk_key(&self, index: u32) -> String {
        format!("uploads/{}/chunks/{}", self.0, index)
    }

    /// Storage key prefix covering all chunk blobs for this session.
    pub fn chunk_prefix(&self) -> String {
        format!("uploads/{}/", self.0)
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UploadId({})", self.0)
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upload session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Session is open and accepting chunks.
    Pending,
    /// Every chunk arrived and the artifact was assembled.
    Completed,
    /// Assembly failed; the session is unusable.
    Failed,
    /// Session timed out without completing.
    Expired,
}

impl SessionStatus {
    /// Check if the session can still receive chunks.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Check if the session reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Expired)
    }
}

/// Immutable descriptor of an upload session.
///
/// The mutable parts (status, received indices, activity timestamps) live in
/// the server's session registry; this descriptor fixes the geometry that
/// every chunk and the final assembly are validated against.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadSession {
    /// Unique session identifier.
    pub id: UploadId,
    /// Original filename as declared by the client.
    pub filename: String,
    /// Declared total size in bytes.
    pub size: u64,
    /// Chunk size for this session.
    pub chunk_size: u64,
    /// Number of chunks the declared size splits into.
    pub total_chunks: u32,
    /// Declared mime type, if any.
    pub mime_type: Option<String>,
    /// Client-supplied identifier used to resume across init calls.
    pub temp_identifier: String,
    /// When the session was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl UploadSession {
    /// Create a new session descriptor with a fresh ID.
    pub fn new(
        filename: String,
        size: u64,
        chunk_size: u64,
        mime_type: Option<String>,
        temp_identifier: String,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            id: UploadId::new(),
            filename,
            size,
            chunk_size,
            total_chunks: chunk::chunk_count(size, chunk_size),
            mime_type,
            temp_identifier,
            created_at,
        }
    }

    /// Expected byte length of the chunk at `index`.
    ///
    /// Returns an error for out-of-range indices.
    pub fn expected_chunk_len(&self, index: u32) -> crate::Result<u64> {
        if index >= self.total_chunks {
            return Err(crate::Error::ChunkIndexOutOfRange {
                index,
                total_chunks: self.total_chunks,
            });
        }
        Ok(chunk::chunk_len(self.size, self.chunk_size, index))
    }

    /// Check that a chunk payload has exactly the expected length for its
    /// index.
    pub fn validate_chunk(&self, index: u32, len: u64) -> crate::Result<()> {
        let expected = self.expected_chunk_len(index)?;
        if len != expected {
            return Err(crate::Error::ChunkLengthMismatch {
                index,
                expected,
                actual: len,
            });
        }
        Ok(())
    }
}
