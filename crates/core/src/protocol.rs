//! Wire types for the upload protocol.
//!
//! Four request/response operations form the protocol: init, status, chunk
//! and complete. Chunk payloads travel as raw request bodies; everything else
//! is JSON. Errors are serialized as [`ErrorResponse`] with a stable `code`
//! for programmatic handling.

use serde::{Deserialize, Serialize};

/// Request to create (or resume) an upload session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitUploadRequest {
    /// Original filename.
    pub filename: String,
    /// Declared total size in bytes.
    pub size: u64,
    /// Client-supplied identifier. An init carrying the identifier of a live
    /// session with matching filename and size resumes that session instead
    /// of creating a new one.
    pub temp_identifier: String,
    /// Declared mime type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Response from creating or resuming an upload session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitUploadResponse {
    /// The upload session ID.
    pub upload_id: String,
    /// Chunk size every piece except the last must match exactly.
    pub chunk_size: u64,
    /// Number of chunks the server expects. Clients fall back to
    /// `ceil(size / chunk_size)` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u32>,
    /// Maximum declared size the server accepts.
    pub max_bytes: u64,
}

/// Response from querying upload state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadStatusResponse {
    /// The upload session ID.
    pub upload_id: String,
    /// Chunk indices received so far, in ascending order.
    pub uploaded_chunks: Vec<u32>,
    /// Number of chunks the session expects.
    pub total_chunks: u32,
    /// Chunk size for this session.
    pub chunk_size: u64,
}

/// The assembled artifact returned by a successful complete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalArtifact {
    /// Original filename as declared at init.
    pub original_filename: String,
    /// Storage path of the assembled artifact.
    pub path: String,
    /// Public URL for the artifact, when the server has a base URL configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Error envelope returned for every failed operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}
