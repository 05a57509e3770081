//! Core domain types and shared logic for the depot upload service.
//!
//! This crate defines the canonical data model used across the server and
//! client crates:
//! - Upload session identifiers and lifecycle
//! - Chunk geometry for fixed-size chunking
//! - Wire request/response types for the upload protocol
//! - Configuration types

pub mod chunk;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;

pub use chunk::{ChunkSpan, chunk_count, chunk_len, chunk_span};
pub use error::{Error, Result};
pub use protocol::{
    ErrorResponse, FinalArtifact, InitUploadRequest, InitUploadResponse, UploadStatusResponse,
};
pub use session::{SessionStatus, UploadId, UploadSession};

/// Fixed chunk size for all sessions: 512 KiB.
pub const CHUNK_SIZE: u64 = 512 * 1024;

/// Maximum declared upload size: 40 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 40 * 1024 * 1024;
