//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid upload ID: {0}")]
    InvalidUploadId(String),

    #[error("chunk index {index} out of range (session has {total_chunks} chunks)")]
    ChunkIndexOutOfRange { index: u32, total_chunks: u32 },

    #[error("chunk {index} length mismatch: expected {expected} bytes, got {actual}")]
    ChunkLengthMismatch {
        index: u32,
        expected: u64,
        actual: u64,
    },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
