//! Client error types.

use thiserror::Error;

/// Classified failure kinds for wire operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or oversized init request; not retryable.
    Validation,
    /// Session id not found or already expired; restart from init.
    UnknownSession,
    /// Wrong index or byte length for a chunk; fix the payload, do not retry.
    ChunkMismatch,
    /// Completion attempted before all chunks arrived.
    IncompleteUpload,
    /// Completion attempted twice. Callers that check it can treat this as
    /// a success-equivalent.
    AlreadyCompleted,
    /// Storage failure while concatenating chunks; fatal for the session.
    Assembly,
    /// Transport-level failure; retried per the backoff policy.
    Transport,
    /// A server-reported error with no specific classification.
    Other,
}

impl ErrorKind {
    /// Map a wire error code to a kind.
    pub fn from_code(code: &str) -> Self {
        match code {
            "validation_error" => Self::Validation,
            "unknown_session" => Self::UnknownSession,
            "chunk_mismatch" => Self::ChunkMismatch,
            "incomplete_upload" => Self::IncompleteUpload,
            "already_completed" => Self::AlreadyCompleted,
            "assembly_error" => Self::Assembly,
            _ => Self::Other,
        }
    }
}

/// A failed wire operation.
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    /// Classified failure kind.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl TransportError {
    /// A transport-level (network) failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transport,
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP response.
    ///
    /// The body is parsed as the server's error envelope when possible;
    /// otherwise 5xx responses count as transient and everything else as
    /// unclassified.
    pub fn from_response(status: u16, body: &str) -> Self {
        if let Ok(envelope) = serde_json::from_str::<depot_core::protocol::ErrorResponse>(body) {
            return Self {
                kind: ErrorKind::from_code(&envelope.code),
                message: envelope.message,
            };
        }
        let kind = if status >= 500 {
            ErrorKind::Transport
        } else {
            ErrorKind::Other
        };
        Self {
            kind,
            message: format!("server returned {status}: {body}"),
        }
    }

    /// Check whether the driver's backoff policy applies to this error.
    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Transport
    }
}

/// Errors the upload driver can hit.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("file exceeds upload limit: {size} > {max_bytes} bytes")]
    TooLarge { size: u64, max_bytes: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ClientError {
    /// The classified failure kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TooLarge { .. } => ErrorKind::Validation,
            Self::Io(_) => ErrorKind::Other,
            Self::Transport(e) => e.kind,
        }
    }
}

/// Terminal driver failure: the last concrete error plus the progress
/// percentage reached, so callers can decide whether to retry the upload
/// from where it left off.
#[derive(Debug, Error)]
#[error("upload failed at {percent}%: {error}")]
pub struct UploadError {
    /// Progress percentage reached before the failure.
    pub percent: u8,
    /// The error that ended the upload.
    #[source]
    pub error: ClientError,
}

impl UploadError {
    /// The classified failure kind.
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}
