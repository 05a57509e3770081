//! Client-side upload driver.
//!
//! Drives a single file through init, an optional resume query, sequential
//! chunk transfer and completion. Chunks go out one at a time in ascending
//! index order. Transient failures are retried a bounded number of times
//! with linearly increasing delays, re-querying the server's uploaded set
//! before each resend so an attempt that actually landed despite a
//! client-observed network error is never sent twice.

use crate::error::{ClientError, UploadError};
use crate::transport::UploadTransport;
use bytes::Bytes;
use depot_core::chunk::{chunk_count, chunk_len, chunk_span};
use depot_core::protocol::{FinalArtifact, InitUploadRequest};
use std::collections::BTreeSet;
use std::fmt;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Progress callback, invoked with the current percentage (0..=100).
pub type ProgressFn = dyn Fn(u8) + Send + Sync;

/// Driver configuration.
#[derive(Clone)]
pub struct UploadOptions {
    /// Fallback chunk size when the server's init response omits one.
    pub chunk_size: u64,
    /// Local size limit; larger files are rejected before any network call.
    pub max_upload_bytes: u64,
    /// Additional attempts per failed operation (default 2).
    pub retry_limit: u32,
    /// Base retry delay; attempt `n` waits `n * retry_base_delay`.
    pub retry_base_delay: Duration,
    /// Progress callback.
    pub on_progress: Option<Arc<ProgressFn>>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            chunk_size: depot_core::CHUNK_SIZE,
            max_upload_bytes: depot_core::MAX_UPLOAD_BYTES,
            retry_limit: 2,
            retry_base_delay: Duration::from_millis(500),
            on_progress: None,
        }
    }
}

impl fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadOptions")
            .field("chunk_size", &self.chunk_size)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("retry_limit", &self.retry_limit)
            .field("retry_base_delay", &self.retry_base_delay)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// One file to upload.
#[derive(Clone, Debug)]
pub struct UploadRequest {
    /// Path of the file to upload.
    pub path: PathBuf,
    /// Declared mime type, if known.
    pub mime_type: Option<String>,
    /// Identifier correlating retries of the same logical upload. Reusing
    /// the identifier of an interrupted run resumes its session. Generated
    /// when absent.
    pub temp_identifier: Option<String>,
}

impl UploadRequest {
    /// Upload `path` with no declared mime type and a fresh identifier.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mime_type: None,
            temp_identifier: None,
        }
    }
}

/// Monotonic, capped progress reporting.
struct ProgressTracker {
    callback: Option<Arc<ProgressFn>>,
    reported: Option<u8>,
}

impl ProgressTracker {
    fn new(callback: Option<Arc<ProgressFn>>) -> Self {
        Self {
            callback,
            reported: None,
        }
    }

    fn report(&mut self, uploaded_bytes: u64, size: u64) {
        let pct = percent(uploaded_bytes, size);
        // Never report a decrease; resumed uploads start above zero.
        if self.reported.is_none_or(|last| pct > last) {
            self.reported = Some(pct);
            if let Some(callback) = &self.callback {
                callback(pct);
            }
        }
    }

    fn last(&self) -> u8 {
        self.reported.unwrap_or(0)
    }
}

/// Percentage of `size` covered by `uploaded_bytes`, rounded, capped at 100.
fn percent(uploaded_bytes: u64, size: u64) -> u8 {
    if size == 0 {
        return 100;
    }
    let pct = (uploaded_bytes as f64 / size as f64) * 100.0;
    pct.round().min(100.0) as u8
}

/// Uploads one file per call; independent uploads share nothing and may run
/// concurrently on clones of the same transport.
pub struct UploadDriver {
    transport: Arc<dyn UploadTransport>,
    options: UploadOptions,
}

impl UploadDriver {
    /// Create a driver over a transport.
    pub fn new(transport: Arc<dyn UploadTransport>, options: UploadOptions) -> Self {
        Self { transport, options }
    }

    /// Upload a file and return the server's final artifact reference.
    ///
    /// On failure the error carries the progress percentage reached, so the
    /// caller can decide whether to retry with the same `temp_identifier`.
    pub async fn upload(&self, request: &UploadRequest) -> Result<FinalArtifact, UploadError> {
        let mut progress = ProgressTracker::new(self.options.on_progress.clone());
        match self.run(request, &mut progress).await {
            Ok(artifact) => Ok(artifact),
            Err(error) => Err(UploadError {
                percent: progress.last(),
                error,
            }),
        }
    }

    async fn run(
        &self,
        request: &UploadRequest,
        progress: &mut ProgressTracker,
    ) -> Result<FinalArtifact, ClientError> {
        let size = fs::metadata(&request.path).await?.len();

        // Oversized files are rejected before any network call.
        if size > self.options.max_upload_bytes {
            return Err(ClientError::TooLarge {
                size,
                max_bytes: self.options.max_upload_bytes,
            });
        }

        let filename = request
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        let temp_identifier = request
            .temp_identifier
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let init_request = InitUploadRequest {
            filename,
            size,
            temp_identifier,
            mime_type: request.mime_type.clone(),
        };
        let init = self
            .with_retry(|| self.transport.init(&init_request))
            .await?;

        let chunk_size = if init.chunk_size > 0 {
            init.chunk_size
        } else {
            self.options.chunk_size
        };
        let total_chunks = init
            .total_chunks
            .unwrap_or_else(|| chunk_count(size, chunk_size));

        // Resumption is best-effort: a failed status query means a fresh,
        // non-resumed upload rather than an abort.
        let uploaded: BTreeSet<u32> = match self.transport.status(&init.upload_id).await {
            Ok(state) => state
                .uploaded_chunks
                .into_iter()
                .filter(|index| *index < total_chunks)
                .collect(),
            Err(e) => {
                tracing::debug!(error = %e, "Status query failed, assuming fresh upload");
                BTreeSet::new()
            }
        };

        let mut uploaded_bytes: u64 = uploaded
            .iter()
            .map(|&index| chunk_len(size, chunk_size, index))
            .sum();
        progress.report(uploaded_bytes, size);

        let mut file = fs::File::open(&request.path).await?;
        for index in 0..total_chunks {
            if uploaded.contains(&index) {
                continue;
            }

            let span = chunk_span(size, chunk_size, index);
            file.seek(SeekFrom::Start(span.offset)).await?;
            let mut buf = vec![0u8; span.len as usize];
            file.read_exact(&mut buf).await?;

            self.send_chunk_with_retry(&init.upload_id, index, Bytes::from(buf))
                .await?;

            uploaded_bytes += span.len;
            progress.report(uploaded_bytes, size);
        }

        let artifact = self
            .with_retry(|| self.transport.complete(&init.upload_id))
            .await?;
        tracing::info!(upload_id = %init.upload_id, path = %artifact.path, "Upload completed");
        Ok(artifact)
    }

    /// Send one chunk with up to `retry_limit` additional attempts.
    ///
    /// Before each retry the uploaded set is re-queried; if the index landed
    /// server-side despite a client-observed failure, it is not re-sent.
    async fn send_chunk_with_retry(
        &self,
        upload_id: &str,
        index: u32,
        data: Bytes,
    ) -> Result<(), ClientError> {
        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 {
                tokio::time::sleep(self.backoff(attempt)).await;
                if let Ok(state) = self.transport.status(upload_id).await
                    && state.uploaded_chunks.contains(&index)
                {
                    tracing::debug!(index, "Chunk already present server-side, skipping resend");
                    return Ok(());
                }
            }

            match self.transport.send_chunk(upload_id, index, data.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.options.retry_limit => {
                    tracing::warn!(index, attempt, error = %e, "Chunk upload failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Retry a wire call on transient failures with the same backoff policy.
    async fn with_retry<T, F, Fut>(&self, mut op: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, crate::error::TransportError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.options.retry_limit => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %e, "Request failed, retrying");
                    tokio::time::sleep(self.backoff(attempt)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Linear backoff: attempt `n` waits `n * retry_base_delay`.
    fn backoff(&self, attempt: u32) -> Duration {
        self.options.retry_base_delay * attempt
    }
}
