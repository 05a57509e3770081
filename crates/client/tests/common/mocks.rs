//! Scripted in-memory transport for driver tests.

use async_trait::async_trait;
use bytes::Bytes;
use depot_client::{ErrorKind, TransportError, UploadTransport};
use depot_core::chunk::chunk_count;
use depot_core::protocol::{
    FinalArtifact, InitUploadRequest, InitUploadResponse, UploadStatusResponse,
};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;

/// A scripted failure for one chunk-send attempt.
#[derive(Clone, Debug)]
pub struct ChunkFailure {
    /// Error kind to return.
    pub kind: ErrorKind,
    /// When true, the chunk is recorded server-side anyway, modeling an
    /// ambiguous network failure where the request actually landed.
    pub records_anyway: bool,
}

#[derive(Default)]
struct MockState {
    total_chunks: u32,
    uploaded: BTreeSet<u32>,
    chunks: HashMap<u32, Bytes>,
    completed: Option<FinalArtifact>,

    init_calls: u32,
    status_calls: u32,
    chunk_attempts: Vec<u32>,
    complete_calls: u32,

    fail_init: u32,
    fail_status: u32,
    chunk_failures: HashMap<u32, VecDeque<ChunkFailure>>,
}

/// In-memory upload server with injectable failures and call recording.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct MockTransport {
    chunk_size: u64,
    max_bytes: u64,
    omit_total_chunks: bool,
    state: Mutex<MockState>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self {
            chunk_size: depot_core::CHUNK_SIZE,
            max_bytes: depot_core::MAX_UPLOAD_BYTES,
            omit_total_chunks: false,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Use a non-default chunk size.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Leave total_chunks out of the init response, like an older server.
    pub fn omitting_total_chunks(mut self) -> Self {
        self.omit_total_chunks = true;
        self
    }

    /// Pretend these chunks already arrived in an earlier run.
    pub fn with_uploaded(self, indices: &[u32]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.uploaded.extend(indices.iter().copied());
            for &index in indices {
                state.chunks.insert(index, Bytes::new());
            }
        }
        self
    }

    /// Fail the next `times` sends of `index` with transient errors.
    pub fn failing_chunk(self, index: u32, times: u32) -> Self {
        self.failing_chunk_with(
            index,
            times,
            ChunkFailure {
                kind: ErrorKind::Transport,
                records_anyway: false,
            },
        )
    }

    /// Fail the next `times` sends of `index` with the given script.
    pub fn failing_chunk_with(self, index: u32, times: u32, failure: ChunkFailure) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let queue = state.chunk_failures.entry(index).or_default();
            for _ in 0..times {
                queue.push_back(failure.clone());
            }
        }
        self
    }

    /// Fail the next `times` status queries.
    pub fn failing_status(self, times: u32) -> Self {
        self.state.lock().unwrap().fail_status = times;
        self
    }

    /// Fail the next `times` init calls.
    pub fn failing_init(self, times: u32) -> Self {
        self.state.lock().unwrap().fail_init = times;
        self
    }

    pub fn init_calls(&self) -> u32 {
        self.state.lock().unwrap().init_calls
    }

    pub fn status_calls(&self) -> u32 {
        self.state.lock().unwrap().status_calls
    }

    /// Every send_chunk attempt, in order, by index.
    pub fn chunk_attempts(&self) -> Vec<u32> {
        self.state.lock().unwrap().chunk_attempts.clone()
    }

    pub fn complete_calls(&self) -> u32 {
        self.state.lock().unwrap().complete_calls
    }

    /// Reassemble what the server holds, in index order.
    pub fn assembled(&self) -> Vec<u8> {
        let state = self.state.lock().unwrap();
        let mut data = Vec::new();
        for index in 0..state.total_chunks {
            if let Some(chunk) = state.chunks.get(&index) {
                data.extend_from_slice(chunk);
            }
        }
        data
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UploadTransport for MockTransport {
    async fn init(&self, req: &InitUploadRequest) -> Result<InitUploadResponse, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.init_calls += 1;
        if state.fail_init > 0 {
            state.fail_init -= 1;
            return Err(TransportError::network("init: connection refused"));
        }
        state.total_chunks = chunk_count(req.size, self.chunk_size);
        Ok(InitUploadResponse {
            upload_id: "mock-upload".to_string(),
            chunk_size: self.chunk_size,
            total_chunks: if self.omit_total_chunks {
                None
            } else {
                Some(state.total_chunks)
            },
            max_bytes: self.max_bytes,
        })
    }

    async fn status(&self, upload_id: &str) -> Result<UploadStatusResponse, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.status_calls += 1;
        if state.fail_status > 0 {
            state.fail_status -= 1;
            return Err(TransportError::network("status: connection reset"));
        }
        Ok(UploadStatusResponse {
            upload_id: upload_id.to_string(),
            uploaded_chunks: state.uploaded.iter().copied().collect(),
            total_chunks: state.total_chunks,
            chunk_size: self.chunk_size,
        })
    }

    async fn send_chunk(
        &self,
        _upload_id: &str,
        index: u32,
        data: Bytes,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.chunk_attempts.push(index);

        if let Some(failure) = state
            .chunk_failures
            .get_mut(&index)
            .and_then(|queue| queue.pop_front())
        {
            if failure.records_anyway {
                state.uploaded.insert(index);
                state.chunks.insert(index, data);
            }
            return Err(TransportError {
                kind: failure.kind,
                message: format!("chunk {index}: scripted failure"),
            });
        }

        state.uploaded.insert(index);
        state.chunks.insert(index, data);
        Ok(())
    }

    async fn complete(&self, _upload_id: &str) -> Result<FinalArtifact, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.complete_calls += 1;

        if let Some(artifact) = &state.completed {
            return Ok(artifact.clone());
        }
        if (state.uploaded.len() as u32) < state.total_chunks {
            return Err(TransportError {
                kind: ErrorKind::IncompleteUpload,
                message: format!(
                    "{} chunk(s) missing",
                    state.total_chunks as usize - state.uploaded.len()
                ),
            });
        }
        let artifact = FinalArtifact {
            original_filename: "data.bin".to_string(),
            path: "files/mock-upload/data.bin".to_string(),
            url: None,
        };
        state.completed = Some(artifact.clone());
        Ok(artifact)
    }
}
