//! Upload session registry.
//!
//! Sessions live in a sharded concurrent map keyed by upload ID, so
//! operations on different sessions never contend on a shared lock. Within a
//! session, the uploaded-index set sits behind its own lock and completion is
//! serialized by a dedicated mutex.

use crate::error::{ApiError, ApiResult};
use dashmap::DashMap;
use depot_core::protocol::{FinalArtifact, InitUploadRequest};
use depot_core::{SessionStatus, UploadId, UploadSession};
use std::collections::BTreeSet;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tokio::sync::{Mutex, RwLock};

/// Limits applied when creating sessions.
#[derive(Clone, Copy, Debug)]
pub struct SessionLimits {
    /// Chunk size assigned to every session.
    pub chunk_size: u64,
    /// Maximum declared upload size.
    pub max_upload_bytes: u64,
}

/// Mutable per-session state.
#[derive(Debug)]
struct SessionState {
    status: SessionStatus,
    uploaded: BTreeSet<u32>,
    last_activity_at: OffsetDateTime,
    artifact: Option<FinalArtifact>,
}

/// A live session: immutable descriptor plus concurrency-safe mutable state.
pub struct SessionHandle {
    /// Immutable session descriptor.
    pub meta: UploadSession,
    state: RwLock<SessionState>,
    /// Held for the whole of a complete call so assembly runs at most once
    /// per session and the expiry sweep never races an in-flight completion.
    completion: Mutex<()>,
}

impl SessionHandle {
    fn new(meta: UploadSession, now: OffsetDateTime) -> Self {
        Self {
            meta,
            state: RwLock::new(SessionState {
                status: SessionStatus::Pending,
                uploaded: BTreeSet::new(),
                last_activity_at: now,
                artifact: None,
            }),
            completion: Mutex::new(()),
        }
    }

    /// Current session status.
    pub async fn status(&self) -> SessionStatus {
        self.state.read().await.status
    }

    /// Chunk indices received so far, ascending.
    pub async fn uploaded_indices(&self) -> Vec<u32> {
        self.state.read().await.uploaded.iter().copied().collect()
    }

    /// Number of distinct chunk indices received.
    pub async fn uploaded_count(&self) -> usize {
        self.state.read().await.uploaded.len()
    }

    /// Record the arrival of a chunk. Re-submissions are no-ops for the set.
    pub async fn record_chunk(&self, index: u32, now: OffsetDateTime) {
        let mut state = self.state.write().await;
        state.uploaded.insert(index);
        state.last_activity_at = now;
    }

    /// Bump the activity timestamp without recording a chunk.
    pub async fn touch(&self, now: OffsetDateTime) {
        self.state.write().await.last_activity_at = now;
    }

    /// The cached final artifact, if the session completed.
    pub async fn artifact(&self) -> Option<FinalArtifact> {
        self.state.read().await.artifact.clone()
    }

    /// Transition to completed and cache the artifact for repeat completes.
    pub async fn mark_completed(&self, artifact: FinalArtifact, now: OffsetDateTime) {
        let mut state = self.state.write().await;
        state.status = SessionStatus::Completed;
        state.artifact = Some(artifact);
        state.last_activity_at = now;
    }

    /// Transition to failed after an assembly error.
    pub async fn mark_failed(&self, now: OffsetDateTime) {
        let mut state = self.state.write().await;
        state.status = SessionStatus::Failed;
        state.last_activity_at = now;
    }

    /// Transition to expired.
    pub async fn mark_expired(&self, now: OffsetDateTime) {
        let mut state = self.state.write().await;
        state.status = SessionStatus::Expired;
        state.last_activity_at = now;
    }

    /// Check whether the session has seen no activity for longer than `ttl`.
    pub async fn is_idle(&self, ttl: Duration, now: OffsetDateTime) -> bool {
        now - self.state.read().await.last_activity_at > ttl
    }

    /// The per-session completion lock.
    pub fn completion(&self) -> &Mutex<()> {
        &self.completion
    }
}

/// Outcome of an init-time lookup by temp identifier.
pub enum ResumeLookup {
    /// A live pending session with matching filename and size.
    Matching(Arc<SessionHandle>),
    /// A session under the same identifier that can no longer be resumed
    /// (parameters changed or it sat idle past the inactivity window).
    Stale(Arc<SessionHandle>),
}

/// Registry owning all live upload sessions.
pub struct SessionManager {
    limits: SessionLimits,
    sessions: DashMap<UploadId, Arc<SessionHandle>>,
    by_temp_identifier: DashMap<String, UploadId>,
}

impl SessionManager {
    /// Create an empty registry with the given limits.
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            limits,
            sessions: DashMap::new(),
            by_temp_identifier: DashMap::new(),
        }
    }

    /// The limits sessions are created under.
    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Validate an init request. Nothing is stored when this fails.
    pub fn validate_init(&self, req: &InitUploadRequest) -> ApiResult<()> {
        if req.filename.trim().is_empty() {
            return Err(ApiError::Validation("filename is required".to_string()));
        }
        if req.temp_identifier.trim().is_empty() {
            return Err(ApiError::Validation(
                "temp_identifier is required".to_string(),
            ));
        }
        if req.size == 0 {
            return Err(ApiError::Validation("size is required".to_string()));
        }
        if req.size > self.limits.max_upload_bytes {
            return Err(ApiError::Validation(format!(
                "declared size {} exceeds maximum upload size {}",
                req.size, self.limits.max_upload_bytes
            )));
        }
        Ok(())
    }

    /// Create and register a new session for a validated init request.
    pub fn create(
        &self,
        req: &InitUploadRequest,
        now: OffsetDateTime,
    ) -> ApiResult<Arc<SessionHandle>> {
        self.validate_init(req)?;

        let meta = UploadSession::new(
            req.filename.clone(),
            req.size,
            self.limits.chunk_size,
            req.mime_type.clone(),
            req.temp_identifier.clone(),
            now,
        );
        let handle = Arc::new(SessionHandle::new(meta, now));
        self.sessions.insert(handle.meta.id, handle.clone());
        self.by_temp_identifier
            .insert(req.temp_identifier.clone(), handle.meta.id);
        Ok(handle)
    }

    /// Look up a session to resume for an init request, by temp identifier.
    pub async fn lookup_resumable(
        &self,
        req: &InitUploadRequest,
        ttl: Duration,
        now: OffsetDateTime,
    ) -> Option<ResumeLookup> {
        let id = *self.by_temp_identifier.get(&req.temp_identifier)?;
        let handle = self.get(&id)?;

        if handle.status().await != SessionStatus::Pending {
            return None;
        }
        if handle.is_idle(ttl, now).await {
            return Some(ResumeLookup::Stale(handle));
        }
        let meta = &handle.meta;
        if meta.filename == req.filename && meta.size == req.size {
            Some(ResumeLookup::Matching(handle))
        } else {
            Some(ResumeLookup::Stale(handle))
        }
    }

    /// Get a session by ID.
    pub fn get(&self, id: &UploadId) -> Option<Arc<SessionHandle>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Remove a session from the registry.
    pub fn remove(&self, id: &UploadId) -> Option<Arc<SessionHandle>> {
        let removed = self.sessions.remove(id).map(|(_, handle)| handle);
        if let Some(handle) = &removed {
            // Drop the temp-identifier mapping only if it still points here;
            // a replacement session may have reused the identifier.
            self.by_temp_identifier
                .remove_if(&handle.meta.temp_identifier, |_, mapped| mapped == id);
        }
        removed
    }

    /// Snapshot of every live session, for the expiry sweep.
    pub fn handles(&self) -> Vec<Arc<SessionHandle>> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
