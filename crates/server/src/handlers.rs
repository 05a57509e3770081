//! Upload control plane handlers.

use crate::error::{ApiError, ApiResult};
use crate::metrics::{
    ASSEMBLY_DURATION, BYTES_RECEIVED, CHUNK_MISMATCHES, CHUNKS_RECEIVED, SESSIONS_COMPLETED,
    SESSIONS_CREATED, SESSIONS_EXPIRED, SESSIONS_FAILED, SESSIONS_RESUMED,
};
use crate::sessions::{ResumeLookup, SessionHandle};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use depot_core::protocol::{
    FinalArtifact, InitUploadRequest, InitUploadResponse, UploadStatusResponse,
};
use depot_core::{SessionStatus, UploadId, UploadSession};
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;

/// Slack beyond the chunk size when reading chunk request bodies, so an
/// oversized payload is reported as a chunk mismatch rather than a body-read
/// failure.
const CHUNK_UPLOAD_BUFFER: usize = 1024;

/// GET /v1/health - liveness probe.
pub async fn health() -> StatusCode {
    StatusCode::OK
}

fn descriptor_response(meta: &UploadSession, max_bytes: u64) -> InitUploadResponse {
    InitUploadResponse {
        upload_id: meta.id.to_string(),
        chunk_size: meta.chunk_size,
        total_chunks: Some(meta.total_chunks),
        max_bytes,
    }
}

/// POST /v1/uploads - Create or resume an upload session.
#[tracing::instrument(skip_all)]
pub async fn init_upload(
    State(state): State<AppState>,
    Json(req): Json<InitUploadRequest>,
) -> ApiResult<(StatusCode, Json<InitUploadResponse>)> {
    // Validation happens before anything is stored, so a rejected init
    // leaves no trace.
    state.sessions.validate_init(&req)?;

    let now = OffsetDateTime::now_utc();
    let max_bytes = state.config.server.max_upload_bytes;

    // An init carrying the temp identifier of a live session with matching
    // parameters resumes that session instead of minting a new one.
    match state
        .sessions
        .lookup_resumable(&req, state.session_ttl(), now)
        .await
    {
        Some(ResumeLookup::Matching(handle)) => {
            handle.touch(now).await;
            SESSIONS_RESUMED.inc();
            tracing::info!(upload_id = %handle.meta.id, "Resumed existing upload session");
            return Ok((
                StatusCode::OK,
                Json(descriptor_response(&handle.meta, max_bytes)),
            ));
        }
        Some(ResumeLookup::Stale(old)) => {
            // Parameters changed or the session idled out: the client is
            // starting over. Drop the old session and its chunks first.
            state.chunks.purge(&old.meta.id).await?;
            state.sessions.remove(&old.meta.id);
            tracing::info!(upload_id = %old.meta.id, "Discarded stale session for temp identifier");
        }
        None => {}
    }

    let handle = state.sessions.create(&req, now)?;
    SESSIONS_CREATED.inc();
    tracing::info!(
        upload_id = %handle.meta.id,
        total_chunks = handle.meta.total_chunks,
        "Created upload session"
    );

    Ok((
        StatusCode::CREATED,
        Json(descriptor_response(&handle.meta, max_bytes)),
    ))
}

/// Fetch a live session, treating expired sessions as unknown.
///
/// A pending session past the inactivity window is reclaimed here lazily;
/// the background sweep is only a backstop.
async fn fetch_live_session(state: &AppState, upload_id: &str) -> ApiResult<Arc<SessionHandle>> {
    let id = UploadId::parse(upload_id).map_err(|e| ApiError::Validation(e.to_string()))?;
    let handle = state.sessions.get(&id).ok_or(ApiError::UnknownSession)?;

    let now = OffsetDateTime::now_utc();
    let status = handle.status().await;
    if status == SessionStatus::Expired {
        return Err(ApiError::UnknownSession);
    }
    if status == SessionStatus::Pending && handle.is_idle(state.session_ttl(), now).await {
        handle.mark_expired(now).await;
        state.chunks.purge(&id).await?;
        state.sessions.remove(&id);
        SESSIONS_EXPIRED.inc();
        tracing::info!(upload_id = %id, "Session expired after inactivity");
        return Err(ApiError::UnknownSession);
    }
    Ok(handle)
}

/// GET /v1/uploads/{upload_id} - Query upload state.
#[tracing::instrument(skip(state), fields(upload_id = %upload_id))]
pub async fn upload_status(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> ApiResult<Json<UploadStatusResponse>> {
    let handle = fetch_live_session(&state, &upload_id).await?;

    Ok(Json(UploadStatusResponse {
        upload_id: handle.meta.id.to_string(),
        uploaded_chunks: handle.uploaded_indices().await,
        total_chunks: handle.meta.total_chunks,
        chunk_size: handle.meta.chunk_size,
    }))
}

/// PUT /v1/uploads/{upload_id}/chunks/{index} - Upload one chunk.
#[tracing::instrument(skip(state, req), fields(upload_id = %upload_id, index = index))]
pub async fn upload_chunk(
    State(state): State<AppState>,
    Path((upload_id, index)): Path<(String, u32)>,
    req: Request,
) -> ApiResult<StatusCode> {
    let handle = fetch_live_session(&state, &upload_id).await?;

    let status = handle.status().await;
    if !status.is_active() {
        return Err(ApiError::Validation(format!(
            "upload session no longer accepts chunks (status: {status:?})"
        )));
    }

    let limit = state.config.server.chunk_size as usize + CHUNK_UPLOAD_BUFFER;
    let data = axum::body::to_bytes(req.into_body(), limit)
        .await
        .map_err(|e| ApiError::Validation(format!("failed to read chunk body: {e}")))?;
    let size = data.len() as u64;

    if let Err(e) = state.chunks.put(&handle.meta, index, data).await {
        if matches!(e, ApiError::ChunkMismatch(_)) {
            CHUNK_MISMATCHES.inc();
            tracing::warn!(upload_id = %handle.meta.id, index, error = %e, "Rejected chunk");
        }
        return Err(e);
    }

    let now = OffsetDateTime::now_utc();
    handle.record_chunk(index, now).await;
    CHUNKS_RECEIVED.inc();
    BYTES_RECEIVED.inc_by(size);

    tracing::debug!(
        upload_id = %handle.meta.id,
        index,
        size_bytes = size,
        "Chunk stored"
    );

    Ok(StatusCode::OK)
}

/// POST /v1/uploads/{upload_id}/complete - Assemble the final artifact.
#[tracing::instrument(skip(state), fields(upload_id = %upload_id))]
pub async fn complete_upload(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> ApiResult<Json<FinalArtifact>> {
    let handle = fetch_live_session(&state, &upload_id).await?;

    // Serialize completion per session: assembly runs at most once, and the
    // expiry sweep skips sessions while this lock is held.
    let _guard = handle.completion().lock().await;

    match handle.status().await {
        SessionStatus::Completed => {
            // Effectively idempotent: repeat completes return the cached
            // artifact without re-running assembly.
            return handle
                .artifact()
                .await
                .map(Json)
                .ok_or(ApiError::AlreadyCompleted);
        }
        SessionStatus::Failed => {
            return Err(ApiError::Assembly(
                "upload previously failed assembly".to_string(),
            ));
        }
        SessionStatus::Expired => return Err(ApiError::UnknownSession),
        SessionStatus::Pending => {}
    }

    let uploaded = handle.uploaded_count().await;
    let total = handle.meta.total_chunks as usize;
    if uploaded < total {
        return Err(ApiError::IncompleteUpload {
            missing: total - uploaded,
        });
    }

    let started = Instant::now();
    let now = OffsetDateTime::now_utc();
    let path = match state.assembler.assemble(&handle.meta).await {
        Ok(path) => path,
        Err(e) => {
            handle.mark_failed(now).await;
            SESSIONS_FAILED.inc();
            tracing::error!(upload_id = %handle.meta.id, error = %e, "Assembly failed");
            return Err(e);
        }
    };
    ASSEMBLY_DURATION.observe(started.elapsed().as_secs_f64());

    let artifact = FinalArtifact {
        original_filename: handle.meta.filename.clone(),
        path: path.clone(),
        url: state
            .config
            .server
            .public_base_url
            .as_ref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), path)),
    };

    handle.mark_completed(artifact.clone(), now).await;

    // Chunks are no longer needed once the artifact exists. A failed purge
    // leaves them for the expiry sweep.
    if let Err(e) = state.chunks.purge(&handle.meta.id).await {
        tracing::warn!(
            upload_id = %handle.meta.id,
            error = %e,
            "Failed to purge chunks after assembly"
        );
    }

    SESSIONS_COMPLETED.inc();
    tracing::info!(
        upload_id = %handle.meta.id,
        path = %artifact.path,
        "Upload completed"
    );

    Ok(Json(artifact))
}
