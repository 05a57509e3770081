//! Session expiry sweep.
//!
//! A background task periodically reclaims sessions with no chunk activity
//! inside the inactivity window: their chunk blobs are purged and the session
//! record dropped. Completed sessions keep their record (for idempotent
//! repeat completes) until the same window elapses. A session whose
//! completion lock is held is never touched.

use crate::metrics::SESSIONS_EXPIRED;
use crate::state::AppState;
use depot_core::SessionStatus;
use time::OffsetDateTime;
use tokio::task::JoinHandle;

/// Spawn the periodic sweep task.
pub fn spawn_sweeper(state: AppState) -> JoinHandle<()> {
    let interval = state.config.sweep.sweep_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so a fresh server does
        // not sweep before serving anything.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let swept = run_sweep(&state).await;
            if swept > 0 {
                tracing::info!(swept, "Expiry sweep reclaimed sessions");
            }
        }
    })
}

/// One sweep pass. Returns the number of sessions reclaimed.
pub async fn run_sweep(state: &AppState) -> usize {
    let ttl = state.session_ttl();
    let now = OffsetDateTime::now_utc();
    let mut swept = 0;

    for handle in state.sessions.handles() {
        // Never reclaim a session mid-completion.
        let Ok(_guard) = handle.completion().try_lock() else {
            continue;
        };

        let status = handle.status().await;
        if !handle.is_idle(ttl, now).await && status != SessionStatus::Expired {
            continue;
        }

        match status {
            SessionStatus::Pending | SessionStatus::Failed => {
                handle.mark_expired(now).await;
                if let Err(e) = state.chunks.purge(&handle.meta.id).await {
                    // Leave the record; the next sweep retries the purge.
                    tracing::warn!(
                        upload_id = %handle.meta.id,
                        error = %e,
                        "Failed to purge chunks for idle session"
                    );
                    continue;
                }
                state.sessions.remove(&handle.meta.id);
                if status == SessionStatus::Pending {
                    SESSIONS_EXPIRED.inc();
                }
                tracing::info!(upload_id = %handle.meta.id, ?status, "Reclaimed idle session");
                swept += 1;
            }
            SessionStatus::Completed => {
                // Chunks were already purged at completion; drop the record.
                state.sessions.remove(&handle.meta.id);
                swept += 1;
            }
            SessionStatus::Expired => {
                // Left over from a lazy-expiry pass that failed to purge.
                if state.chunks.purge(&handle.meta.id).await.is_ok() {
                    state.sessions.remove(&handle.meta.id);
                    swept += 1;
                }
            }
        }
    }
    swept
}
