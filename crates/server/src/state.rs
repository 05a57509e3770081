//! Application state shared across handlers.

use crate::assemble::Assembler;
use crate::intake::ChunkStore;
use crate::sessions::{SessionLimits, SessionManager};
use depot_core::config::AppConfig;
use depot_storage::ObjectStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Object storage backend.
    pub storage: Arc<dyn ObjectStore>,
    /// Upload session registry.
    pub sessions: Arc<SessionManager>,
    /// Chunk store.
    pub chunks: Arc<ChunkStore>,
    /// Artifact assembler.
    pub assembler: Arc<Assembler>,
}

impl AppState {
    /// Create a new application state on top of a storage backend.
    pub fn new(config: AppConfig, storage: Arc<dyn ObjectStore>) -> Self {
        let sessions = Arc::new(SessionManager::new(SessionLimits {
            chunk_size: config.server.chunk_size,
            max_upload_bytes: config.server.max_upload_bytes,
        }));
        let chunks = Arc::new(ChunkStore::new(storage.clone()));
        let assembler = Arc::new(Assembler::new(storage.clone(), chunks.clone()));

        Self {
            config: Arc::new(config),
            storage,
            sessions,
            chunks,
            assembler,
        }
    }

    /// The session inactivity window.
    pub fn session_ttl(&self) -> time::Duration {
        let secs = i64::try_from(self.config.sweep.session_ttl_secs).unwrap_or(i64::MAX);
        time::Duration::seconds(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_storage::FilesystemBackend;
    use tempfile::tempdir;

    #[tokio::test]
    async fn state_wires_limits_from_config() {
        let temp = tempdir().unwrap();
        let storage: Arc<dyn ObjectStore> =
            Arc::new(FilesystemBackend::new(temp.path()).await.unwrap());

        let mut config = AppConfig::for_testing(temp.path());
        config.server.chunk_size = 1024;
        config.sweep.session_ttl_secs = 60;

        let state = AppState::new(config, storage);
        assert_eq!(state.sessions.limits().chunk_size, 1024);
        assert_eq!(state.session_ttl(), time::Duration::seconds(60));
    }
}
