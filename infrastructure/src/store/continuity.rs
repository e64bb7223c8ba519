//! Continuity key adapters.
//!
//! The continuity key is one opaque session id in one small file.
//! Failures here degrade to "no resume", so every error is logged and
//! swallowed rather than propagated.

use async_trait::async_trait;
use haven_application::ports::continuity::ContinuityStore;
use haven_domain::SessionId;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// Continuity key persisted as a single file.
pub struct FileContinuityStore {
    path: PathBuf,
}

impl FileContinuityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ContinuityStore for FileContinuityStore {
    async fn load(&self) -> Option<SessionId> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let id = raw.trim();
                if id.is_empty() {
                    None
                } else {
                    Some(SessionId::new(id))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("failed to read continuity key: {e}");
                None
            }
        }
    }

    async fn save(&self, id: &SessionId) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("failed to create continuity dir: {e}");
                return;
            }
        }
        if let Err(e) = tokio::fs::write(&self.path, id.as_str()).await {
            warn!("failed to save continuity key: {e}");
        }
    }

    async fn clear(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("failed to clear continuity key: {e}"),
        }
    }
}

/// Ephemeral continuity store for tests and stateless runs.
#[derive(Default)]
pub struct InMemoryContinuityStore {
    current: Mutex<Option<SessionId>>,
}

impl InMemoryContinuityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContinuityStore for InMemoryContinuityStore {
    async fn load(&self) -> Option<SessionId> {
        self.current.lock().expect("continuity lock").clone()
    }

    async fn save(&self, id: &SessionId) {
        *self.current.lock().expect("continuity lock") = Some(id.clone());
    }

    async fn clear(&self) {
        *self.current.lock().expect("continuity lock") = None;
    }
}
