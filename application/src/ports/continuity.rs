//! Local continuity key port.
//!
//! A single opaque session id persisted client-side so a reload can
//! resume the last session. Absence means "nothing to resume", never an
//! error; storage failures are the adapter's to log, not the caller's to
//! handle.

use async_trait::async_trait;
use haven_domain::SessionId;

/// Store for the current-session continuity key.
#[async_trait]
pub trait ContinuityStore: Send + Sync {
    async fn load(&self) -> Option<SessionId>;

    async fn save(&self, id: &SessionId);

    async fn clear(&self);
}

/// Null continuity store: never resumes, forgets everything.
pub struct NoContinuityStore;

#[async_trait]
impl ContinuityStore for NoContinuityStore {
    async fn load(&self) -> Option<SessionId> {
        None
    }

    async fn save(&self, _id: &SessionId) {}

    async fn clear(&self) {}
}
