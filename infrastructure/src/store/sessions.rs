//! Session repository adapters.
//!
//! [`InMemorySessionRepository`] backs tests and ephemeral runs;
//! [`FileSessionRepository`] keeps one JSON document per session and
//! upserts through a temp-file rename, so a process killed mid-commit
//! leaves the previously committed document readable.

use async_trait::async_trait;
use haven_application::ports::repository::{RepositoryError, SessionRepository};
use haven_domain::{ChatSession, SessionId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Ephemeral repository: a mutex-guarded map.
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: Mutex<HashMap<SessionId, ChatSession>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn get(&self, id: &SessionId) -> Result<Option<ChatSession>, RepositoryError> {
        Ok(self.sessions.lock().expect("repository lock").get(id).cloned())
    }

    async fn upsert(&self, session: &ChatSession) -> Result<(), RepositoryError> {
        let id = session
            .id
            .clone()
            .ok_or_else(|| RepositoryError::Persistence("session has no id".to_string()))?;
        self.sessions
            .lock()
            .expect("repository lock")
            .insert(id, session.clone());
        Ok(())
    }

    async fn query(&self, owner_id: &str) -> Result<Vec<ChatSession>, RepositoryError> {
        Ok(self
            .sessions
            .lock()
            .expect("repository lock")
            .values()
            .filter(|s| s.owner_id.as_deref() == Some(owner_id))
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), RepositoryError> {
        self.sessions.lock().expect("repository lock").remove(id);
        Ok(())
    }
}

/// One JSON file per session under a data directory.
pub struct FileSessionRepository {
    dir: PathBuf,
}

impl FileSessionRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.json", id.as_str()))
    }

    fn io_error(context: &str, error: impl std::fmt::Display) -> RepositoryError {
        RepositoryError::Persistence(format!("{context}: {error}"))
    }

    async fn read_session(path: &Path) -> Result<Option<ChatSession>, RepositoryError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let session = serde_json::from_slice(&bytes)
                    .map_err(|e| Self::io_error("corrupt session document", e))?;
                Ok(Some(session))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error("failed to read session", e)),
        }
    }
}

#[async_trait]
impl SessionRepository for FileSessionRepository {
    async fn get(&self, id: &SessionId) -> Result<Option<ChatSession>, RepositoryError> {
        Self::read_session(&self.path_for(id)).await
    }

    async fn upsert(&self, session: &ChatSession) -> Result<(), RepositoryError> {
        let id = session
            .id
            .clone()
            .ok_or_else(|| RepositoryError::Persistence("session has no id".to_string()))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Self::io_error("failed to create data dir", e))?;

        let body = serde_json::to_vec_pretty(session)
            .map_err(|e| Self::io_error("failed to encode session", e))?;

        // Write-then-rename: the previous document stays intact until
        // the new one is fully on disk.
        let target = self.path_for(&id);
        let staging = self.dir.join(format!("{}.json.tmp", id.as_str()));
        tokio::fs::write(&staging, &body)
            .await
            .map_err(|e| Self::io_error("failed to stage session", e))?;
        tokio::fs::rename(&staging, &target)
            .await
            .map_err(|e| Self::io_error("failed to commit session", e))?;

        debug!(session = %id, "session document written");
        Ok(())
    }

    async fn query(&self, owner_id: &str) -> Result<Vec<ChatSession>, RepositoryError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(Self::io_error("failed to list sessions", e)),
        };

        let mut sessions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Self::io_error("failed to list sessions", e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_session(&path).await {
                Ok(Some(session)) if session.owner_id.as_deref() == Some(owner_id) => {
                    sessions.push(session);
                }
                Ok(_) => {}
                // One unreadable document should not hide the rest.
                Err(e) => warn!("skipping unreadable session document: {e}"),
            }
        }
        Ok(sessions)
    }

    async fn delete(&self, id: &SessionId) -> Result<(), RepositoryError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error("failed to delete session", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_domain::{CounselingMode, Message};

    fn committed_session(id: &str, owner: &str, text: &str) -> ChatSession {
        let mut session = ChatSession::draft(CounselingMode::Listening);
        session.push_user(text);
        session.push_assistant(Message::assistant("a reply"));
        session.id = Some(SessionId::new(id));
        session.owner_id = Some(owner.to_string());
        session
    }

    #[tokio::test]
    async fn file_repository_round_trips_a_session() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileSessionRepository::new(dir.path());
        let session = committed_session("s-1", "alice", "hello");

        repository.upsert(&session).await.unwrap();

        let loaded = repository
            .get(&SessionId::new("s-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.messages.len(), 3);
        assert_eq!(loaded.owner_id.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn get_absent_session_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileSessionRepository::new(dir.path());
        assert!(
            repository
                .get(&SessionId::new("missing"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn upsert_replaces_the_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileSessionRepository::new(dir.path());
        let mut session = committed_session("s-2", "alice", "first");

        repository.upsert(&session).await.unwrap();
        session.push_user("second");
        session.push_assistant(Message::assistant("another reply"));
        repository.upsert(&session).await.unwrap();

        let loaded = repository
            .get(&SessionId::new("s-2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.messages.len(), 5);

        // No staging leftovers after a completed upsert.
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            assert_ne!(
                entry.path().extension().and_then(|e| e.to_str()),
                Some("tmp")
            );
        }
    }

    #[tokio::test]
    async fn interrupted_stage_leaves_previous_state_readable() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileSessionRepository::new(dir.path());
        let session = committed_session("s-3", "alice", "hello");
        repository.upsert(&session).await.unwrap();

        // Simulate a crash mid-commit: a stale staging file is lying
        // around but the committed document was never replaced.
        tokio::fs::write(dir.path().join("s-3.json.tmp"), b"{half a docu")
            .await
            .unwrap();

        let loaded = repository
            .get(&SessionId::new("s-3"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.messages.len(), 3);
    }

    #[tokio::test]
    async fn query_filters_by_owner_and_skips_noise() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileSessionRepository::new(dir.path());
        repository
            .upsert(&committed_session("s-4", "alice", "mine"))
            .await
            .unwrap();
        repository
            .upsert(&committed_session("s-5", "bob", "his"))
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("junk.json"), b"not a session")
            .await
            .unwrap();

        let sessions = repository.query("alice").await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, Some(SessionId::new("s-4")));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileSessionRepository::new(dir.path());
        repository
            .upsert(&committed_session("s-6", "alice", "bye"))
            .await
            .unwrap();

        repository.delete(&SessionId::new("s-6")).await.unwrap();
        repository.delete(&SessionId::new("s-6")).await.unwrap();
        assert!(
            repository
                .get(&SessionId::new("s-6"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn in_memory_repository_round_trips() {
        let repository = InMemorySessionRepository::new();
        let session = committed_session("s-7", "alice", "hello");
        repository.upsert(&session).await.unwrap();

        assert!(
            repository
                .get(&SessionId::new("s-7"))
                .await
                .unwrap()
                .is_some()
        );
        assert_eq!(repository.query("alice").await.unwrap().len(), 1);
        repository.delete(&SessionId::new("s-7")).await.unwrap();
        assert!(
            repository
                .get(&SessionId::new("s-7"))
                .await
                .unwrap()
                .is_none()
        );
    }
}
