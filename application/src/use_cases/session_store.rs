//! Session store — draft, commit, resume, title lifecycle.
//!
//! Owns the rules around session identity: drafts exist only in memory,
//! ids are assigned on the first successful commit, titles derive from
//! the first user message exactly once, and a greeting-only draft is
//! never persistence-worthy.

use crate::ports::repository::{RepositoryError, SessionRepository};
use haven_domain::{
    ChatSession, CounselingMode, Identity, Message, SessionId, session_title_from,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Errors from session persistence.
#[derive(Error, Debug)]
pub enum SessionStoreError {
    /// A draft with zero completed exchanges was offered for commit.
    /// The greeting alone is not persistence-worthy.
    #[error("Refusing to persist a session with no completed exchange")]
    EmptyDraft,

    #[error(transparent)]
    Persistence(#[from] RepositoryError),
}

/// Service owning the ordered message log and its lifecycle.
pub struct SessionStore {
    repository: Arc<dyn SessionRepository>,
}

impl SessionStore {
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self { repository }
    }

    /// A fresh in-memory draft holding only the greeting. Nothing is
    /// persisted.
    pub fn create_draft(&self, mode: CounselingMode) -> ChatSession {
        ChatSession::draft(mode)
    }

    /// Append a user turn. The session title derives from the first
    /// user message, assigned here exactly once and never recomputed.
    pub fn append_user_turn(&self, session: &mut ChatSession, text: &str) {
        if session.title.is_none() {
            session.title = Some(session_title_from(text));
        }
        session.push_user(text);
    }

    pub fn append_assistant_turn(&self, session: &mut ChatSession, message: Message) {
        session.push_assistant(message);
    }

    /// Persist the session. The first commit assigns an id and the owner;
    /// later commits upsert under the same id, so calling this repeatedly
    /// for one session is safe.
    pub async fn commit(
        &self,
        session: &mut ChatSession,
        owner: &Identity,
    ) -> Result<SessionId, SessionStoreError> {
        if !session.has_completed_exchange() {
            return Err(SessionStoreError::EmptyDraft);
        }

        let id = match session.id.clone() {
            Some(id) => id,
            None => {
                let id = SessionId::new(Uuid::new_v4().to_string());
                session.id = Some(id.clone());
                session.owner_id = Some(owner.owner_id().to_string());
                info!(session = %id, "assigning id on first commit");
                id
            }
        };

        self.repository.upsert(session).await?;
        debug!(session = %id, messages = session.messages.len(), "session committed");
        Ok(id)
    }

    /// Read a persisted session back. `None` means absent, not failure.
    pub async fn resume(&self, id: &SessionId) -> Result<Option<ChatSession>, SessionStoreError> {
        Ok(self.repository.get(id).await?)
    }

    /// All persisted sessions for an owner, most recently updated first.
    pub async fn list(&self, owner_id: &str) -> Result<Vec<ChatSession>, SessionStoreError> {
        let mut sessions = self.repository.query(owner_id).await?;
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    pub async fn remove(&self, id: &SessionId) -> Result<(), SessionStoreError> {
        Ok(self.repository.delete(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use haven_domain::GREETING;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeRepository {
        sessions: Mutex<HashMap<SessionId, ChatSession>>,
        fail_upserts: Mutex<bool>,
    }

    impl FakeRepository {
        fn new() -> Self {
            Self {
                sessions: Mutex::new(HashMap::new()),
                fail_upserts: Mutex::new(false),
            }
        }
    }

    #[async_trait]
    impl SessionRepository for FakeRepository {
        async fn get(&self, id: &SessionId) -> Result<Option<ChatSession>, RepositoryError> {
            Ok(self.sessions.lock().unwrap().get(id).cloned())
        }

        async fn upsert(&self, session: &ChatSession) -> Result<(), RepositoryError> {
            if *self.fail_upserts.lock().unwrap() {
                return Err(RepositoryError::Persistence("backend down".to_string()));
            }
            let id = session.id.clone().expect("upsert requires an id");
            self.sessions.lock().unwrap().insert(id, session.clone());
            Ok(())
        }

        async fn query(&self, owner_id: &str) -> Result<Vec<ChatSession>, RepositoryError> {
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .values()
                .filter(|s| s.owner_id.as_deref() == Some(owner_id))
                .cloned()
                .collect())
        }

        async fn delete(&self, id: &SessionId) -> Result<(), RepositoryError> {
            self.sessions.lock().unwrap().remove(id);
            Ok(())
        }
    }

    fn store() -> (SessionStore, Arc<FakeRepository>) {
        let repository = Arc::new(FakeRepository::new());
        (SessionStore::new(repository.clone()), repository)
    }

    #[tokio::test]
    async fn greeting_only_draft_is_never_committed() {
        let (store, repository) = store();
        let mut session = store.create_draft(CounselingMode::default());

        let result = store.commit(&mut session, &Identity::guest("g")).await;

        assert!(matches!(result, Err(SessionStoreError::EmptyDraft)));
        assert!(session.id.is_none());
        assert!(repository.sessions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn draft_is_not_resumable_after_reload() {
        let (store, _repository) = store();
        let session = store.create_draft(CounselingMode::default());
        assert!(session.is_draft());

        // Simulated reload: nothing was committed, so there is no id to
        // resume by — and probing any id finds nothing.
        let found = store
            .resume(&SessionId::new("never-assigned"))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn first_commit_assigns_id_and_owner() {
        let (store, _repository) = store();
        let identity = Identity::free("user-1");
        let mut session = store.create_draft(CounselingMode::Listening);
        store.append_user_turn(&mut session, "I feel anxious today");
        store.append_assistant_turn(&mut session, Message::assistant("I hear you."));

        let id = store.commit(&mut session, &identity).await.unwrap();

        assert_eq!(session.id.as_ref(), Some(&id));
        assert_eq!(session.owner_id.as_deref(), Some("user-1"));

        let resumed = store.resume(&id).await.unwrap().unwrap();
        assert_eq!(resumed.messages.len(), 3);
        assert_eq!(resumed.messages[0].content, GREETING);
    }

    #[tokio::test]
    async fn recommit_keeps_the_same_id() {
        let (store, _repository) = store();
        let identity = Identity::free("user-2");
        let mut session = store.create_draft(CounselingMode::Listening);
        store.append_user_turn(&mut session, "first");
        store.append_assistant_turn(&mut session, Message::assistant("reply one"));

        let first = store.commit(&mut session, &identity).await.unwrap();

        store.append_user_turn(&mut session, "second");
        store.append_assistant_turn(&mut session, Message::assistant("reply two"));
        let second = store.commit(&mut session, &identity).await.unwrap();

        assert_eq!(first, second);
        let resumed = store.resume(&first).await.unwrap().unwrap();
        assert_eq!(resumed.messages.len(), 5);
    }

    #[tokio::test]
    async fn title_derives_once_from_first_user_message() {
        let (store, _repository) = store();
        let mut session = store.create_draft(CounselingMode::Listening);

        store.append_user_turn(&mut session, "I feel anxious today");
        assert_eq!(session.title.as_deref(), Some("I feel anxious today"));

        store.append_user_turn(&mut session, "something completely different");
        assert_eq!(session.title.as_deref(), Some("I feel anxious today"));
    }

    #[tokio::test]
    async fn failed_commit_leaves_previous_state_readable() {
        let (store, repository) = store();
        let identity = Identity::free("user-3");
        let mut session = store.create_draft(CounselingMode::Listening);
        store.append_user_turn(&mut session, "first");
        store.append_assistant_turn(&mut session, Message::assistant("reply"));
        let id = store.commit(&mut session, &identity).await.unwrap();

        *repository.fail_upserts.lock().unwrap() = true;
        store.append_user_turn(&mut session, "second");
        store.append_assistant_turn(&mut session, Message::assistant("reply two"));
        let result = store.commit(&mut session, &identity).await;
        assert!(matches!(result, Err(SessionStoreError::Persistence(_))));

        // The previously committed state is still what the store holds.
        let resumed = store.resume(&id).await.unwrap().unwrap();
        assert_eq!(resumed.messages.len(), 3);
    }

    #[tokio::test]
    async fn list_orders_by_recency_and_filters_by_owner() {
        let (store, _repository) = store();
        let alice = Identity::free("alice");
        let bob = Identity::free("bob");

        let mut first = store.create_draft(CounselingMode::Listening);
        store.append_user_turn(&mut first, "older");
        store.append_assistant_turn(&mut first, Message::assistant("r"));
        store.commit(&mut first, &alice).await.unwrap();

        let mut second = store.create_draft(CounselingMode::Listening);
        store.append_user_turn(&mut second, "newer");
        store.append_assistant_turn(&mut second, Message::assistant("r"));
        store.commit(&mut second, &alice).await.unwrap();

        let mut other = store.create_draft(CounselingMode::Listening);
        store.append_user_turn(&mut other, "bob's");
        store.append_assistant_turn(&mut other, Message::assistant("r"));
        store.commit(&mut other, &bob).await.unwrap();

        let sessions = store.list("alice").await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].title.as_deref(), Some("newer"));
    }
}
