//! Session repository port — the external document store.
//!
//! The core never assumes a query language; only these four operations.

use async_trait::async_trait;
use haven_domain::{ChatSession, SessionId};
use thiserror::Error;

/// Errors from the persistence adapter.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Persistence failure: {0}")]
    Persistence(String),
}

/// Document-store adapter for chat sessions.
///
/// `upsert` must be repeat-safe for the same session id, and an
/// interrupted upsert must leave the previously committed state
/// readable.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get(&self, id: &SessionId) -> Result<Option<ChatSession>, RepositoryError>;

    async fn upsert(&self, session: &ChatSession) -> Result<(), RepositoryError>;

    async fn query(&self, owner_id: &str) -> Result<Vec<ChatSession>, RepositoryError>;

    async fn delete(&self, id: &SessionId) -> Result<(), RepositoryError>;
}
