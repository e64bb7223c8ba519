//! Persistence adapters: sessions, continuity key, usage counters.

pub mod continuity;
pub mod sessions;
pub mod usage;

pub use continuity::{FileContinuityStore, InMemoryContinuityStore};
pub use sessions::{FileSessionRepository, InMemorySessionRepository};
pub use usage::{InMemoryUsageStore, LocalUsageStore};
