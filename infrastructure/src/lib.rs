//! Infrastructure layer for haven.
//!
//! Concrete adapters behind the application ports: the HTTP exchange
//! transport and its reply-stream decoder, file and in-memory session
//! stores, usage counters, the continuity key, and the TOML
//! configuration loader.

pub mod config;
pub mod provider;
pub mod store;

pub use config::{ConfigError, ConfigLoader, FileConfig};
pub use provider::{HttpExchangeTransport, ReplyFrameStream};
pub use store::{
    FileContinuityStore, FileSessionRepository, InMemoryContinuityStore,
    InMemorySessionRepository, InMemoryUsageStore, LocalUsageStore,
};
