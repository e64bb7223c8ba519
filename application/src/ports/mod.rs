//! Ports (interfaces) for the application layer.
//!
//! These traits define what the exchange core needs from the outside
//! world — a reply-stream transport, a usage-counter substrate, a session
//! document store, the local continuity key, and the crisis/progress
//! side channels. Implementations (adapters) live in the infrastructure
//! layer; tests supply deterministic fakes.

pub mod continuity;
pub mod notifier;
pub mod repository;
pub mod sink;
pub mod transport;
pub mod usage;

pub use continuity::{ContinuityStore, NoContinuityStore};
pub use notifier::{CrisisNotifier, NoCrisisNotifier};
pub use repository::{RepositoryError, SessionRepository};
pub use sink::{DeltaSink, NoDeltaSink};
pub use transport::{
    ExchangeRequest, ExchangeTransport, ReplyStream, TransportError, WireMessage,
};
pub use usage::{UsageStore, UsageStoreError};
