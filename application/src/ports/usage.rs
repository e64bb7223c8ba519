//! Usage-counter store port.
//!
//! The substrate behind quota accounting. Guest counters live in a
//! client-local store with no cross-instance coordination (a soft
//! friction gate, not a security boundary); authenticated counters are
//! owned by the persistence layer and updated atomically.

use async_trait::async_trait;
use haven_domain::{Identity, UsageCounter};
use thiserror::Error;

/// Errors from the usage substrate.
#[derive(Error, Debug)]
pub enum UsageStoreError {
    #[error("Usage store unavailable: {0}")]
    Backend(String),
}

/// Store for per-identity usage counters.
///
/// Counters are created lazily: `load` for an unknown identity returns a
/// fresh counter rather than an error.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Read the identity's counter as last stored. Callers apply the
    /// tier's lazy window rollover themselves when only reading.
    async fn load(&self, identity: &Identity) -> Result<UsageCounter, UsageStoreError>;

    /// Record one consumed exchange and return the updated counter.
    ///
    /// Must be atomic per consumption for authenticated tiers —
    /// increment-and-check in one step, with the lazy window rollover
    /// applied inside the same critical section, so concurrent clients
    /// cannot both pass a stale check. The guest implementation is
    /// permitted to be racy.
    async fn record(&self, identity: &Identity) -> Result<UsageCounter, UsageStoreError>;
}
