//! Usage-counter store adapters.
//!
//! [`InMemoryUsageStore`] keeps counters under one mutex and applies the
//! window rollover and increment inside the same critical section, so
//! concurrent callers cannot both pass a stale check.
//! [`LocalUsageStore`] persists guest counters as small JSON files; the
//! guest gate is a soft friction gate, so its read-modify-write is
//! deliberately unguarded.

use async_trait::async_trait;
use chrono::Utc;
use haven_application::ports::usage::{UsageStore, UsageStoreError};
use haven_domain::{Identity, UsageCounter};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

/// Counters held in memory, keyed by usage key.
#[derive(Default)]
pub struct InMemoryUsageStore {
    counters: Mutex<HashMap<String, UsageCounter>>,
}

impl InMemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    async fn load(&self, identity: &Identity) -> Result<UsageCounter, UsageStoreError> {
        let counters = self.counters.lock().expect("usage lock");
        Ok(counters
            .get(identity.usage_key())
            .cloned()
            .unwrap_or_else(|| UsageCounter::fresh(Utc::now())))
    }

    async fn record(&self, identity: &Identity) -> Result<UsageCounter, UsageStoreError> {
        let now = Utc::now();
        let mut counters = self.counters.lock().expect("usage lock");
        // Rollover and increment under the same lock.
        let current = counters
            .get(identity.usage_key())
            .cloned()
            .unwrap_or_else(|| UsageCounter::fresh(now));
        let updated = current.rolled_over(identity.tier(), now).incremented();
        counters.insert(identity.usage_key().to_string(), updated.clone());
        Ok(updated)
    }
}

/// Guest counters stored as one JSON file per install key.
///
/// No file locking: two instances of the same install racing each other
/// can overcount or undercount by one, which is acceptable for a
/// client-trust-only gate.
pub struct LocalUsageStore {
    dir: PathBuf,
}

impl LocalUsageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, identity: &Identity) -> PathBuf {
        self.dir.join(format!("usage-{}.json", identity.usage_key()))
    }

    async fn read_counter(&self, identity: &Identity) -> Result<UsageCounter, UsageStoreError> {
        match tokio::fs::read(self.path_for(identity)).await {
            Ok(bytes) => serde_json::from_slice(&bytes).or_else(|e| {
                // A corrupt counter file resets the count. Guests get the
                // benefit of the doubt.
                debug!("resetting unreadable usage counter: {e}");
                Ok(UsageCounter::fresh(Utc::now()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(UsageCounter::fresh(Utc::now()))
            }
            Err(e) => Err(UsageStoreError::Backend(e.to_string())),
        }
    }
}

#[async_trait]
impl UsageStore for LocalUsageStore {
    async fn load(&self, identity: &Identity) -> Result<UsageCounter, UsageStoreError> {
        self.read_counter(identity).await
    }

    async fn record(&self, identity: &Identity) -> Result<UsageCounter, UsageStoreError> {
        let now = Utc::now();
        let updated = self
            .read_counter(identity)
            .await?
            .rolled_over(identity.tier(), now)
            .incremented();

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| UsageStoreError::Backend(e.to_string()))?;
        let body = serde_json::to_vec(&updated)
            .map_err(|e| UsageStoreError::Backend(e.to_string()))?;
        tokio::fs::write(self.path_for(identity), body)
            .await
            .map_err(|e| UsageStoreError::Backend(e.to_string()))?;
        Ok(updated)
    }
}
