//! Quota gate.
//!
//! Decides whether a new exchange may start for a given identity, and
//! records consumption afterwards. `check` and `consume` are separate on
//! purpose: the caller checks before spending resources to open a
//! stream, and consumes only after a completed, non-errored turn — so a
//! request that dies on the network never charges quota.
//!
//! A denial is a normal control-flow result, not an error. Callers route
//! it to the upgrade/sign-up path, never the generic failure path.

use crate::ports::usage::{UsageStore, UsageStoreError};
use chrono::Utc;
use haven_domain::{Identity, Tier};
use std::sync::Arc;
use tracing::{debug, warn};

/// Why an exchange was not allowed to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// The guest's lifetime allowance is spent. This is a soft,
    /// client-trust-only friction gate — clearing local storage resets
    /// it, and that is accepted product behavior.
    GuestLimitReached,
    /// The free tier's daily allowance is spent. The window resets at
    /// the local-midnight boundary, detected lazily on the next check.
    DailyLimitReached,
}

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed,
    Denied(DenialReason),
}

/// Per-tier exchange limits. Premium is always unbounded.
#[derive(Debug, Clone, Copy)]
pub struct QuotaLimits {
    pub guest: u32,
    pub free_daily: u32,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            guest: 3,
            free_daily: 20,
        }
    }
}

/// Gate deciding whether an identity may start a new exchange.
pub struct QuotaGate {
    usage: Arc<dyn UsageStore>,
    limits: QuotaLimits,
}

impl QuotaGate {
    pub fn new(usage: Arc<dyn UsageStore>) -> Self {
        Self {
            usage,
            limits: QuotaLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: QuotaLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Check whether `identity` may start an exchange right now.
    ///
    /// Read-only: no counter is touched. Windowed tiers are evaluated
    /// against the lazily rolled-over counter, so an expired window
    /// admits the caller without any explicit reset call.
    pub async fn check(&self, identity: &Identity) -> Result<QuotaDecision, UsageStoreError> {
        let tier = identity.tier();
        let decision = match tier {
            Tier::Premium => QuotaDecision::Allowed,
            Tier::Guest => {
                let counter = self.usage.load(identity).await?;
                if counter.count < self.limits.guest {
                    QuotaDecision::Allowed
                } else {
                    QuotaDecision::Denied(DenialReason::GuestLimitReached)
                }
            }
            Tier::Free => {
                let counter = self
                    .usage
                    .load(identity)
                    .await?
                    .rolled_over(Tier::Free, Utc::now());
                if counter.count < self.limits.free_daily {
                    QuotaDecision::Allowed
                } else {
                    QuotaDecision::Denied(DenialReason::DailyLimitReached)
                }
            }
        };

        debug!(tier = %tier, ?decision, "quota check");
        Ok(decision)
    }

    /// Record one consumed exchange. Called only after a completed turn.
    ///
    /// The store applies rollover and increment atomically, so two
    /// clients racing on an authenticated counter cannot both bank a
    /// stale read. Premium is a no-op.
    pub async fn consume(&self, identity: &Identity) {
        if identity.tier() == Tier::Premium {
            return;
        }
        match self.usage.record(identity).await {
            Ok(counter) => debug!(tier = %identity.tier(), count = counter.count, "quota consumed"),
            // The turn already completed; losing the increment is
            // preferable to failing the exchange.
            Err(e) => warn!("failed to record quota consumption: {e}"),
        }
    }
}
