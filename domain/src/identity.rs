//! Caller identity and usage accounting.
//!
//! - [`Tier`] — guest / free / premium classification
//! - [`Identity`] — who is asking: an anonymous install or an
//!   authenticated principal
//! - [`UsageCounter`] — rolling exchange count with lazy window reset

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quota tier governing how many exchanges an identity may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Anonymous visitor. Quota is a fixed lifetime allowance per
    /// browser install, consumed rather than windowed.
    Guest,
    /// Authenticated, unpaid. Quota resets at the local-midnight
    /// boundary, detected lazily on the next check.
    Free,
    /// Paid. Unbounded.
    Premium,
}

impl Tier {
    /// Default exchange limit for the tier. `None` means unbounded.
    pub fn default_limit(&self) -> Option<u32> {
        match self {
            Tier::Guest => Some(3),
            Tier::Free => Some(20),
            Tier::Premium => None,
        }
    }

    /// Whether the tier's counter resets on a daily window boundary.
    pub fn windowed(&self) -> bool {
        matches!(self, Tier::Free)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Guest => write!(f, "guest"),
            Tier::Free => write!(f, "free"),
            Tier::Premium => write!(f, "premium"),
        }
    }
}

/// The caller of an exchange.
///
/// Guests carry only a process-local install key — there is no durable
/// principal behind them. Authenticated identities map to a principal id
/// and are either free or premium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identity {
    Guest {
        /// Opaque per-install key, local to the client. Not a secret and
        /// not verified anywhere.
        install_key: String,
    },
    Authenticated {
        principal_id: String,
        tier: Tier,
    },
}

impl Identity {
    pub fn guest(install_key: impl Into<String>) -> Self {
        Identity::Guest {
            install_key: install_key.into(),
        }
    }

    pub fn free(principal_id: impl Into<String>) -> Self {
        Identity::Authenticated {
            principal_id: principal_id.into(),
            tier: Tier::Free,
        }
    }

    pub fn premium(principal_id: impl Into<String>) -> Self {
        Identity::Authenticated {
            principal_id: principal_id.into(),
            tier: Tier::Premium,
        }
    }

    pub fn tier(&self) -> Tier {
        match self {
            Identity::Guest { .. } => Tier::Guest,
            Identity::Authenticated { tier, .. } => *tier,
        }
    }

    /// Key under which this identity's usage counter is stored.
    pub fn usage_key(&self) -> &str {
        match self {
            Identity::Guest { install_key } => install_key,
            Identity::Authenticated { principal_id, .. } => principal_id,
        }
    }

    /// Principal id sent to the provider for server-side tier lookup.
    /// Guests have none.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Identity::Guest { .. } => None,
            Identity::Authenticated { principal_id, .. } => Some(principal_id),
        }
    }

    /// Owner id under which sessions are persisted. Guest sessions are
    /// keyed by install key so they survive reloads on the same install.
    pub fn owner_id(&self) -> &str {
        self.usage_key()
    }
}

/// Rolling exchange count for one identity.
///
/// The counter never enforces anything by itself — the quota gate reads
/// it, applies the tier limit, and decides. `window_start` only matters
/// for windowed tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    pub count: u32,
    pub window_start: DateTime<Utc>,
}

impl UsageCounter {
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    /// True when a windowed tier's counter has crossed the local-midnight
    /// boundary since `window_start`. Never true for unwindowed tiers.
    pub fn window_expired(&self, tier: Tier, now: DateTime<Utc>) -> bool {
        tier.windowed()
            && now.with_timezone(&Local).date_naive()
                > self.window_start.with_timezone(&Local).date_naive()
    }

    /// The counter as it stands at `now`: reset if the window has rolled
    /// over, unchanged otherwise. No storage is touched — resets are
    /// applied lazily by whoever persists the result.
    pub fn rolled_over(&self, tier: Tier, now: DateTime<Utc>) -> UsageCounter {
        if self.window_expired(tier, now) {
            UsageCounter::fresh(now)
        } else {
            self.clone()
        }
    }

    pub fn incremented(&self) -> UsageCounter {
        UsageCounter {
            count: self.count + 1,
            window_start: self.window_start,
        }
    }
}
