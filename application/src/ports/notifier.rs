//! Crisis notification port.
//!
//! Side channel for the out-of-band crisis signal. Notification is
//! fire-and-forget: it must never block or truncate reply delivery.

use haven_domain::ReplyMetadata;

/// Receives the crisis signal when a completed reply carries one.
pub trait CrisisNotifier: Send + Sync {
    fn notify(&self, metadata: &ReplyMetadata);
}

/// Null notifier: crisis signals are dropped.
pub struct NoCrisisNotifier;

impl CrisisNotifier for NoCrisisNotifier {
    fn notify(&self, _metadata: &ReplyMetadata) {}
}
