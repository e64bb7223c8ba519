//! Incremental reply progress port.
//!
//! The coordinator reports each delta as the **full accumulated text so
//! far**, not the increment — consumers render by replacement, which
//! makes duplicate or re-delivered invocations idempotent.

/// Receives streaming reply progress.
pub trait DeltaSink: Send + Sync {
    fn on_delta(&self, full_text: &str);
}

/// Null sink: progress is discarded.
pub struct NoDeltaSink;

impl DeltaSink for NoDeltaSink {
    fn on_delta(&self, _full_text: &str) {}
}
