//! Typed events and results for one streamed exchange.
//!
//! [`ExchangeEvent`] is what the stream decoder yields: content deltas in
//! arrival order, then a single terminal [`Done`](ExchangeEvent::Done)
//! carrying optional reply metadata. [`ExchangeOutcome`] is the per-turn
//! result the coordinator folds those events into; it is discarded as soon
//! as it has been turned into a committed [`Message`](crate::Message).

use serde::{Deserialize, Serialize};

/// Metadata attached to the terminal frame of a reply stream.
///
/// Unknown fields on the wire are ignored. `is_crisis` is the out-of-band
/// crisis signal — it triggers a separate safety notification and never
/// alters or truncates the reply itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyMetadata {
    #[serde(default)]
    pub is_crisis: bool,
    #[serde(default)]
    pub risk_flags: Vec<String>,
}

/// One decoded event from a reply stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeEvent {
    /// An incremental fragment of the assistant reply.
    Delta(String),
    /// Terminal event. Nothing follows it within the same stream.
    Done(Option<ReplyMetadata>),
}

impl ExchangeEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExchangeEvent::Done(_))
    }
}

/// Accumulated result of one completed exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeOutcome {
    pub content: String,
    pub metadata: Option<ReplyMetadata>,
}

impl ExchangeOutcome {
    pub fn is_crisis(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| m.is_crisis)
    }
}

/// Requested reply tone, clamped to 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToneLevel(u8);

impl ToneLevel {
    pub fn new(level: u8) -> Self {
        Self(level.min(100))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for ToneLevel {
    fn default() -> Self {
        Self(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_is_terminal_delta_is_not() {
        assert!(ExchangeEvent::Done(None).is_terminal());
        assert!(!ExchangeEvent::Delta("hi".to_string()).is_terminal());
    }

    #[test]
    fn reply_metadata_ignores_unknown_fields() {
        let meta: ReplyMetadata =
            serde_json::from_str(r#"{"isCrisis":true,"confidence":0.9}"#).unwrap();
        assert!(meta.is_crisis);
        assert!(meta.risk_flags.is_empty());
    }

    #[test]
    fn outcome_crisis_flag() {
        let calm = ExchangeOutcome {
            content: "here".to_string(),
            metadata: None,
        };
        assert!(!calm.is_crisis());

        let flagged = ExchangeOutcome {
            content: "here".to_string(),
            metadata: Some(ReplyMetadata {
                is_crisis: true,
                risk_flags: vec![],
            }),
        };
        assert!(flagged.is_crisis());
    }

    #[test]
    fn tone_level_clamps() {
        assert_eq!(ToneLevel::new(250).value(), 100);
        assert_eq!(ToneLevel::default().value(), 50);
    }
}
