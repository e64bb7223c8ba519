//! Session domain entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed assistant opening line. Every new session starts with exactly
/// this message; a session holding only the greeting is a draft and is
/// never persisted.
pub const GREETING: &str =
    "Hi, I'm here to listen. Whatever is on your mind today, we can talk it through.";

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Risk annotations attached to an assistant message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    #[serde(default)]
    pub is_crisis: bool,
    #[serde(default)]
    pub risk_flags: Vec<String>,
    #[serde(default)]
    pub tone_markers: Vec<String>,
}

/// A message in a session. Immutable once appended; assistant content
/// only grows while a reply is still streaming, and that growth happens
/// on a working copy owned by the orchestrator, not on committed state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    pub fn assistant_with_metadata(
        content: impl Into<String>,
        metadata: Option<MessageMetadata>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            metadata,
        }
    }
}

/// Opaque session identifier, assigned by the store on first persist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counseling-mode tag carried by a session and sent with every exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounselingMode {
    /// Open-ended, reflective listening.
    #[default]
    Listening,
    /// More directive, suggestion-oriented replies.
    Guidance,
    /// Structured reflection prompts.
    Reflection,
}

impl fmt::Display for CounselingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounselingMode::Listening => write!(f, "listening"),
            CounselingMode::Guidance => write!(f, "guidance"),
            CounselingMode::Reflection => write!(f, "reflection"),
        }
    }
}

impl std::str::FromStr for CounselingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "listening" => Ok(CounselingMode::Listening),
            "guidance" => Ok(CounselingMode::Guidance),
            "reflection" => Ok(CounselingMode::Reflection),
            other => Err(format!("unknown counseling mode: {other}")),
        }
    }
}

/// A counseling chat session (Entity).
///
/// Created in memory as a draft holding only the greeting. `id` stays
/// `None` until the first successful persist — a session with zero
/// completed exchanges exists only in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Option<SessionId>,
    pub owner_id: Option<String>,
    /// Derived once from the first user message, never recomputed.
    pub title: Option<String>,
    pub messages: Vec<Message>,
    pub mode: CounselingMode,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// A fresh in-memory draft containing only the greeting.
    pub fn draft(mode: CounselingMode) -> Self {
        Self {
            id: None,
            owner_id: None,
            title: None,
            messages: vec![Message::assistant(GREETING)],
            mode,
            updated_at: Utc::now(),
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
        self.updated_at = Utc::now();
    }

    pub fn push_assistant(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// True once at least one exchange has completed — i.e. the log holds
    /// anything beyond the greeting-initiated draft's assistant opener
    /// with a user turn present.
    pub fn has_completed_exchange(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::User)
    }

    /// First user message, if any. Title derivation reads this.
    pub fn first_user_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.role == Role::User)
    }

    pub fn is_draft(&self) -> bool {
        self.id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_holds_only_the_greeting() {
        let session = ChatSession::draft(CounselingMode::default());
        assert!(session.is_draft());
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, Role::Assistant);
        assert_eq!(session.messages[0].content, GREETING);
        assert!(!session.has_completed_exchange());
    }

    #[test]
    fn completed_exchange_requires_a_user_turn() {
        let mut session = ChatSession::draft(CounselingMode::Listening);
        session.push_assistant(Message::assistant("extra"));
        assert!(!session.has_completed_exchange());

        session.push_user("hello");
        assert!(session.has_completed_exchange());
        assert_eq!(session.first_user_message().unwrap().content, "hello");
    }

    #[test]
    fn mode_round_trips_through_display_and_parse() {
        for mode in [
            CounselingMode::Listening,
            CounselingMode::Guidance,
            CounselingMode::Reflection,
        ] {
            let parsed: CounselingMode = mode.to_string().parse().unwrap();
            assert_eq!(parsed, mode);
        }
        assert!("therapy".parse::<CounselingMode>().is_err());
    }

    #[test]
    fn message_metadata_decodes_camel_case() {
        let meta: MessageMetadata =
            serde_json::from_str(r#"{"isCrisis":true,"riskFlags":["self-harm"]}"#).unwrap();
        assert!(meta.is_crisis);
        assert_eq!(meta.risk_flags, vec!["self-harm"]);
        assert!(meta.tone_markers.is_empty());
    }
}
