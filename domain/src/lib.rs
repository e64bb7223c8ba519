//! Domain layer for haven.
//!
//! Core entities and value objects for the streamed counseling-chat
//! exchange core: identities and usage counters, chat sessions and
//! messages, and the typed events a reply stream decodes into.
//!
//! This crate has no knowledge of transports, persistence, or rendering —
//! those live behind ports in `haven-application` and adapters in
//! `haven-infrastructure`.

pub mod exchange;
pub mod identity;
pub mod session;

pub use exchange::{ExchangeEvent, ExchangeOutcome, ReplyMetadata, ToneLevel};
pub use identity::{Identity, Tier, UsageCounter};
pub use session::entities::{
    ChatSession, CounselingMode, GREETING, Message, MessageMetadata, Role, SessionId,
};
pub use session::title::session_title_from;
