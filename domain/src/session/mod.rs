//! Chat session domain.
//!
//! - [`entities::ChatSession`] — the durable, ordered log of turns
//! - [`entities::Message`] — a single message within a session
//! - [`title::session_title_from`] — title derivation from the first user
//!   message

pub mod entities;
pub mod title;
