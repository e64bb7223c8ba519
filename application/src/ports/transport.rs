//! Exchange transport port.
//!
//! Defines how the coordinator reaches the opaque model provider: one
//! request opens exactly one reply stream, already decoded into typed
//! [`ExchangeEvent`]s. The wire framing (SSE lines, JSON frames) is an
//! infrastructure concern — application code only ever sees events.

use async_trait::async_trait;
use haven_domain::{CounselingMode, ExchangeEvent, Message, Role, ToneLevel};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors surfaced by the transport before or during a reply stream.
///
/// All of these arrive before `Done`, so none of them ever consumes
/// quota. `QuotaExhausted` maps the provider's sentinel error string —
/// the server-side quota check for authenticated tiers — and is routed
/// to the upgrade path rather than the generic failure path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network failure: {0}")]
    Network(String),

    #[error("No stream activity before the deadline")]
    Timeout,

    #[error("Provider failure (status {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Provider reports quota exhausted")]
    QuotaExhausted,
}

/// A role+content pair as sent to the provider. Internal message
/// metadata (risk flags, tone markers) never crosses this boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Request body for one exchange: the ordered prior messages with the
/// new user text already appended by the caller, plus mode, tone, and an
/// identity hint used only for server-side tier lookup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRequest {
    pub messages: Vec<WireMessage>,
    pub mode: CounselingMode,
    pub tone: ToneLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_hint: Option<String>,
}

/// Handle for receiving decoded events from one reply stream.
///
/// Wraps an `mpsc::Receiver`; the adapter's reader task feeds it and
/// drops the sender when the stream ends, so `recv` returning `None`
/// means the transport closed without a terminal event.
pub struct ReplyStream {
    receiver: mpsc::Receiver<Result<ExchangeEvent, TransportError>>,
}

impl ReplyStream {
    pub fn new(receiver: mpsc::Receiver<Result<ExchangeEvent, TransportError>>) -> Self {
        Self { receiver }
    }

    /// Build a stream from a fixed event script. Test helper — fakes use
    /// it to control event order without a transport.
    pub fn scripted(events: Vec<Result<ExchangeEvent, TransportError>>) -> Self {
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            // Capacity matches the script, so this cannot fail.
            let _ = tx.try_send(event);
        }
        Self { receiver: rx }
    }

    pub async fn recv(&mut self) -> Option<Result<ExchangeEvent, TransportError>> {
        self.receiver.recv().await
    }
}

/// Transport to the opaque model provider.
///
/// Exactly one stream per call; streams are not restartable. A fresh
/// request yields a fresh stream.
#[async_trait]
pub trait ExchangeTransport: Send + Sync {
    async fn open(&self, request: ExchangeRequest) -> Result<ReplyStream, TransportError>;
}
