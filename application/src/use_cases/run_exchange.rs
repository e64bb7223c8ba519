//! Run Exchange use case — the exchange coordinator.
//!
//! Orchestrates one request/response turn: quota check, one transport
//! stream, folding decoded events into a growing reply, quota
//! consumption on completion, and the crisis side channel.
//!
//! Progress is reported through a [`DeltaSink`] as the full accumulated
//! text so far, never the raw increment.

use crate::ports::notifier::CrisisNotifier;
use crate::ports::sink::DeltaSink;
use crate::ports::transport::{
    ExchangeRequest, ExchangeTransport, ReplyStream, TransportError, WireMessage,
};
use crate::use_cases::quota_gate::{DenialReason, QuotaDecision, QuotaGate};
use haven_domain::{
    CounselingMode, ExchangeEvent, ExchangeOutcome, Identity, Message, ToneLevel,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// How long the coordinator waits between stream events before giving
/// up. A design knob, not a wire contract.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from one exchange attempt.
///
/// `Denied` is expected control flow (upgrade path). Everything else is
/// a pre-completion transport failure: no quota was consumed and the
/// session log was never touched.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Exchange denied by quota gate")]
    Denied(DenialReason),

    #[error("Network failure: {0}")]
    Network(String),

    #[error("Stream stalled past the timeout")]
    Timeout,

    #[error("Provider failure (status {status}): {message}")]
    Upstream { status: u16, message: String },
}

impl ExchangeError {
    fn from_transport(error: TransportError) -> Self {
        match error {
            TransportError::Network(msg) => ExchangeError::Network(msg),
            TransportError::Timeout => ExchangeError::Timeout,
            TransportError::Upstream { status, message } => {
                ExchangeError::Upstream { status, message }
            }
            // The provider's quota sentinel is still a denial — it goes
            // to the upgrade path, not the failure path.
            TransportError::QuotaExhausted => {
                ExchangeError::Denied(DenialReason::DailyLimitReached)
            }
        }
    }
}

/// Input for [`RunExchangeUseCase`].
#[derive(Debug, Clone)]
pub struct RunExchangeInput {
    /// Completed turns only — optimistic placeholders never ride along.
    pub prior_messages: Vec<Message>,
    pub user_text: String,
    pub mode: CounselingMode,
    pub tone: ToneLevel,
    pub identity: Identity,
}

/// Coordinates one streamed exchange.
pub struct RunExchangeUseCase {
    quota: Arc<QuotaGate>,
    transport: Arc<dyn ExchangeTransport>,
    crisis: Arc<dyn CrisisNotifier>,
    stall_timeout: Duration,
}

impl RunExchangeUseCase {
    pub fn new(
        quota: Arc<QuotaGate>,
        transport: Arc<dyn ExchangeTransport>,
        crisis: Arc<dyn CrisisNotifier>,
    ) -> Self {
        Self {
            quota,
            transport,
            crisis,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }

    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Execute one turn.
    ///
    /// 1. Quota check — a denial returns before any stream is opened.
    /// 2. One transport stream carrying the prior role+content pairs
    ///    plus the new user text.
    /// 3. Each delta extends the accumulator; the sink sees the full
    ///    accumulated text.
    /// 4. Quota is consumed only once `Done` arrives.
    /// 5. Crisis metadata fires the notifier exactly once, after the
    ///    complete reply is in hand — it never shortens delivery.
    pub async fn execute(
        &self,
        input: RunExchangeInput,
        sink: &dyn DeltaSink,
    ) -> Result<ExchangeOutcome, ExchangeError> {
        match self
            .quota
            .check(&input.identity)
            .await
            .map_err(|e| ExchangeError::Network(e.to_string()))?
        {
            QuotaDecision::Allowed => {}
            QuotaDecision::Denied(reason) => {
                info!(?reason, "exchange denied before stream open");
                return Err(ExchangeError::Denied(reason));
            }
        }

        let mut messages: Vec<WireMessage> =
            input.prior_messages.iter().map(WireMessage::from).collect();
        messages.push(WireMessage {
            role: haven_domain::Role::User,
            content: input.user_text.clone(),
        });

        let request = ExchangeRequest {
            messages,
            mode: input.mode,
            tone: input.tone,
            identity_hint: input.identity.hint().map(str::to_string),
        };

        let stream = self
            .transport
            .open(request)
            .await
            .map_err(ExchangeError::from_transport)?;

        let outcome = self.fold_stream(stream, sink).await?;

        self.quota.consume(&input.identity).await;

        if outcome.is_crisis() {
            if let Some(metadata) = &outcome.metadata {
                self.crisis.notify(metadata);
            }
        }

        info!(
            chars = outcome.content.len(),
            crisis = outcome.is_crisis(),
            "exchange completed"
        );
        Ok(outcome)
    }

    /// Fold the decoded event stream into an accumulated reply.
    async fn fold_stream(
        &self,
        mut stream: ReplyStream,
        sink: &dyn DeltaSink,
    ) -> Result<ExchangeOutcome, ExchangeError> {
        let mut accumulated = String::new();

        loop {
            let next = tokio::time::timeout(self.stall_timeout, stream.recv())
                .await
                .map_err(|_| {
                    warn!("reply stream stalled");
                    ExchangeError::Timeout
                })?;

            match next {
                Some(Ok(ExchangeEvent::Delta(chunk))) => {
                    accumulated.push_str(&chunk);
                    sink.on_delta(&accumulated);
                }
                Some(Ok(ExchangeEvent::Done(metadata))) => {
                    debug!("terminal stream event received");
                    return Ok(ExchangeOutcome {
                        content: accumulated,
                        metadata,
                    });
                }
                Some(Err(error)) => return Err(ExchangeError::from_transport(error)),
                None => {
                    return Err(ExchangeError::Network(
                        "stream closed before completion".to_string(),
                    ));
                }
            }
        }
    }
}
