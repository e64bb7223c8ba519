//! Application layer for haven.
//!
//! Ports (interfaces to the outside world) and use cases: the quota
//! gate, the exchange coordinator, the session store, and the session
//! orchestrator actor. Everything here depends on traits, never on a
//! concrete transport or document store, so the whole layer is testable
//! with deterministic fakes.

pub mod ports;
pub mod use_cases;

pub use ports::{
    ContinuityStore, CrisisNotifier, DeltaSink, ExchangeRequest, ExchangeTransport,
    NoContinuityStore, NoCrisisNotifier, NoDeltaSink, ReplyStream, RepositoryError,
    SessionRepository, TransportError, UsageStore, UsageStoreError, WireMessage,
};
pub use use_cases::{
    ChatEvent, ChatHandle, ChatSnapshot, ChatState, CommandError, DenialReason, ExchangeError,
    QuotaDecision, QuotaGate, QuotaLimits, RunExchangeInput, RunExchangeUseCase,
    SessionOrchestrator, SessionStore, SessionStoreError,
};
