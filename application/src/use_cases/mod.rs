//! Use cases for the exchange core.

pub mod orchestrator;
pub mod quota_gate;
pub mod run_exchange;
pub mod session_store;

pub use orchestrator::{
    ChatEvent, ChatHandle, ChatSnapshot, ChatState, CommandError, SessionOrchestrator,
};
pub use quota_gate::{DenialReason, QuotaDecision, QuotaGate, QuotaLimits};
pub use run_exchange::{ExchangeError, RunExchangeInput, RunExchangeUseCase};
pub use session_store::{SessionStore, SessionStoreError};
