//! Session orchestrator — the owning actor for one chat session.
//!
//! Binds exchange results to the session store, guarantees at most one
//! in-flight exchange per session, and exposes send / new-chat / resume
//! as messages to a spawned actor task. State machine:
//!
//! ```text
//! Idle --send--> Streaming --success--> Idle
//!                Streaming --denied---> Denied
//!                Streaming --failure--> Failed (surfaces, settles to Idle)
//! ```
//!
//! A `send` while `Streaming` is rejected outright — no queuing, no
//! cancellation of the prior request. `new_chat` is valid from any state
//! and abandons (never cancels) the in-flight stream: its late
//! completion is discarded by comparing the session epoch captured at
//! dispatch against the current one, so it can never mutate a session
//! the user has already left.

use crate::ports::continuity::ContinuityStore;
use crate::ports::sink::DeltaSink;
use crate::use_cases::quota_gate::DenialReason;
use crate::use_cases::run_exchange::{ExchangeError, RunExchangeInput, RunExchangeUseCase};
use crate::use_cases::session_store::SessionStore;
use haven_domain::{
    ChatSession, CounselingMode, ExchangeOutcome, Identity, Message, MessageMetadata,
    ReplyMetadata, Role, SessionId, ToneLevel,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Observable state of the session actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    Streaming,
    /// The last attempt was denied by quota. Terminal for that attempt
    /// only — the next `send` re-evaluates quota from scratch.
    Denied,
    /// Transient: a transport failure was surfaced. The machine settles
    /// back to `Idle` once the status event has been emitted, so this
    /// state is observable only through [`ChatEvent::Failure`].
    Failed,
}

/// Events emitted by the actor for the surrounding UI to render.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// Streaming progress: the full accumulated reply so far. Rendered
    /// by replacement, so duplicate delivery is harmless.
    ReplyDelta { text: String },
    /// Out-of-band crisis signal. Fired at most once per turn, alongside
    /// (never instead of) normal reply delivery.
    Crisis { metadata: ReplyMetadata },
    /// A turn completed and was committed.
    TurnCompleted { session: ChatSession },
    /// The attempt was denied by quota — route to the upgrade path.
    Denied { reason: DenialReason },
    /// Transport failure. `message` is the short user-facing status
    /// string substituted for the pending reply.
    Failure { message: String },
    /// The exchange succeeded but the commit did not. The in-memory
    /// session is still correct; nothing was lost.
    PersistenceWarning { message: String },
    /// `new_chat` produced a fresh draft.
    SessionReplaced { session: ChatSession },
    /// A persisted session was resumed.
    SessionResumed { session: ChatSession },
}

/// Errors returned to command callers.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("An exchange is already in flight for this session")]
    ExchangeInFlight,

    #[error("Session actor stopped")]
    Stopped,

    #[error("Session storage failure: {0}")]
    Storage(String),
}

/// Point-in-time view of the actor, for callers that need to inspect
/// state without subscribing to events.
#[derive(Debug, Clone)]
pub struct ChatSnapshot {
    pub state: ChatState,
    pub session: ChatSession,
}

enum ChatCommand {
    Send {
        text: String,
        reply: oneshot::Sender<Result<(), CommandError>>,
    },
    NewChat {
        reply: oneshot::Sender<()>,
    },
    Resume {
        id: SessionId,
        reply: oneshot::Sender<Result<bool, CommandError>>,
    },
    Snapshot {
        reply: oneshot::Sender<ChatSnapshot>,
    },
    Shutdown,
}

/// Internal signals from the spawned exchange task back to the actor.
/// Every signal carries the epoch captured at dispatch; stale epochs are
/// discarded without touching the session.
enum ExchangeSignal {
    Delta {
        epoch: u64,
        text: String,
    },
    Finished {
        epoch: u64,
        result: Result<ExchangeOutcome, ExchangeError>,
    },
}

/// Sink handed to the exchange task: forwards accumulated text into the
/// actor's signal channel, tagged with the dispatch epoch.
struct SignalSink {
    epoch: u64,
    signals: mpsc::UnboundedSender<ExchangeSignal>,
}

impl DeltaSink for SignalSink {
    fn on_delta(&self, full_text: &str) {
        let _ = self.signals.send(ExchangeSignal::Delta {
            epoch: self.epoch,
            text: full_text.to_string(),
        });
    }
}

/// Cloneable handle to a spawned session actor.
#[derive(Clone)]
pub struct ChatHandle {
    commands: mpsc::UnboundedSender<ChatCommand>,
}

impl ChatHandle {
    /// Start an exchange for `text`. Rejected immediately when one is
    /// already in flight.
    pub async fn send(&self, text: impl Into<String>) -> Result<(), CommandError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(ChatCommand::Send {
                text: text.into(),
                reply,
            })
            .map_err(|_| CommandError::Stopped)?;
        rx.await.map_err(|_| CommandError::Stopped)?
    }

    /// Replace the current session with a fresh draft. Always valid.
    pub async fn new_chat(&self) -> Result<(), CommandError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(ChatCommand::NewChat { reply })
            .map_err(|_| CommandError::Stopped)?;
        rx.await.map_err(|_| CommandError::Stopped)
    }

    /// Resume a persisted session by id. Returns `false` when absent.
    pub async fn resume(&self, id: SessionId) -> Result<bool, CommandError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(ChatCommand::Resume { id, reply })
            .map_err(|_| CommandError::Stopped)?;
        rx.await.map_err(|_| CommandError::Stopped)?
    }

    pub async fn snapshot(&self) -> Result<ChatSnapshot, CommandError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(ChatCommand::Snapshot { reply })
            .map_err(|_| CommandError::Stopped)?;
        rx.await.map_err(|_| CommandError::Stopped)
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(ChatCommand::Shutdown);
    }
}

/// Bookkeeping for the optimistic turns added at dispatch, so a failed
/// attempt can be rolled back to exactly the committed log.
struct TurnCheckpoint {
    message_count: usize,
    title: Option<String>,
}

/// The session actor. One per session; processes at most one exchange
/// at a time. Concurrency comes from independent sessions, not from
/// overlap within one.
pub struct SessionOrchestrator {
    exchange: Arc<RunExchangeUseCase>,
    store: SessionStore,
    continuity: Arc<dyn ContinuityStore>,
    identity: Identity,
    mode: CounselingMode,
    tone: ToneLevel,

    session: ChatSession,
    state: ChatState,
    /// Session generation counter. Bumped whenever the session object is
    /// replaced; signals from older generations are discarded.
    epoch: u64,
    checkpoint: Option<TurnCheckpoint>,

    events: mpsc::UnboundedSender<ChatEvent>,
    signal_tx: mpsc::UnboundedSender<ExchangeSignal>,
    signal_rx: mpsc::UnboundedReceiver<ExchangeSignal>,
}

impl SessionOrchestrator {
    /// Build an actor with a fresh draft session. Returns the actor and
    /// the event stream the surrounding UI consumes.
    pub fn new(
        exchange: Arc<RunExchangeUseCase>,
        store: SessionStore,
        continuity: Arc<dyn ContinuityStore>,
        identity: Identity,
        mode: CounselingMode,
        tone: ToneLevel,
    ) -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let session = store.create_draft(mode);
        (
            Self {
                exchange,
                store,
                continuity,
                identity,
                mode,
                tone,
                session,
                state: ChatState::Idle,
                epoch: 0,
                checkpoint: None,
                events,
                signal_tx,
                signal_rx,
            },
            event_rx,
        )
    }

    /// Spawn the actor task and return its command handle.
    pub fn spawn(self) -> ChatHandle {
        let (commands, command_rx) = mpsc::unbounded_channel();
        tokio::spawn(self.run(command_rx));
        ChatHandle { commands }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<ChatCommand>) {
        info!(identity = %self.identity.tier(), "session actor started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    }
                    None => break,
                },
                signal = self.signal_rx.recv() => {
                    if let Some(signal) = signal {
                        self.handle_signal(signal).await;
                    }
                }
            }
        }
        debug!("session actor stopped");
    }

    /// Returns `false` when the actor should stop.
    async fn handle_command(&mut self, command: ChatCommand) -> bool {
        match command {
            ChatCommand::Send { text, reply } => {
                if self.state == ChatState::Streaming {
                    let _ = reply.send(Err(CommandError::ExchangeInFlight));
                } else {
                    self.dispatch_send(text);
                    let _ = reply.send(Ok(()));
                }
            }
            ChatCommand::NewChat { reply } => {
                self.replace_session().await;
                let _ = reply.send(());
            }
            ChatCommand::Resume { id, reply } => {
                let _ = reply.send(self.resume_session(id).await);
            }
            ChatCommand::Snapshot { reply } => {
                let _ = reply.send(ChatSnapshot {
                    state: self.state,
                    session: self.session.clone(),
                });
            }
            ChatCommand::Shutdown => return false,
        }
        true
    }

    fn dispatch_send(&mut self, text: String) {
        // Prior messages are captured before the optimistic turns land:
        // only completed exchanges travel to the provider.
        let prior = self.session.messages.clone();
        self.checkpoint = Some(TurnCheckpoint {
            message_count: self.session.messages.len(),
            title: self.session.title.clone(),
        });

        // Optimistic turns for UI responsiveness; rolled back on failure.
        self.store.append_user_turn(&mut self.session, &text);
        self.session.push_assistant(Message::assistant(String::new()));
        self.state = ChatState::Streaming;

        let input = RunExchangeInput {
            prior_messages: prior,
            user_text: text,
            mode: self.session.mode,
            tone: self.tone,
            identity: self.identity.clone(),
        };
        let exchange = Arc::clone(&self.exchange);
        let signals = self.signal_tx.clone();
        let epoch = self.epoch;

        tokio::spawn(async move {
            let sink = SignalSink {
                epoch,
                signals: signals.clone(),
            };
            let result = exchange.execute(input, &sink).await;
            let _ = signals.send(ExchangeSignal::Finished { epoch, result });
        });
    }

    async fn handle_signal(&mut self, signal: ExchangeSignal) {
        match signal {
            ExchangeSignal::Delta { epoch, text } => {
                if epoch != self.epoch {
                    debug!("discarding delta from abandoned stream");
                    return;
                }
                if let Some(last) = self.session.messages.last_mut() {
                    if last.role == Role::Assistant {
                        last.content = text.clone();
                    }
                }
                let _ = self.events.send(ChatEvent::ReplyDelta { text });
            }
            ExchangeSignal::Finished { epoch, result } => {
                if epoch != self.epoch {
                    debug!("discarding completion from abandoned stream");
                    return;
                }
                match result {
                    Ok(outcome) => self.apply_success(outcome).await,
                    Err(ExchangeError::Denied(reason)) => {
                        self.rollback();
                        self.state = ChatState::Denied;
                        info!(?reason, "attempt denied; session unchanged");
                        let _ = self.events.send(ChatEvent::Denied { reason });
                    }
                    Err(error) => {
                        self.rollback();
                        self.state = ChatState::Failed;
                        let _ = self.events.send(ChatEvent::Failure {
                            message: failure_message(&error),
                        });
                        // Failed only surfaces the status line, then the
                        // machine settles back.
                        self.state = ChatState::Idle;
                    }
                }
            }
        }
    }

    async fn apply_success(&mut self, outcome: ExchangeOutcome) {
        // Swap the streaming placeholder for the final message, with
        // metadata attached.
        if self
            .session
            .messages
            .last()
            .is_some_and(|m| m.role == Role::Assistant)
            && self.checkpoint.is_some()
        {
            self.session.messages.pop();
        }
        let metadata = outcome.metadata.clone().map(|m| MessageMetadata {
            is_crisis: m.is_crisis,
            risk_flags: m.risk_flags,
            tone_markers: vec![],
        });
        self.store.append_assistant_turn(
            &mut self.session,
            Message::assistant_with_metadata(outcome.content.clone(), metadata),
        );
        self.checkpoint = None;

        match self.store.commit(&mut self.session, &self.identity).await {
            Ok(id) => self.continuity.save(&id).await,
            Err(error) => {
                // The reply was delivered; persistence can catch up on
                // the next commit.
                warn!("commit failed after completed exchange: {error}");
                let _ = self.events.send(ChatEvent::PersistenceWarning {
                    message: "Your conversation could not be saved just now.".to_string(),
                });
            }
        }

        if outcome.is_crisis() {
            let _ = self.events.send(ChatEvent::Crisis {
                metadata: outcome.metadata.clone().unwrap_or_default(),
            });
        }

        self.state = ChatState::Idle;
        let _ = self.events.send(ChatEvent::TurnCompleted {
            session: self.session.clone(),
        });
    }

    /// Remove the optimistic turns so the session reflects only
    /// completed exchanges.
    fn rollback(&mut self) {
        if let Some(checkpoint) = self.checkpoint.take() {
            self.session.messages.truncate(checkpoint.message_count);
            self.session.title = checkpoint.title;
        }
    }

    async fn replace_session(&mut self) {
        self.epoch += 1;
        self.session = self.store.create_draft(self.mode);
        self.state = ChatState::Idle;
        self.checkpoint = None;
        self.continuity.clear().await;
        info!("session replaced with a fresh draft");
        let _ = self.events.send(ChatEvent::SessionReplaced {
            session: self.session.clone(),
        });
    }

    async fn resume_session(&mut self, id: SessionId) -> Result<bool, CommandError> {
        if self.state == ChatState::Streaming {
            return Err(CommandError::ExchangeInFlight);
        }
        match self.store.resume(&id).await {
            Ok(Some(session)) => {
                self.epoch += 1;
                self.session = session;
                self.state = ChatState::Idle;
                self.checkpoint = None;
                self.continuity.save(&id).await;
                let _ = self.events.send(ChatEvent::SessionResumed {
                    session: self.session.clone(),
                });
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(error) => Err(CommandError::Storage(error.to_string())),
        }
    }
}

/// Short user-facing status line for a failed attempt. Substituted for
/// the pending reply — never a raw error.
fn failure_message(error: &ExchangeError) -> String {
    match error {
        ExchangeError::Network(_) | ExchangeError::Timeout => {
            "Please check your connection and try again.".to_string()
        }
        _ => "Something went wrong on our side. Please try again.".to_string(),
    }
}
