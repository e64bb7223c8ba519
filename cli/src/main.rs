//! CLI entrypoint for haven
//!
//! This is the main binary that wires together all layers using
//! dependency injection, then runs a line-oriented chat loop over the
//! session actor.

use anyhow::{Context, Result, bail};
use clap::Parser;
use haven_application::{
    ChatEvent, ChatHandle, CommandError, ContinuityStore, DenialReason, NoCrisisNotifier,
    QuotaGate, QuotaLimits, RunExchangeUseCase, SessionOrchestrator, SessionStore, UsageStore,
};
use haven_domain::{CounselingMode, Identity, ToneLevel};
use haven_infrastructure::{
    ConfigLoader, FileConfig, FileContinuityStore, FileSessionRepository, HttpExchangeTransport,
    InMemoryUsageStore, LocalUsageStore,
};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "haven", about = "Streamed counseling chat", version)]
struct Cli {
    /// Verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a config file (overrides discovered configs)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Exchange endpoint URL (overrides config)
    #[arg(long)]
    endpoint: Option<String>,

    /// Counseling mode: listening, guidance or reflection
    #[arg(long)]
    mode: Option<String>,

    /// Tone level, 0 (gentle) to 100 (direct)
    #[arg(long)]
    tone: Option<u8>,

    /// Authenticate as this principal id (free tier unless --premium)
    #[arg(long)]
    user: Option<String>,

    /// Treat the authenticated user as premium
    #[arg(long, requires = "user")]
    premium: bool,

    /// Start a fresh session instead of resuming the last one
    #[arg(long)]
    no_resume: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = ConfigLoader::load(cli.config.as_ref()).context("loading configuration")?;
    let data_dir = data_dir(&config)?;

    let mode: CounselingMode = match cli.mode.as_deref() {
        Some(raw) => raw.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        None => config.chat.mode.parse().map_err(|e: String| {
            anyhow::anyhow!("invalid chat.mode in config: {e}")
        })?,
    };
    let tone = ToneLevel::new(cli.tone.unwrap_or(config.chat.tone));
    let endpoint = cli
        .endpoint
        .clone()
        .unwrap_or_else(|| config.provider.endpoint.clone());

    let identity = match &cli.user {
        Some(principal) if cli.premium => Identity::premium(principal.clone()),
        Some(principal) => Identity::free(principal.clone()),
        None => Identity::guest(install_key(&data_dir)?),
    };
    info!(tier = %identity.tier(), %endpoint, "starting haven");

    // === Dependency Injection ===
    let usage: Arc<dyn UsageStore> = match identity {
        // Guest allowances live on this install; authenticated counters
        // are per-run until a server-side store exists.
        Identity::Guest { .. } => Arc::new(LocalUsageStore::new(data_dir.join("usage"))),
        Identity::Authenticated { .. } => Arc::new(InMemoryUsageStore::new()),
    };
    let quota = Arc::new(QuotaGate::new(usage).with_limits(QuotaLimits {
        guest: config.quota.guest_limit,
        free_daily: config.quota.free_daily_limit,
    }));
    let transport = Arc::new(HttpExchangeTransport::new(endpoint));
    let exchange = Arc::new(
        RunExchangeUseCase::new(quota, transport, Arc::new(NoCrisisNotifier))
            .with_stall_timeout(Duration::from_secs(config.provider.stall_timeout_seconds)),
    );
    let store = SessionStore::new(Arc::new(FileSessionRepository::new(
        data_dir.join("sessions"),
    )));
    let continuity: Arc<dyn ContinuityStore> =
        Arc::new(FileContinuityStore::new(data_dir.join("current_session")));

    let resume_id = if cli.no_resume {
        None
    } else {
        continuity.load().await
    };

    let (orchestrator, events) = SessionOrchestrator::new(
        exchange,
        store,
        continuity,
        identity,
        mode,
        tone,
    );
    let handle = orchestrator.spawn();

    if let Some(id) = resume_id {
        match handle.resume(id.clone()).await {
            Ok(true) => println!("Resumed your last conversation.\n"),
            Ok(false) => info!(session = %id, "last session not found; starting fresh"),
            Err(error) => bail!("could not resume session: {error}"),
        }
    }

    let printer = tokio::spawn(print_events(events));
    chat_loop(&handle).await?;

    handle.shutdown();
    let _ = printer.await;
    Ok(())
}

/// Render actor events to the terminal. Deltas carry the full
/// accumulated reply, so each one redraws the current line.
async fn print_events(mut events: mpsc::UnboundedReceiver<ChatEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ChatEvent::ReplyDelta { text } => {
                print!("\r{text}");
                let _ = std::io::stdout().flush();
            }
            ChatEvent::TurnCompleted { .. } => {
                println!("\n");
            }
            ChatEvent::Crisis { .. } => {
                println!(
                    "\nIf you are in immediate danger or thinking about harming yourself,\n\
                     please reach out to a crisis line in your area right away."
                );
            }
            ChatEvent::Denied { reason } => {
                let message = match reason {
                    DenialReason::GuestLimitReached => {
                        "You've used your free guest conversations. Sign in to keep talking."
                    }
                    DenialReason::DailyLimitReached => {
                        "You've reached today's limit. It resets at midnight, or upgrade for unlimited conversations."
                    }
                };
                println!("\r{message}\n");
            }
            ChatEvent::Failure { message } => {
                println!("\r{message}\n");
            }
            ChatEvent::PersistenceWarning { message } => {
                println!("(note: {message})");
            }
            ChatEvent::SessionReplaced { .. } => {
                println!("Started a new conversation.\n");
            }
            ChatEvent::SessionResumed { .. } => {}
        }
    }
}

async fn chat_loop(handle: &ChatHandle) -> Result<()> {
    println!("haven — type a message, /new for a fresh conversation, /quit to leave.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/new" => handle.new_chat().await?,
            _ => match handle.send(line).await {
                Ok(()) => {}
                Err(CommandError::ExchangeInFlight) => {
                    println!("One moment — still replying to your last message.");
                }
                Err(error) => return Err(error.into()),
            },
        }
    }
    Ok(())
}

/// Data directory: config override, then the platform data dir.
fn data_dir(config: &FileConfig) -> Result<PathBuf> {
    if let Some(dir) = &config.storage.data_dir {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|d| d.join("haven"))
        .context("could not determine a data directory; set storage.data_dir")
}

/// Per-install guest key, generated once and persisted so guest quota
/// and sessions survive restarts.
fn install_key(data_dir: &Path) -> Result<String> {
    let path = data_dir.join("install_key");
    if let Ok(existing) = std::fs::read_to_string(&path) {
        let key = existing.trim().to_string();
        if !key.is_empty() {
            return Ok(key);
        }
    }
    let key = uuid::Uuid::new_v4().to_string();
    std::fs::create_dir_all(data_dir).context("creating data directory")?;
    std::fs::write(&path, &key).context("persisting install key")?;
    Ok(key)
}
