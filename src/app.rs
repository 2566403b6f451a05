//! Application context and the task group that runs the draft bot.
//!
//! The context is built once at startup and passed around behind an `Arc`.
//! It is generic over the outbound channel, the generator and the headline
//! source so the workflow can run against in-memory fakes in tests.
//!
//! [`run_bot`] starts three long-lived tasks (update polling, the daily
//! scheduler, the liveness server) that share one shutdown signal. A Ctrl-C,
//! a SIGTERM, or any task ending on its own stops all of them.

use crate::api::OpenAiClient;
use crate::config::Settings;
use crate::feedback::FeedbackRecorder;
use crate::feeds::FeedAggregator;
use crate::handlers::ALLOWED_UPDATES;
use crate::prompt::PromptComposer;
use crate::telegram::{Channel, SendMessage, TelegramClient, run_polling};
use crate::{health, scheduler};
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

/// Announced to the destination when the bot comes up.
pub const STARTUP_TEXT: &str = "✅ Бот запущен. Пишите /draft в ЛС боту.";

/// Everything a draft run or an update handler needs.
#[derive(Debug)]
pub struct AppContext<C, G, H> {
    /// Chat that receives drafts.
    pub destination: String,
    pub channel: C,
    pub generator: G,
    pub composer: PromptComposer<H>,
    pub feedback: FeedbackRecorder,
    pub(crate) run_guard: RunGuard,
}

/// The context wired to real services.
pub type LiveContext = AppContext<TelegramClient, OpenAiClient, FeedAggregator>;

impl<C, G, H> AppContext<C, G, H> {
    pub fn new(
        destination: impl Into<String>,
        channel: C,
        generator: G,
        composer: PromptComposer<H>,
        feedback: FeedbackRecorder,
    ) -> Self {
        Self {
            destination: destination.into(),
            channel,
            generator,
            composer,
            feedback,
            run_guard: RunGuard::default(),
        }
    }
}

impl LiveContext {
    /// Wire the real clients from validated settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, Box<dyn Error>> {
        let telegram = TelegramClient::new(&settings.telegram_api_url, &settings.bot_token)?;
        let generator = OpenAiClient::new(
            settings.openai_api_key.clone(),
            settings.openai_base_url.clone(),
            &settings.text_model,
            &settings.image_model,
        )?;
        let feeds = FeedAggregator::new()?;

        Ok(Self::new(
            settings.chat_id.clone(),
            telegram,
            generator,
            PromptComposer::new(&settings.style_file, feeds),
            FeedbackRecorder::new(&settings.ratings_file),
        ))
    }
}

/// Resolve on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Run the draft bot until a shutdown signal or until any task stops.
#[instrument(level = "info", skip_all, fields(port = settings.port))]
pub async fn run_bot(settings: Settings) -> Result<(), Box<dyn Error>> {
    let ctx = Arc::new(LiveContext::from_settings(&settings)?);
    info!(
        destination = %ctx.destination,
        openai = settings.openai_api_key.is_some(),
        daily_at = %settings.daily_at,
        "Draft bot configured"
    );

    // Long polling is refused while a webhook is set
    ctx.channel.delete_webhook(true).await?;

    if let Err(e) = ctx
        .channel
        .send_message(SendMessage::new(&ctx.destination, STARTUP_TEXT))
        .await
    {
        error!(error = %e, "Could not announce startup to CHAT_ID");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks: JoinSet<(&'static str, Result<(), String>)> = JoinSet::new();

    let poll_ctx = Arc::clone(&ctx);
    let poll_shutdown = shutdown_rx.clone();
    tasks.spawn(async move {
        run_polling(&poll_ctx.channel, ALLOWED_UPDATES, poll_shutdown, |update| {
            let handler_ctx = Arc::clone(&poll_ctx);
            tokio::spawn(async move { handler_ctx.handle_update(update).await });
        })
        .await;
        ("polling", Ok(()))
    });

    let sched_ctx = Arc::clone(&ctx);
    let sched_shutdown = shutdown_rx.clone();
    let daily_at = settings.daily_at;
    tasks.spawn(async move {
        scheduler::run_daily(sched_ctx, daily_at, sched_shutdown).await;
        ("scheduler", Ok(()))
    });

    let port = settings.port;
    tasks.spawn(async move {
        let result = health::serve(port, shutdown_rx).await;
        ("liveness", result.map_err(|e| e.to_string()))
    });

    info!("Polling started; liveness endpoint up");
    tokio::select! {
        _ = shutdown_signal() => info!("Shutdown signal received"),
        Some(joined) = tasks.join_next() => log_task_exit(joined, true),
    }

    let _ = shutdown_tx.send(true);
    while let Some(joined) = tasks.join_next().await {
        log_task_exit(joined, false);
    }
    info!("Draft bot stopped");
    Ok(())
}

fn log_task_exit(
    joined: Result<(&'static str, Result<(), String>), tokio::task::JoinError>,
    early: bool,
) {
    match joined {
        Ok((task, Ok(()))) if early => warn!(task, "Task ended on its own; shutting down"),
        Ok((task, Ok(()))) => info!(task, "Task stopped"),
        Ok((task, Err(e))) => error!(task, error = %e, "Task failed"),
        Err(e) => error!(error = %e, "Task panicked"),
    }
}

/// At most one draft run in flight for the destination.
///
/// Scheduled and manual triggers share this flag; a trigger that finds it set
/// is skipped instead of double-posting.
#[derive(Debug, Default)]
pub struct RunGuard {
    busy: AtomicBool,
}

impl RunGuard {
    /// Claim the guard; `None` while another run holds it.
    pub fn try_acquire(&self) -> Option<RunPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit { guard: self })
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the [`RunGuard`] on drop.
#[derive(Debug)]
pub struct RunPermit<'a> {
    guard: &'a RunGuard,
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}
