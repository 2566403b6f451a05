//! Minimal liveness bot: answers `/start` and `/ping`, nothing else.
//!
//! Useful to confirm a token works and the process can reach Telegram before
//! wiring up the full draft bot.

use crate::app::shutdown_signal;
use crate::config::Settings;
use crate::handlers::command_name;
use crate::telegram::{Channel, SendMessage, TelegramClient, Update, run_polling};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

pub const START_REPLY: &str = "я жив! напиши /ping";
pub const PING_REPLY: &str = "pong";

/// Reply for an incoming text, if it is one of the echo commands.
pub fn echo_reply(text: &str) -> Option<&'static str> {
    match command_name(text)? {
        "start" => Some(START_REPLY),
        "ping" => Some(PING_REPLY),
        _ => None,
    }
}

/// Answer one update on `channel`.
pub async fn handle_echo<C: Channel>(channel: &C, update: Update) {
    let Some(message) = update.message else {
        return;
    };
    let Some(reply) = message.text.as_deref().and_then(echo_reply) else {
        return;
    };
    let outgoing = SendMessage::new(message.chat.id.to_string(), reply).reply_to(message.message_id);
    if let Err(e) = channel.send_message(outgoing).await {
        warn!(error = %e, "Echo reply failed");
    }
}

/// Run the echo bot until Ctrl-C / SIGTERM.
#[instrument(level = "info", skip_all)]
pub async fn run_echo(settings: Settings) -> Result<(), Box<dyn Error>> {
    let client = Arc::new(TelegramClient::new(
        &settings.telegram_api_url,
        &settings.bot_token,
    )?);
    client.delete_webhook(true).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    info!("Echo bot starting polling");
    run_polling(&client, &["message"], shutdown_rx, |update| {
        let client = Arc::clone(&client);
        tokio::spawn(async move { handle_echo(&*client, update).await });
    })
    .await;
    Ok(())
}
