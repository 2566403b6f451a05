//! One-shot configuration probe.
//!
//! Posts a test message to `CHAT_ID` with the configured token and prints
//! Telegram's raw answer. Exits non-zero when the token or chat id is missing.

use crate::cli::Cli;
use crate::config::Settings;
use crate::error::ConfigError;
use crate::telegram::{SendMessage, TelegramClient};
use std::error::Error;
use tracing::instrument;

pub const PROBE_TEXT: &str = "Тест: бот добрался до чата ✅";
pub const MISSING_TEXT: &str = "Ошибка: нет BOT_TOKEN или CHAT_ID в .env";

/// Lines describing what configuration was found, before validation.
pub fn describe(cli: &Cli) -> Vec<String> {
    vec![
        format!(
            "BOT_TOKEN ok? {}",
            cli.bot_token.as_deref().is_some_and(|t| !t.trim().is_empty())
        ),
        format!("CHAT_ID   : {}", cli.chat_id.as_deref().unwrap_or("None")),
    ]
}

/// What to tell the operator when the settings do not validate.
pub fn config_problem(e: &ConfigError) -> String {
    match e {
        ConfigError::Missing(_) => MISSING_TEXT.to_string(),
        ConfigError::Invalid { .. } => format!("Ошибка: {e}"),
    }
}

/// Print the configuration summary, then send the probe message.
#[instrument(level = "info", skip_all)]
pub async fn run_check(cli: &Cli) -> Result<(), Box<dyn Error>> {
    for line in describe(cli) {
        println!("{line}");
    }

    let settings = match Settings::for_check(cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", config_problem(&e));
            return Err(e.into());
        }
    };

    let client = TelegramClient::new(&settings.telegram_api_url, &settings.bot_token)?;
    println!("-> Sending test message to Telegram...");
    let (status, body) = client
        .probe_send(&SendMessage::new(&settings.chat_id, PROBE_TEXT))
        .await?;
    println!("HTTP {}", status.as_u16());
    println!("Telegram response: {body}");
    Ok(())
}
