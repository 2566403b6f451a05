//! Validated runtime settings.
//!
//! [`Cli`] holds whatever the user supplied; [`Settings`] is what a surface
//! actually runs with. Each surface validates only the subset it needs, so the
//! echo bot starts without `CHAT_ID` while the draft bot refuses to.

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::utils::parse_clock;
use chrono::NaiveTime;
use std::path::PathBuf;
use url::Url;

/// Settings for the draft bot and its companions.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_token: String,
    /// Destination for drafts. Empty for the echo bot, which has none.
    pub chat_id: String,
    pub openai_api_key: Option<String>,
    pub port: u16,
    pub style_file: PathBuf,
    pub ratings_file: PathBuf,
    pub daily_at: NaiveTime,
    pub text_model: String,
    pub image_model: String,
    pub openai_base_url: Url,
    pub telegram_api_url: Url,
}

impl Settings {
    /// Settings for the full draft bot: token and destination are required.
    pub fn for_bot(cli: &Cli) -> Result<Self, ConfigError> {
        let chat_id = required(&cli.chat_id, "CHAT_ID")?;
        Self::build(cli, chat_id)
    }

    /// Settings for the echo bot: only the token is required.
    pub fn for_echo(cli: &Cli) -> Result<Self, ConfigError> {
        Self::build(cli, String::new())
    }

    /// Settings for the configuration probe. Same requirements as the bot.
    pub fn for_check(cli: &Cli) -> Result<Self, ConfigError> {
        Self::for_bot(cli)
    }

    fn build(cli: &Cli, chat_id: String) -> Result<Self, ConfigError> {
        let bot_token = required(&cli.bot_token, "BOT_TOKEN")?;
        let daily_at = parse_clock(&cli.daily_at).ok_or_else(|| ConfigError::Invalid {
            name: "DAILY_AT",
            reason: format!("expected HH:MM, got {:?}", cli.daily_at),
        })?;

        Ok(Self {
            bot_token,
            chat_id,
            openai_api_key: cli
                .openai_api_key
                .as_ref()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            port: cli.port,
            style_file: PathBuf::from(&cli.style_file),
            ratings_file: PathBuf::from(&cli.ratings_file),
            daily_at,
            text_model: cli.text_model.clone(),
            image_model: cli.image_model.clone(),
            openai_base_url: base_url(&cli.openai_base_url, "OPENAI_BASE_URL")?,
            telegram_api_url: base_url(&cli.telegram_api_url, "TELEGRAM_API_URL")?,
        })
    }
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::Missing(name))
}

/// Parse an API root, normalised to end with `/` so `join` appends paths.
fn base_url(raw: &str, name: &'static str) -> Result<Url, ConfigError> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&with_slash).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}
