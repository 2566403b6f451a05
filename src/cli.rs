//! Command-line interface definitions.
//!
//! Every option can come from a flag, the environment, or a `.env` file
//! (loaded before parsing). The subcommand picks which surface runs; without
//! one the full draft bot starts.

use clap::{Parser, Subcommand};

/// Command-line arguments for the draft bot.
///
/// # Examples
///
/// ```sh
/// # Full bot, everything from the environment / .env
/// draft_courier
///
/// # Liveness-only echo bot
/// draft_courier echo
///
/// # Send one test message and print Telegram's answer
/// draft_courier check-config
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Telegram bot token
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true, global = true)]
    pub bot_token: Option<String>,

    /// Chat that receives drafts (numeric id or @channel)
    ///
    /// Channel and group ids are negative, so a leading `-` is part of the value.
    #[arg(long, env = "CHAT_ID", allow_hyphen_values = true, global = true)]
    pub chat_id: Option<String>,

    /// OpenAI API key; without it the bot posts placeholders
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub openai_api_key: Option<String>,

    /// Port for the liveness endpoint
    #[arg(long, env = "PORT", default_value_t = 10000, global = true)]
    pub port: u16,

    /// Style guide merged into every prompt
    #[arg(long, env = "STYLE_FILE", default_value = "brand_voice.md", global = true)]
    pub style_file: String,

    /// Append-only log of draft ratings
    #[arg(long, env = "RATINGS_FILE", default_value = "ratings.csv", global = true)]
    pub ratings_file: String,

    /// Local time (HH:MM) of the daily draft
    #[arg(long, env = "DAILY_AT", default_value = "10:00", global = true)]
    pub daily_at: String,

    /// Model used for post text
    #[arg(long, env = "OPENAI_TEXT_MODEL", default_value = "gpt-4.1-mini", global = true)]
    pub text_model: String,

    /// Model used for illustrations
    #[arg(long, env = "OPENAI_IMAGE_MODEL", default_value = "gpt-image-1", global = true)]
    pub image_model: String,

    /// OpenAI-compatible API root
    #[arg(
        long,
        env = "OPENAI_BASE_URL",
        default_value = "https://api.openai.com/v1",
        global = true
    )]
    pub openai_base_url: String,

    /// Telegram Bot API root
    #[arg(
        long,
        env = "TELEGRAM_API_URL",
        default_value = "https://api.telegram.org",
        global = true
    )]
    pub telegram_api_url: String,
}

/// Which surface to run.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the draft bot: polling, daily schedule and liveness endpoint
    Run,
    /// Run the minimal /start + /ping bot
    Echo,
    /// Send one test message to CHAT_ID and print the response
    CheckConfig,
}
