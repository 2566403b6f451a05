//! # Draft Courier
//!
//! A Telegram bot that drafts daily posts for an HR / career channel. It pulls
//! a handful of headlines from RSS feeds, asks an OpenAI-compatible model to
//! write a short post in the channel's voice, optionally illustrates it, and
//! delivers the draft with 👍/👎 buttons whose votes land in a flat log.
//!
//! ## Surfaces
//!
//! - `run` (default): polling bot + daily schedule + liveness endpoint
//! - `echo`: `/start` and `/ping` only, for checking a token
//! - `check-config`: send one test message and print Telegram's answer
//!
//! ## Usage
//!
//! ```sh
//! BOT_TOKEN=... CHAT_ID=... OPENAI_API_KEY=... draft_courier
//! ```
//!
//! ## Architecture
//!
//! One draft run is a straight line:
//! 1. **Check-in**: dated liveness message to the destination
//! 2. **Headlines**: first entries of each feed, shuffled, capped
//! 3. **Text**: prompt from style guide + headlines, sent to the model
//! 4. **Image**: optional illustration seeded from the first line
//! 5. **Delivery**: photo and/or text with the rating keyboard
//!
//! Any model failure degrades to a placeholder; the draft is always sent.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod app;
mod check;
mod cli;
mod config;
mod echo;
mod error;
mod feedback;
mod feeds;
mod handlers;
mod health;
mod models;
mod prompt;
mod scheduler;
mod telegram;
#[cfg(test)]
mod test_utils;
mod utils;
mod workflow;

use cli::{Cli, Command};
use config::Settings;
use error::ConfigError;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // A missing .env is fine; the real environment may carry everything
    let _ = dotenvy::dotenv();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    let command = args.command.unwrap_or(Command::Run);
    debug!(?command, port = args.port, "Parsed CLI arguments");

    match command {
        Command::Run => {
            info!("draft_courier starting up");
            let settings = Settings::for_bot(&args).inspect_err(log_config_error)?;
            app::run_bot(settings).await
        }
        Command::Echo => {
            info!("echo bot starting up");
            let settings = Settings::for_echo(&args).inspect_err(log_config_error)?;
            echo::run_echo(settings).await
        }
        Command::CheckConfig => check::run_check(&args).await,
    }
}

/// The error returned from `main` is printed with `Debug`; log the readable form first.
fn log_config_error(e: &ConfigError) {
    error!(error = %e, "Cannot start: fix the configuration and retry");
}
