//! Error types for the bot.
//!
//! Each concern gets its own enum so callers can decide locally what is
//! fatal (configuration), what is recovered with a placeholder (generation),
//! and what is only logged (delivery, feeds).

use thiserror::Error;

/// Startup configuration problems. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was not provided by flag, environment or `.env`.
    #[error("missing required setting {0}")]
    Missing(&'static str),

    /// A setting was provided but could not be interpreted.
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Text generation failures, recovered by the workflow.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no OpenAI API key configured")]
    MissingCredential,

    #[error("request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("model returned no text")]
    EmptyOutput,

    /// Building the prompt failed before anything was sent upstream.
    #[error("prompt could not be built: {0}")]
    Prompt(#[from] std::io::Error),
}

/// Bot API failures when sending or polling.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Telegram answered with `"ok": false`.
    #[error("Telegram rejected {method}: {description}")]
    Rejected {
        method: &'static str,
        description: String,
    },
}

/// Per-endpoint feed failures. Logged and skipped by the aggregator.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to fetch feed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to parse feed: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Missing("BOT_TOKEN");
        assert_eq!(err.to_string(), "missing required setting BOT_TOKEN");

        let err = ConfigError::Invalid {
            name: "DAILY_AT",
            reason: "expected HH:MM".to_string(),
        };
        assert_eq!(err.to_string(), "invalid value for DAILY_AT: expected HH:MM");
    }

    #[test]
    fn test_delivery_error_display() {
        let err = DeliveryError::Rejected {
            method: "sendMessage",
            description: "Bad Request: chat not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Telegram rejected sendMessage: Bad Request: chat not found"
        );
    }

    #[test]
    fn test_generation_error_display() {
        let err = GenerationError::Api {
            status: 401,
            message: "Incorrect API key provided".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 401 - Incorrect API key provided");
    }
}
