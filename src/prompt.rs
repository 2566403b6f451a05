//! Prompt composition for the text model.
//!
//! The prompt is rebuilt from scratch on every draft: the style guide is
//! re-read from disk and the headlines are re-fetched.

use crate::feeds::HeadlineSource;
use itertools::Itertools;
use std::io;
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Used when the style guide file does not exist.
pub const DEFAULT_STYLE: &str = "Дружелюбный разговорный тон; тезис → инсайт → вопрос.";

/// Builds the text-generation request from the style guide and headlines.
#[derive(Debug, Clone)]
pub struct PromptComposer<H> {
    style_file: PathBuf,
    headlines: H,
}

impl<H: HeadlineSource> PromptComposer<H> {
    pub fn new(style_file: impl Into<PathBuf>, headlines: H) -> Self {
        Self {
            style_file: style_file.into(),
            headlines,
        }
    }

    #[cfg(test)]
    pub fn headlines(&self) -> &H {
        &self.headlines
    }

    /// Read the style guide; a missing file yields [`DEFAULT_STYLE`].
    ///
    /// Any other I/O error (permissions, invalid UTF-8) is returned.
    pub async fn load_style(&self) -> io::Result<String> {
        match tokio::fs::read_to_string(&self.style_file).await {
            Ok(style) => Ok(style),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.style_file.display(), "No style file; using built-in tone");
                Ok(DEFAULT_STYLE.to_string())
            }
            Err(e) => Err(e),
        }
    }

    /// Compose the full prompt.
    #[instrument(level = "info", skip_all)]
    pub async fn build_prompt(&self) -> io::Result<String> {
        let style = self.load_style().await?;
        let headlines = self.headlines.fetch_headlines().await;
        Ok(render_prompt(&style, &headlines))
    }
}

/// Lay out persona, style, headlines and structural rules.
pub fn render_prompt(style: &str, headlines: &[String]) -> String {
    let news = headlines.iter().map(|h| format!("- {h}")).join("\n");
    format!(
        "Ты автор Telegram-канала про HR, карьеру и развитие.

Стиль:
{style}

Вот новости:
{news}

Сделай пост 900–1200 знаков:
— 1 тезис → 1 инсайт → 1 вопрос
— разговорный тон, без штампов и лишних тире
"
    )
}
