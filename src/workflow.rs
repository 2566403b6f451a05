//! The draft workflow: check in, generate, illustrate, deliver.
//!
//! A run is strictly linear:
//! 1. **Check-in**: a dated "checking in" message to the destination
//! 2. **Body**: prompt composition and text generation, degraded to a fixed
//!    placeholder when the model is unavailable
//! 3. **Caption**: dated header, body, hashtag footer
//! 4. **Illustration** (optional): photo with caption, or photo then caption
//!    when the caption is too long for Telegram's photo limit
//! 5. **Fallback**: text-only message
//!
//! Every delivered draft carries the rating keyboard.

use crate::api::{ImageGenerator, TextGenerator};
use crate::app::AppContext;
use crate::error::{DeliveryError, GenerationError};
use crate::feeds::HeadlineSource;
use crate::models::{PostDraft, Reaction};
use crate::prompt::PromptComposer;
use crate::telegram::{Channel, InlineKeyboardButton, InlineKeyboardMarkup, SendMessage, SendPhoto};
use crate::utils::{draft_date, take_chars, truncate_for_log};
use chrono::Local;
use tracing::{error, info, instrument, warn};

/// Body used when no OpenAI key is configured.
pub const NO_KEY_TEXT: &str = "Нет OPENAI_API_KEY — отправляю заглушку.";

/// Body used when the text model call fails.
pub const GENERATION_FAILED_TEXT: &str = "Не удалось сгенерировать текст (проверь OPENAI_API_KEY).";

/// Image seed when the body is blank.
pub const FALLBACK_SEED: &str = "HR и карьера";

/// Longest image seed, in characters.
pub const SEED_MAX_CHARS: usize = 120;

/// Captions longer than this (in characters) go out as a separate message.
pub const CAPTION_SPLIT_THRESHOLD: usize = 1000;

pub const CAPTION_FOOTER: &str = "#draft";

/// How a trigger ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The draft went out; `with_photo` tells whether an image was attached.
    Delivered { with_photo: bool },
    /// Another run was already in flight; nothing was sent.
    Skipped,
}

/// `👍 Полезно` / `👎 Так себе` on one row.
pub fn rating_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![vec![
            InlineKeyboardButton::callback("👍 Полезно", Reaction::Up.tag()),
            InlineKeyboardButton::callback("👎 Так себе", Reaction::Down.tag()),
        ]],
    }
}

pub fn check_in_text(date: &str) -> String {
    format!("🤖 Проверка связи ({date})")
}

/// Dated header, blank line, body, blank line, hashtag footer.
pub fn build_caption(date: &str, body: &str) -> String {
    format!("📰 Черновик поста {date}\n\n{body}\n\n{CAPTION_FOOTER}")
}

/// First non-empty line of the body, capped at [`SEED_MAX_CHARS`].
pub fn image_seed(body: &str) -> String {
    body.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| take_chars(line, SEED_MAX_CHARS).to_string())
        .unwrap_or_else(|| FALLBACK_SEED.to_string())
}

/// Obtain the post body. Never fails: any problem becomes a placeholder.
///
/// Without a credential the prompt is not even built, so no feeds are fetched.
#[instrument(level = "info", skip_all)]
pub async fn compose_body<G, H>(generator: &G, composer: &PromptComposer<H>) -> String
where
    G: TextGenerator,
    H: HeadlineSource,
{
    if !generator.is_configured() {
        info!("No OpenAI key; using placeholder body");
        return NO_KEY_TEXT.to_string();
    }

    let result = match composer.build_prompt().await {
        Ok(prompt) => generator.generate(&prompt).await,
        Err(e) => Err(GenerationError::Prompt(e)),
    };

    match result {
        Ok(text) => text,
        Err(GenerationError::MissingCredential) => NO_KEY_TEXT.to_string(),
        Err(e) => {
            error!(error = %e, "OpenAI error");
            GENERATION_FAILED_TEXT.to_string()
        }
    }
}

impl<C, G, H> AppContext<C, G, H>
where
    C: Channel,
    G: TextGenerator + ImageGenerator,
    H: HeadlineSource,
{
    /// Generate one draft and deliver it to the destination.
    ///
    /// Returns [`RunOutcome::Skipped`] without sending anything when another
    /// run is in progress. Send failures are returned to the caller, which
    /// logs them.
    #[instrument(level = "info", skip(self), fields(destination = %self.destination))]
    pub async fn run_post(&self, with_image: bool) -> Result<RunOutcome, DeliveryError> {
        let Some(_permit) = self.run_guard.try_acquire() else {
            warn!("Draft already in progress; skipping trigger");
            return Ok(RunOutcome::Skipped);
        };

        let today = draft_date(&Local::now());
        self.channel
            .send_message(SendMessage::new(&self.destination, check_in_text(&today)))
            .await?;

        let body = compose_body(&self.generator, &self.composer).await;
        let caption = build_caption(&today, &body);
        info!(
            chars = caption.chars().count(),
            preview = %truncate_for_log(&body, 80),
            "Caption ready"
        );

        // Without a credential there is nothing to ask for a picture
        let image_url = if with_image && self.generator.is_configured() {
            self.generator.generate_image(&image_seed(&body)).await
        } else {
            None
        };

        let draft = PostDraft {
            body,
            caption,
            image_url,
        };
        self.deliver(&draft).await
    }

    /// Send a finished draft, choosing the message shape from the caption.
    pub async fn deliver(&self, draft: &PostDraft) -> Result<RunOutcome, DeliveryError> {
        if let Some(url) = &draft.image_url {
            if draft.caption.chars().count() > CAPTION_SPLIT_THRESHOLD {
                self.channel
                    .send_photo(SendPhoto::new(&self.destination, url))
                    .await?;
                self.channel
                    .send_message(
                        SendMessage::new(&self.destination, &draft.caption)
                            .with_markup(rating_keyboard()),
                    )
                    .await?;
            } else {
                self.channel
                    .send_photo(
                        SendPhoto::new(&self.destination, url)
                            .with_caption(&draft.caption)
                            .with_markup(rating_keyboard()),
                    )
                    .await?;
            }
            info!(body_chars = draft.body.chars().count(), "Draft delivered with photo");
            return Ok(RunOutcome::Delivered { with_photo: true });
        }

        self.channel
            .send_message(
                SendMessage::new(&self.destination, &draft.caption).with_markup(rating_keyboard()),
            )
            .await?;
        info!(body_chars = draft.body.chars().count(), "Draft delivered as text");
        Ok(RunOutcome::Delivered { with_photo: false })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::DEFAULT_STYLE;
    use crate::test_utils::{FakeGenerator, RecordingChannel, Sent, TextBehavior, test_context};
    use std::sync::atomic::Ordering;

    fn draft(caption: String, image: Option<&str>) -> PostDraft {
        PostDraft {
            body: String::new(),
            caption,
            image_url: image.map(str::to_string),
        }
    }

    #[test]
    fn test_build_caption() {
        assert_eq!(
            build_caption("01.02.2025", "Текст"),
            "📰 Черновик поста 01.02.2025\n\nТекст\n\n#draft"
        );
    }

    #[test]
    fn test_image_seed() {
        assert_eq!(image_seed("\n\n  Заголовок  \nвторая строка"), "Заголовок");
        assert_eq!(image_seed("   \n  "), FALLBACK_SEED);
        assert_eq!(image_seed(""), FALLBACK_SEED);
        let long = "я".repeat(300);
        assert_eq!(image_seed(&long).chars().count(), SEED_MAX_CHARS);
    }

    #[test]
    fn test_rating_keyboard() {
        let kb = rating_keyboard();
        assert_eq!(kb.inline_keyboard.len(), 1);
        let data: Vec<&str> = kb.inline_keyboard[0]
            .iter()
            .map(|b| b.callback_data.as_str())
            .collect();
        assert_eq!(data, vec!["rate_up", "rate_down"]);
    }

    #[tokio::test]
    async fn test_long_caption_with_image_is_split() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path(), RecordingChannel::default(), FakeGenerator::new(TextBehavior::Fail, None));
        let caption = "ж".repeat(CAPTION_SPLIT_THRESHOLD + 1);

        let outcome = ctx.deliver(&draft(caption.clone(), Some("https://img/1.png"))).await.unwrap();
        assert_eq!(outcome, RunOutcome::Delivered { with_photo: true });
        assert_eq!(
            ctx.channel.sent(),
            vec![
                Sent::Photo(SendPhoto::new("-1001", "https://img/1.png")),
                Sent::Message(SendMessage::new("-1001", caption).with_markup(rating_keyboard())),
            ]
        );
    }

    #[tokio::test]
    async fn test_caption_at_threshold_stays_combined() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path(), RecordingChannel::default(), FakeGenerator::new(TextBehavior::Fail, None));
        // Multi-byte text: the limit counts characters, not bytes
        let caption = "ж".repeat(CAPTION_SPLIT_THRESHOLD);

        ctx.deliver(&draft(caption.clone(), Some("https://img/1.png"))).await.unwrap();
        assert_eq!(
            ctx.channel.sent(),
            vec![Sent::Photo(
                SendPhoto::new("-1001", "https://img/1.png")
                    .with_caption(caption)
                    .with_markup(rating_keyboard())
            )]
        );
    }

    #[tokio::test]
    async fn test_no_image_sends_single_text() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path(), RecordingChannel::default(), FakeGenerator::new(TextBehavior::Fail, None));
        let caption = "x".repeat(2000);

        let outcome = ctx.deliver(&draft(caption.clone(), None)).await.unwrap();
        assert_eq!(outcome, RunOutcome::Delivered { with_photo: false });
        assert_eq!(
            ctx.channel.sent(),
            vec![Sent::Message(SendMessage::new("-1001", caption).with_markup(rating_keyboard()))]
        );
    }

    #[tokio::test]
    async fn test_without_key_sends_placeholder_and_skips_image() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(
            dir.path(),
            RecordingChannel::default(),
            FakeGenerator::new(TextBehavior::Unconfigured, Some("https://img/never.png")),
        );

        let outcome = ctx.run_post(true).await.unwrap();
        assert_eq!(outcome, RunOutcome::Delivered { with_photo: false });

        let sent = ctx.channel.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[0], Sent::Message(m) if m.text.starts_with("🤖 Проверка связи (")));
        match &sent[1] {
            Sent::Message(m) => {
                assert!(m.text.contains(&format!("\n\n{NO_KEY_TEXT}\n\n")));
                assert_eq!(m.reply_markup, Some(rating_keyboard()));
            }
            other => panic!("expected text message, got {other:?}"),
        }
        // No prompt built, no feeds fetched, no image requested
        assert!(ctx.generator.prompts.lock().unwrap().is_empty());
        assert!(ctx.generator.image_calls().is_empty());
        assert_eq!(ctx.composer.headlines().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_uses_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path(), RecordingChannel::default(), FakeGenerator::new(TextBehavior::Fail, None));

        ctx.run_post(false).await.unwrap();
        let sent = ctx.channel.sent();
        assert!(matches!(sent.last(), Some(Sent::Message(m)) if m.text.contains(GENERATION_FAILED_TEXT)));
    }

    #[tokio::test]
    async fn test_prompt_uses_default_style_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(
            dir.path(),
            RecordingChannel::default(),
            FakeGenerator::new(TextBehavior::Reply("Тезис.\nИнсайт.\nВопрос?".to_string()), None),
        );

        ctx.run_post(false).await.unwrap();
        let prompts = ctx.generator.prompts.lock().unwrap().clone();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(DEFAULT_STYLE));
        assert!(prompts[0].contains("Удалёнка возвращается — https://vc.ru/1"));
    }

    #[tokio::test]
    async fn test_image_run_seeds_from_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(
            dir.path(),
            RecordingChannel::default(),
            FakeGenerator::new(
                TextBehavior::Reply("Первая мысль\n\nДальше текст".to_string()),
                Some("https://img/2.png"),
            ),
        );

        let outcome = ctx.run_post(true).await.unwrap();
        assert_eq!(outcome, RunOutcome::Delivered { with_photo: true });
        assert_eq!(ctx.generator.image_calls(), vec!["Первая мысль"]);

        let sent = ctx.channel.sent();
        assert_eq!(sent.len(), 2);
        match &sent[1] {
            Sent::Photo(p) => {
                assert_eq!(p.photo, "https://img/2.png");
                assert!(p.caption.as_deref().unwrap().ends_with("\n\n#draft"));
                assert_eq!(p.reply_markup, Some(rating_keyboard()));
            }
            other => panic!("expected photo, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_image_falls_back_to_text() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(
            dir.path(),
            RecordingChannel::default(),
            FakeGenerator::new(TextBehavior::Reply("Текст".to_string()), None),
        );

        let outcome = ctx.run_post(true).await.unwrap();
        assert_eq!(outcome, RunOutcome::Delivered { with_photo: false });
        assert_eq!(ctx.generator.image_calls().len(), 1);
        assert!(matches!(ctx.channel.sent().last(), Some(Sent::Message(_))));
    }

    #[tokio::test]
    async fn test_concurrent_trigger_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path(), RecordingChannel::default(), FakeGenerator::new(TextBehavior::Fail, None));

        let _held = ctx.run_guard.try_acquire().unwrap();
        assert_eq!(ctx.run_post(false).await.unwrap(), RunOutcome::Skipped);
        assert!(ctx.channel.sent().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_is_returned_and_guard_released() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path(), RecordingChannel::failing(), FakeGenerator::new(TextBehavior::Fail, None));

        assert!(ctx.run_post(false).await.is_err());
        assert!(!ctx.run_guard.is_busy());
    }
}
