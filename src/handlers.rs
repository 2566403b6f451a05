//! Routing of incoming updates to the workflow and the feedback log.
//!
//! | Input | Action |
//! |-------|--------|
//! | `/start` | reply with the draft-mode keyboard |
//! | `/draft`, `draft_text` | text-only draft |
//! | `/draft_image`, `draft_image` | draft with illustration |
//! | `rate_up`, `rate_down` | append a vote to the ratings log |
//!
//! Handlers never fail outward: delivery errors are logged here so a bad send
//! cannot take down the polling loop.

use crate::api::{ImageGenerator, TextGenerator};
use crate::app::AppContext;
use crate::feeds::HeadlineSource;
use crate::models::Reaction;
use crate::telegram::{
    AnswerCallbackQuery, CallbackQuery, Channel, InlineKeyboardButton, InlineKeyboardMarkup,
    Message, SendMessage, Update,
};
use crate::workflow::RunOutcome;
use tracing::{debug, error, info, instrument, warn};

pub const START_TEXT: &str = "Привет! Выберите режим черновика:";
pub const FEEDBACK_THANKS: &str = "Спасибо! Учтём.";
pub const BUSY_TEXT: &str = "Черновик уже готовится, подождите.";
pub const FAILED_TEXT: &str = "Не удалось отправить черновик.";

/// Update kinds the draft bot asks Telegram for.
pub const ALLOWED_UPDATES: &[&str] = &["message", "callback_query"];

/// Recognised chat commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Draft,
    DraftImage,
}

impl BotCommand {
    /// Parse `/cmd`, `/cmd@BotName` and `/cmd args`.
    pub fn parse(text: &str) -> Option<Self> {
        let name = command_name(text)?;
        match name {
            "start" => Some(BotCommand::Start),
            "draft" => Some(BotCommand::Draft),
            "draft_image" => Some(BotCommand::DraftImage),
            _ => None,
        }
    }
}

/// Bare command name of a `/command@bot args` message.
pub fn command_name(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    let command = first.strip_prefix('/')?;
    let name = command.split('@').next().unwrap_or(command);
    (!name.is_empty()).then_some(name)
}

/// Draft-mode choice offered by `/start`.
pub fn draft_mode_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![
            vec![InlineKeyboardButton::callback("📝 Черновик (только текст)", "draft_text")],
            vec![InlineKeyboardButton::callback("🖼 Черновик + картинка", "draft_image")],
        ],
    }
}

/// How a manual trigger went, for the reply to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DraftStatus {
    Sent,
    Busy,
    Failed,
}

impl DraftStatus {
    /// Reply to a `/draft` or `/draft_image` command.
    fn command_reply(self, with_image: bool) -> &'static str {
        match (self, with_image) {
            (DraftStatus::Sent, true) => "Черновик отправлен с картинкой.",
            (DraftStatus::Sent, false) => "Черновик отправлен без картинки.",
            (DraftStatus::Busy, _) => BUSY_TEXT,
            (DraftStatus::Failed, _) => FAILED_TEXT,
        }
    }

    /// Answer to a `draft_text` or `draft_image` button press.
    fn callback_answer(self, with_image: bool) -> &'static str {
        match (self, with_image) {
            (DraftStatus::Sent, true) => "Черновик с картинкой отправлен.",
            (DraftStatus::Sent, false) => "Черновик без картинки отправлен.",
            (status, _) => status.command_reply(with_image),
        }
    }
}

impl<C, G, H> AppContext<C, G, H>
where
    C: Channel,
    G: TextGenerator + ImageGenerator,
    H: HeadlineSource,
{
    /// Dispatch one update.
    #[instrument(level = "info", skip_all, fields(update_id = update.update_id))]
    pub async fn handle_update(&self, update: Update) {
        if let Some(message) = update.message {
            self.handle_message(message).await;
        } else if let Some(callback) = update.callback_query {
            self.handle_callback(callback).await;
        } else {
            debug!("Ignoring update kind");
        }
    }

    async fn handle_message(&self, message: Message) {
        let Some(command) = message.text.as_deref().and_then(BotCommand::parse) else {
            return;
        };
        info!(
            ?command,
            chat_id = message.chat.id,
            user_id = message.from.as_ref().map(|u| u.id),
            "Command received"
        );

        let reply = match command {
            BotCommand::Start => {
                SendMessage::new(message.chat.id.to_string(), START_TEXT)
                    .with_markup(draft_mode_keyboard())
            }
            BotCommand::Draft | BotCommand::DraftImage => {
                let with_image = command == BotCommand::DraftImage;
                let status = self.trigger_draft(with_image).await;
                SendMessage::new(message.chat.id.to_string(), status.command_reply(with_image))
            }
        };

        if let Err(e) = self
            .channel
            .send_message(reply.reply_to(message.message_id))
            .await
        {
            warn!(error = %e, "Failed to reply to command");
        }
    }

    async fn handle_callback(&self, callback: CallbackQuery) {
        let data = callback.data.as_deref().unwrap_or_default();
        info!(data, user_id = callback.from.id, "Callback received");

        let answer = match data {
            "draft_text" => Some(self.trigger_draft(false).await.callback_answer(false)),
            "draft_image" => Some(self.trigger_draft(true).await.callback_answer(true)),
            tag => match tag.parse::<Reaction>() {
                Ok(reaction) => {
                    if let Err(e) = self.feedback.record(reaction, callback.from.id).await {
                        error!(
                            path = %self.feedback.path().display(),
                            error = %e,
                            "Failed to write rating"
                        );
                    }
                    Some(FEEDBACK_THANKS)
                }
                Err(()) => {
                    debug!(data = tag, "Unknown callback data");
                    None
                }
            },
        };

        let ack = match answer {
            Some(text) => AnswerCallbackQuery::new(&callback.id, text),
            None => AnswerCallbackQuery {
                callback_query_id: callback.id.clone(),
                text: None,
            },
        };
        if let Err(e) = self.channel.answer_callback(ack).await {
            warn!(error = %e, "Failed to answer callback");
        }
    }

    /// Run a draft on behalf of a user and log any delivery failure.
    async fn trigger_draft(&self, with_image: bool) -> DraftStatus {
        match self.run_post(with_image).await {
            Ok(RunOutcome::Delivered { .. }) => DraftStatus::Sent,
            Ok(RunOutcome::Skipped) => DraftStatus::Busy,
            Err(e) => {
                error!(error = %e, "Draft delivery failed");
                DraftStatus::Failed
            }
        }
    }
}
