//! Telegram Bot API: wire types, the [`Channel`] seam, and a long-polling loop.
//!
//! Only the handful of methods the bot needs are modelled: `getUpdates`,
//! `deleteWebhook`, `sendMessage`, `sendPhoto` and `answerCallbackQuery`.
//! Request bodies are plain serde structs posted as JSON; every answer comes
//! back in the `{ ok, result, description }` envelope.
//!
//! The bot token is part of every request URL, so transport errors are
//! stripped of their URL before they can reach a log line.

use crate::error::DeliveryError;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Server-side wait for `getUpdates`, in seconds.
pub const LONG_POLL_SECS: u64 = 30;

/// Pause after a failed poll before asking again.
const POLL_ERROR_PAUSE: Duration = Duration::from_secs(5);

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// One button of an inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboardButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: data.into(),
        }
    }
}

/// Buttons attached under a message, row by row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyParameters {
    pub message_id: i64,
}

/// Body of `sendMessage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendMessage {
    pub chat_id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_parameters: Option<ReplyParameters>,
}

impl SendMessage {
    pub fn new(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
            reply_markup: None,
            reply_parameters: None,
        }
    }

    pub fn with_markup(mut self, markup: InlineKeyboardMarkup) -> Self {
        self.reply_markup = Some(markup);
        self
    }

    pub fn reply_to(mut self, message_id: i64) -> Self {
        self.reply_parameters = Some(ReplyParameters { message_id });
        self
    }
}

/// Body of `sendPhoto` with a photo given by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendPhoto {
    pub chat_id: String,
    pub photo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

impl SendPhoto {
    pub fn new(chat_id: impl Into<String>, photo: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            photo: photo.into(),
            caption: None,
            reply_markup: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_markup(mut self, markup: InlineKeyboardMarkup) -> Self {
        self.reply_markup = Some(markup);
        self
    }
}

/// Body of `answerCallbackQuery`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerCallbackQuery {
    pub callback_query_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl AnswerCallbackQuery {
    pub fn new(callback_query_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            callback_query_id: callback_query_id.into(),
            text: Some(text.into()),
        }
    }
}

#[derive(Debug, Serialize)]
struct GetUpdates<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct DeleteWebhook {
    drop_pending_updates: bool,
}

/// An incoming update. Kinds other than messages and callbacks are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

/// Outbound side of the bot, as seen by the workflow and handlers.
pub trait Channel: Send + Sync {
    fn send_message(&self, message: SendMessage) -> impl Future<Output = Result<(), DeliveryError>> + Send;

    fn send_photo(&self, photo: SendPhoto) -> impl Future<Output = Result<(), DeliveryError>> + Send;

    fn answer_callback(
        &self,
        answer: AnswerCallbackQuery,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Bot API client bound to one token.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    /// `{api_root}/bot{token}/`; never logged.
    base: Url,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient").finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// `api_root` must end with `/`.
    pub fn new(api_root: &Url, token: &str) -> Result<Self, DeliveryError> {
        let base = api_root
            // Leading "./" keeps the colon in the token from reading as a scheme
            .join(&format!("./bot{token}/"))
            .map_err(|e| DeliveryError::Rejected {
                method: "init",
                description: format!("bad API root: {e}"),
            })?;
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(concat!("draft_courier/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeliveryError::Transport(e.without_url()))?;
        Ok(Self { http, base })
    }

    fn method_url(&self, method: &str) -> Url {
        // Method names are ASCII identifiers; joining onto a valid base cannot fail
        self.base.join(method).unwrap_or_else(|_| self.base.clone())
    }

    /// Call a Bot API method and unwrap the response envelope.
    async fn call<B, R>(
        &self,
        method: &'static str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<R, DeliveryError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = self.http.post(self.method_url(method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await.map_err(|e| e.without_url())?;
        let envelope: ApiResponse<R> = response.json().await.map_err(|e| e.without_url())?;

        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(DeliveryError::Rejected {
                method,
                description: description.unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }

    /// Drop any webhook so `getUpdates` is allowed.
    #[instrument(level = "info", skip(self))]
    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<(), DeliveryError> {
        let _: bool = self
            .call("deleteWebhook", &DeleteWebhook { drop_pending_updates }, None)
            .await?;
        info!("Webhook removed");
        Ok(())
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        allowed_updates: &[&str],
    ) -> Result<Vec<Update>, DeliveryError> {
        let body = GetUpdates {
            offset,
            timeout: LONG_POLL_SECS,
            allowed_updates,
        };
        self.call(
            "getUpdates",
            &body,
            Some(Duration::from_secs(LONG_POLL_SECS + 10)),
        )
        .await
    }

    /// Send a message and hand back the raw HTTP status and body, without
    /// interpreting the envelope. Used by the configuration probe.
    pub async fn probe_send(&self, message: &SendMessage) -> Result<(StatusCode, String), reqwest::Error> {
        let response = self
            .http
            .post(self.method_url("sendMessage"))
            .json(message)
            .send()
            .await
            .map_err(|e| e.without_url())?;
        let status = response.status();
        let body = response.text().await.map_err(|e| e.without_url())?;
        Ok((status, body))
    }
}

impl Channel for TelegramClient {
    async fn send_message(&self, message: SendMessage) -> Result<(), DeliveryError> {
        let _: serde_json::Value = self.call("sendMessage", &message, None).await?;
        debug!(chat_id = %message.chat_id, "Message sent");
        Ok(())
    }

    async fn send_photo(&self, photo: SendPhoto) -> Result<(), DeliveryError> {
        let _: serde_json::Value = self.call("sendPhoto", &photo, None).await?;
        debug!(chat_id = %photo.chat_id, "Photo sent");
        Ok(())
    }

    async fn answer_callback(&self, answer: AnswerCallbackQuery) -> Result<(), DeliveryError> {
        let _: bool = self.call("answerCallbackQuery", &answer, None).await?;
        Ok(())
    }
}

/// Poll for updates until `shutdown` flips, handing each one to `on_update`.
///
/// `on_update` runs inline on the polling task and should only dispatch
/// (spawn) work. Poll failures are logged and retried after a short pause.
#[instrument(level = "info", skip_all)]
pub async fn run_polling<F>(
    client: &TelegramClient,
    allowed_updates: &[&str],
    mut shutdown: watch::Receiver<bool>,
    mut on_update: F,
) where
    F: FnMut(Update),
{
    let mut offset: Option<i64> = None;
    info!(?allowed_updates, "Polling started");

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = shutdown.changed() => break,
            polled = client.get_updates(offset, allowed_updates) => match polled {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        on_update(update);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "getUpdates failed; pausing");
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(POLL_ERROR_PAUSE) => {}
                    }
                }
            }
        }
    }

    info!("Polling stopped");
}
