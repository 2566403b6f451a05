//! LLM API interaction for post text and illustrations.
//!
//! Two small traits sit at the seam between the workflow and the provider:
//! - [`TextGenerator`]: prompt in, prose out, with a typed failure
//! - [`ImageGenerator`]: seed in, image URL out, or nothing
//!
//! [`OpenAiClient`] implements both against an OpenAI-compatible API. When no
//! key is configured it never touches the network: text generation reports
//! [`GenerationError::MissingCredential`] and image generation returns `None`.
//!
//! There is deliberately no retry here. A failed call degrades the draft to a
//! placeholder (text) or to a text-only post (image).

use crate::error::GenerationError;
use crate::utils::truncate_for_log;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};
use url::Url;

/// Size requested for illustrations (square, 1:1).
pub const IMAGE_SIZE: &str = "1024x1024";

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Produce post text from a prompt.
pub trait TextGenerator: Send + Sync {
    /// Whether a credential is present. Without one the workflow skips
    /// prompt building entirely.
    fn is_configured(&self) -> bool;

    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, GenerationError>> + Send;
}

/// Produce an illustration for a post.
pub trait ImageGenerator: Send + Sync {
    /// Returns an image URL, or `None` when unconfigured or on any failure.
    /// Never errors: a missing picture must not hold up the post.
    fn generate_image(&self, seed: &str) -> impl Future<Output = Option<String>> + Send;
}

/// Wrap a short seed in the house illustration style.
pub fn image_prompt(seed: &str) -> String {
    format!(
        "Иллюстрация для Telegram-поста в стиле HR-фильтр: {seed}. \
         Без текста, минимализм, чистый светлый фон, мягкие тени, спокойные цвета, \
         подходит для квадрата 1:1."
    )
}

/// Client for an OpenAI-compatible API.
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: Option<String>,
    base_url: Url,
    text_model: String,
    image_model: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("configured", &self.api_key.is_some())
            .field("base_url", &self.base_url.as_str())
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .finish()
    }
}

impl OpenAiClient {
    /// `base_url` must end with `/` so endpoint paths append to it.
    pub fn new(
        api_key: Option<String>,
        base_url: Url,
        text_model: impl Into<String>,
        image_model: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(concat!("draft_courier/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_key,
            base_url,
            text_model: text_model.into(),
            image_model: image_model.into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GenerationError> {
        self.base_url
            .join(path)
            .map_err(|e| GenerationError::Decode(format!("bad endpoint {path}: {e}")))
    }

    /// POST a JSON body and decode the JSON answer, mapping non-2xx to
    /// [`GenerationError::Api`].
    async fn post_json<B, R>(&self, key: &str, path: &str, body: &B) -> Result<R, GenerationError>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .http
            .post(self.endpoint(path)?)
            .bearer_auth(key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| truncate_for_log(&text, 300));
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }
        serde_json::from_str(&text).map_err(|e| {
            GenerationError::Decode(format!("{e}; body: {}", truncate_for_log(&text, 300)))
        })
    }

    async fn request_image(&self, key: &str, seed: &str) -> Result<Option<String>, GenerationError> {
        let prompt = image_prompt(seed);
        let request = ImageRequest {
            model: &self.image_model,
            prompt: &prompt,
            size: IMAGE_SIZE,
        };
        let response: ImageResponse = self.post_json(key, "images/generations", &request).await?;
        Ok(response.data.into_iter().next().and_then(|d| d.url))
    }
}

impl TextGenerator for OpenAiClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(level = "info", skip_all, fields(model = %self.text_model))]
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(GenerationError::MissingCredential)?;

        let t0 = Instant::now();
        let request = TextRequest {
            model: &self.text_model,
            input: prompt,
        };
        let result = self
            .post_json::<_, TextResponse>(key, "responses", &request)
            .await
            .and_then(|r| r.into_text().ok_or(GenerationError::EmptyOutput));
        let dt = t0.elapsed();

        match &result {
            Ok(text) => info!(
                elapsed_ms = dt.as_millis() as u64,
                chars = text.chars().count(),
                "Text generated"
            ),
            Err(e) => warn!(elapsed_ms = dt.as_millis() as u64, error = %e, "Text generation failed"),
        }
        result
    }
}

impl ImageGenerator for OpenAiClient {
    #[instrument(level = "info", skip_all, fields(model = %self.image_model))]
    async fn generate_image(&self, seed: &str) -> Option<String> {
        let key = self.api_key.as_deref()?;

        let t0 = Instant::now();
        match self.request_image(key, seed).await {
            Ok(Some(url)) => {
                info!(elapsed_ms = t0.elapsed().as_millis() as u64, "Image generated");
                Some(url)
            }
            Ok(None) => {
                warn!("Image response carried no URL");
                None
            }
            Err(e) => {
                error!(error = %e, "Image generation error");
                None
            }
        }
    }
}

#[derive(Serialize)]
struct TextRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct TextResponse {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl TextResponse {
    /// Collected `output_text` parts, or `None` when the model said nothing.
    fn into_text(self) -> Option<String> {
        if let Some(text) = self.output_text.filter(|t| !t.trim().is_empty()) {
            return Some(text);
        }
        let joined: String = self
            .output
            .into_iter()
            .flat_map(|item| item.content)
            .filter(|c| c.kind == "output_text")
            .filter_map(|c| c.text)
            .collect();
        (!joined.trim().is_empty()).then_some(joined)
    }
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}
