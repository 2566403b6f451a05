//! In-memory fakes for the outbound seams.
//!
//! Each fake records what it was asked to do so tests can assert on the exact
//! sequence of Bot API calls or generator requests.

use crate::api::{ImageGenerator, TextGenerator};
use crate::app::AppContext;
use crate::error::{DeliveryError, GenerationError};
use crate::feedback::FeedbackRecorder;
use crate::feeds::HeadlineSource;
use crate::prompt::PromptComposer;
use crate::telegram::{AnswerCallbackQuery, Channel, SendMessage, SendPhoto};
use std::future::Future;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One recorded outbound call.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Message(SendMessage),
    Photo(SendPhoto),
    Answer(AnswerCallbackQuery),
}

/// Channel that records every call. Optionally fails every send.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    pub sent: Mutex<Vec<Sent>>,
    pub fail_sends: bool,
}

impl RecordingChannel {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_sends: true,
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn push(&self, item: Sent) -> Result<(), DeliveryError> {
        if self.fail_sends {
            return Err(DeliveryError::Rejected {
                method: "test",
                description: "Forbidden: bot was kicked".to_string(),
            });
        }
        self.sent.lock().unwrap().push(item);
        Ok(())
    }
}

impl Channel for RecordingChannel {
    fn send_message(&self, message: SendMessage) -> impl Future<Output = Result<(), DeliveryError>> + Send {
        let result = self.push(Sent::Message(message));
        async move { result }
    }

    fn send_photo(&self, photo: SendPhoto) -> impl Future<Output = Result<(), DeliveryError>> + Send {
        let result = self.push(Sent::Photo(photo));
        async move { result }
    }

    fn answer_callback(
        &self,
        answer: AnswerCallbackQuery,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send {
        // Answers are recorded even when sends fail, to observe handler flow
        self.sent.lock().unwrap().push(Sent::Answer(answer));
        async { Ok(()) }
    }
}

/// What the fake text generator should do.
#[derive(Debug, Clone)]
pub enum TextBehavior {
    Unconfigured,
    Reply(String),
    Fail,
}

/// Scripted text + image generator.
#[derive(Debug)]
pub struct FakeGenerator {
    pub text: TextBehavior,
    pub image: Option<String>,
    pub prompts: Mutex<Vec<String>>,
    pub image_seeds: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn new(text: TextBehavior, image: Option<&str>) -> Self {
        Self {
            text,
            image: image.map(str::to_string),
            prompts: Mutex::new(Vec::new()),
            image_seeds: Mutex::new(Vec::new()),
        }
    }

    pub fn image_calls(&self) -> Vec<String> {
        self.image_seeds.lock().unwrap().clone()
    }
}

impl TextGenerator for FakeGenerator {
    fn is_configured(&self) -> bool {
        !matches!(self.text, TextBehavior::Unconfigured)
    }

    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, GenerationError>> + Send {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let result = match &self.text {
            TextBehavior::Unconfigured => Err(GenerationError::MissingCredential),
            TextBehavior::Reply(text) => Ok(text.clone()),
            TextBehavior::Fail => Err(GenerationError::Api {
                status: 500,
                message: "upstream exploded".to_string(),
            }),
        };
        async move { result }
    }
}

impl ImageGenerator for FakeGenerator {
    fn generate_image(&self, seed: &str) -> impl Future<Output = Option<String>> + Send {
        self.image_seeds.lock().unwrap().push(seed.to_string());
        // Mirror the real client: no credential, no picture
        let result = if self.is_configured() {
            self.image.clone()
        } else {
            None
        };
        async move { result }
    }
}

/// Headline source that counts how often it was asked.
#[derive(Debug, Default)]
pub struct FixedHeadlines {
    pub headlines: Vec<String>,
    pub calls: AtomicUsize,
}

impl HeadlineSource for FixedHeadlines {
    fn fetch_headlines(&self) -> impl Future<Output = Vec<String>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let headlines = self.headlines.clone();
        async move { headlines }
    }
}

pub type TestContext = AppContext<RecordingChannel, FakeGenerator, FixedHeadlines>;

/// Context rooted in `dir`: style file absent, ratings log at `dir/ratings.csv`.
pub fn test_context(dir: &Path, channel: RecordingChannel, generator: FakeGenerator) -> TestContext {
    let headlines = FixedHeadlines {
        headlines: vec!["Удалёнка возвращается — https://vc.ru/1".to_string()],
        calls: AtomicUsize::new(0),
    };
    AppContext::new(
        "-1001",
        channel,
        generator,
        PromptComposer::new(dir.join("brand_voice.md"), headlines),
        FeedbackRecorder::new(dir.join("ratings.csv")),
    )
}
