//! Domain data for one draft run and the feedback it collects.
//!
//! - [`FeedItem`]: a headline pulled from a syndication feed
//! - [`PostDraft`]: the generated post as it is about to be delivered
//! - [`Reaction`] and [`FeedbackRecord`]: a vote on a delivered draft
//!
//! Nothing here is persisted except [`FeedbackRecord`], which is written as
//! one line of the ratings log.

use chrono::{DateTime, Local};
use std::fmt;
use std::str::FromStr;

/// A single headline taken from a syndication feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    /// Entry title as published by the source.
    pub title: String,
    /// Entry link; empty when the source omitted it.
    pub link: String,
}

impl fmt::Display for FeedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} — {}", self.title, self.link)
    }
}

/// A generated post on its way to the channel.
#[derive(Debug, Clone)]
pub struct PostDraft {
    /// Text returned by the model, or a placeholder in degraded mode.
    pub body: String,
    /// Date-stamped, hashtagged caption built around `body`.
    pub caption: String,
    /// Illustration URL when one was requested and obtained.
    pub image_url: Option<String>,
}

/// Vote attached to a delivered draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Up,
    Down,
}

impl Reaction {
    /// Callback payload used on the inline button and in the log.
    pub fn tag(self) -> &'static str {
        match self {
            Reaction::Up => "rate_up",
            Reaction::Down => "rate_down",
        }
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Reaction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rate_up" => Ok(Reaction::Up),
            "rate_down" => Ok(Reaction::Down),
            _ => Err(()),
        }
    }
}

/// One vote as stored in the ratings log.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRecord {
    pub timestamp: DateTime<Local>,
    pub reaction: Reaction,
    pub user_id: i64,
}

impl FeedbackRecord {
    /// Render as `timestamp;reaction;user_id` (no trailing newline).
    pub fn to_line(&self) -> String {
        format!(
            "{};{};{}",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.6f"),
            self.reaction,
            self.user_id
        )
    }
}
