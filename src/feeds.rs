//! Headline aggregation from a fixed set of syndication feeds.
//!
//! Each endpoint is fetched, parsed as RSS or Atom, and contributes its first
//! [`ITEMS_PER_FEED`] entries in document order. The combined list is
//! shuffled and capped at [`MAX_HEADLINES`]. A feed that fails to download or
//! parse is logged and contributes nothing; the run goes on with whatever the
//! other feeds returned.

use crate::error::FeedError;
use crate::models::FeedItem;
use feed_rs::parser;
use futures::stream::{self, StreamExt};
use rand::Rng;
use rand::seq::SliceRandom;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Sources polled for every draft.
pub const FEEDS: &[&str] = &[
    "https://habr.com/ru/rss/all/all/?fl=ru",
    "https://vc.ru/rss/all",
    "https://rb.ru/rss/",
];

/// Entries taken from the top of each feed.
pub const ITEMS_PER_FEED: usize = 3;

/// Upper bound on headlines handed to the prompt.
pub const MAX_HEADLINES: usize = 5;

/// Returned alone when no feed produced anything.
pub const NO_NEWS: &str = "Нет новостей сегодня";

const CONNECT_TIMEOUT_SECS: u64 = 10;
const TOTAL_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = concat!("draft_courier/", env!("CARGO_PKG_VERSION"));

/// Anything that can hand the prompt composer a headline sample.
pub trait HeadlineSource: Send + Sync {
    /// At most [`MAX_HEADLINES`] `"title — link"` strings, never empty.
    fn fetch_headlines(&self) -> impl Future<Output = Vec<String>> + Send;
}

/// Fetches the fixed [`FEEDS`] over HTTP.
#[derive(Debug, Clone)]
pub struct FeedAggregator {
    client: Client,
    endpoints: Vec<String>,
}

impl FeedAggregator {
    /// Aggregator over the built-in [`FEEDS`].
    pub fn new() -> Result<Self, FeedError> {
        Self::with_endpoints(FEEDS.iter().map(|s| s.to_string()).collect())
    }

    /// Aggregator over an explicit endpoint list.
    pub fn with_endpoints(endpoints: Vec<String>) -> Result<Self, FeedError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(TOTAL_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, endpoints })
    }

    /// Download and parse one feed.
    #[instrument(level = "info", skip(self))]
    async fn fetch_feed(&self, url: &str) -> Result<Vec<FeedItem>, FeedError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FeedError::Status(response.status()));
        }
        let bytes = response.bytes().await?;
        let items = parse_feed(&bytes, ITEMS_PER_FEED)?;
        debug!(count = items.len(), "Parsed feed");
        Ok(items)
    }
}

impl HeadlineSource for FeedAggregator {
    #[instrument(level = "info", skip_all)]
    async fn fetch_headlines(&self) -> Vec<String> {
        let per_feed: Vec<Vec<FeedItem>> = stream::iter(self.endpoints.iter())
            .then(|url| async move {
                match self.fetch_feed(url).await {
                    Ok(items) => items,
                    Err(e) => {
                        warn!(%url, error = %e, "Feed unavailable; skipping");
                        Vec::new()
                    }
                }
            })
            .collect()
            .await;

        let items: Vec<FeedItem> = per_feed.into_iter().flatten().collect();
        info!(count = items.len(), "Collected feed entries");
        sample_headlines(items, &mut rand::rng())
    }
}

/// Shuffle, cap at [`MAX_HEADLINES`], and fall back to [`NO_NEWS`].
pub fn sample_headlines<R: Rng + ?Sized>(mut items: Vec<FeedItem>, rng: &mut R) -> Vec<String> {
    if items.is_empty() {
        return vec![NO_NEWS.to_string()];
    }
    items.shuffle(rng);
    items
        .into_iter()
        .take(MAX_HEADLINES)
        .map(|item| item.to_string())
        .collect()
}

/// Parse an RSS or Atom document and keep the first `limit` titled entries.
pub fn parse_feed(bytes: &[u8], limit: usize) -> Result<Vec<FeedItem>, FeedError> {
    let feed = parser::parse(bytes).map_err(|e| FeedError::Parse(e.to_string()))?;

    Ok(feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let title = entry.title.map(|t| t.content.trim().to_string())?;
            if title.is_empty() {
                return None;
            }
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            Some(FeedItem { title, link })
        })
        .take(limit)
        .collect())
}
