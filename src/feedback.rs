//! Append-only log of draft ratings.
//!
//! Every vote becomes one `timestamp;reaction;user_id` line. The file is
//! opened, appended and closed per vote; there is no read path.

use crate::models::{FeedbackRecord, Reaction};
use chrono::Local;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

/// Writes votes to the ratings log.
#[derive(Debug, Clone)]
pub struct FeedbackRecorder {
    path: PathBuf,
}

impl FeedbackRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one vote, stamped with the current local time.
    #[instrument(level = "info", skip(self))]
    pub async fn record(&self, reaction: Reaction, user_id: i64) -> io::Result<FeedbackRecord> {
        let record = FeedbackRecord {
            timestamp: Local::now(),
            reaction,
            user_id,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{}\n", record.to_line()).as_bytes())
            .await?;
        file.flush().await?;

        info!(path = %self.path.display(), "Vote recorded");
        Ok(record)
    }
}
