//! Dead-letter destinations for events the worker gave up on.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use crate::error::{FeedbackError, Result};
use crate::event::FeedbackEvent;

/// An event that will not be retried, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// The event as it was queued.
    pub event: FeedbackEvent,

    /// Last error message.
    pub error: String,

    /// Whether the last error was transient (retries ran out).
    pub transient: bool,

    /// Processing attempts made.
    pub attempts: u32,

    /// When the event was dead-lettered.
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    /// Record `event` as failed with `error` after `attempts` tries.
    pub fn new(event: FeedbackEvent, error: &FeedbackError, attempts: u32) -> Self {
        Self {
            event,
            error: error.to_string(),
            transient: error.is_transient(),
            attempts,
            failed_at: Utc::now(),
        }
    }
}

/// Destination for dead-lettered events.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Store one dead letter.
    async fn send(&self, letter: DeadLetter) -> Result<()>;
}

/// Dead letters kept in memory, for tests and inspection.
#[derive(Default)]
pub struct InMemoryDeadLetters {
    letters: RwLock<Vec<DeadLetter>>,
}

impl InMemoryDeadLetters {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored letters.
    pub async fn letters(&self) -> Vec<DeadLetter> {
        self.letters.read().await.clone()
    }

    /// Number of stored letters.
    pub async fn len(&self) -> usize {
        self.letters.read().await.len()
    }

    /// Whether no letters are stored.
    pub async fn is_empty(&self) -> bool {
        self.letters.read().await.is_empty()
    }
}

#[async_trait]
impl DeadLetterSink for InMemoryDeadLetters {
    async fn send(&self, letter: DeadLetter) -> Result<()> {
        self.letters.write().await.push(letter);
        Ok(())
    }
}

/// Dead letters appended to a JSON-lines file for offline reprocessing.
pub struct JsonLinesDeadLetters {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesDeadLetters {
    /// Append to `path`, creating parent directories on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every letter back.
    pub async fn read_all(&self) -> Result<Vec<DeadLetter>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).await?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(FeedbackError::from))
            .collect()
    }
}

#[async_trait]
impl DeadLetterSink for JsonLinesDeadLetters {
    async fn send(&self, letter: DeadLetter) -> Result<()> {
        let mut line = serde_json::to_string(&letter)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_ranking::FeedbackType;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use crate::event::FeedbackRequest;

    fn letter(user_id: &str) -> DeadLetter {
        let event = FeedbackRequest::new("c1", user_id, FeedbackType::Like)
            .validate(Utc::now())
            .unwrap();
        DeadLetter::new(event, &FeedbackError::ContentNotFound("c1".into()), 1)
    }

    #[tokio::test]
    async fn test_in_memory_sink() {
        let sink = InMemoryDeadLetters::new();
        sink.send(letter("u1")).await.unwrap();

        let letters = sink.letters().await;
        assert_eq!(letters.len(), 1);
        assert!(!letters[0].transient);
        assert_eq!(letters[0].error, "content not found: c1");
    }

    #[tokio::test]
    async fn test_json_lines_sink_appends() {
        let dir = TempDir::new().unwrap();
        let sink = JsonLinesDeadLetters::new(dir.path().join("dlq/dead.jsonl"));
        assert!(sink.read_all().await.unwrap().is_empty());

        sink.send(letter("u1")).await.unwrap();
        sink.send(letter("u2")).await.unwrap();

        let letters = sink.read_all().await.unwrap();
        let users: Vec<&str> = letters.iter().map(|l| l.event.user_id.as_str()).collect();
        assert_eq!(users, vec!["u1", "u2"]);
    }
}
