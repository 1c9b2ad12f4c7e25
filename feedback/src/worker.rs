//! Feedback worker pool.
//!
//! ```text
//!   FeedbackQueue ──► partition 0 ──┐
//!                 ──► partition 1 ──┼──► FeedbackProcessor ──► ProfileStore
//!                 ──► partition N ──┘          │
//!                                              ├──► DeferredFeedbackLog (NOT_NOW)
//!                                              └──► DeadLetterSink (gave up)
//! ```
//!
//! One task per partition. Transient failures are retried in place with
//! exponential backoff, which keeps later events for the same user behind
//! the one being retried.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use insight_embeddings::{Embedding, EmbeddingError, EmbeddingProvider, EmbeddingRequest, vector};
use insight_ranking::{
    ContentCatalog, ContentItem, FeedbackClassifier, FeedbackType, ProfileStore, RankingConfig,
    UpdateEngine, UpdateOutcome,
};

use crate::config::WorkerConfig;
use crate::dead_letter::{DeadLetter, DeadLetterSink};
use crate::deferred::DeferredFeedbackLog;
use crate::error::{FeedbackError, Result};
use crate::event::FeedbackEvent;
use crate::queue::FeedbackQueue;

/// What processing one event did.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// The profile vector was rewritten.
    Updated { version: u64, angular_shift: f32 },

    /// The feedback called for no change.
    Unchanged,

    /// `NOT_NOW`, recorded in the deferred log.
    Deferred,
}

/// Classifier, update engine and store access for one event at a time.
pub struct FeedbackProcessor {
    profiles: Arc<dyn ProfileStore>,
    catalog: Arc<dyn ContentCatalog>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    classifier: FeedbackClassifier,
    engine: UpdateEngine,
    deferred: Arc<DeferredFeedbackLog>,
    embed_timeout: Duration,
    norm_tolerance: f32,
}

impl FeedbackProcessor {
    /// Create a processor with default tuning and no embedding gateway.
    pub fn new(profiles: Arc<dyn ProfileStore>, catalog: Arc<dyn ContentCatalog>) -> Self {
        let worker = WorkerConfig::default();
        Self {
            profiles,
            catalog,
            embedder: None,
            classifier: FeedbackClassifier::default(),
            engine: UpdateEngine::default().with_max_write_attempts(worker.max_write_attempts),
            deferred: Arc::new(DeferredFeedbackLog::new()),
            embed_timeout: worker.embed_timeout(),
            norm_tolerance: RankingConfig::default().scorer.norm_tolerance,
        }
    }

    /// Embed item text through `embedder` when no usable embedding is stored.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Share a deferred log with the caller.
    pub fn with_deferred_log(mut self, deferred: Arc<DeferredFeedbackLog>) -> Self {
        self.deferred = deferred;
        self
    }

    /// Apply ranking and worker tuning.
    pub fn with_config(mut self, ranking: &RankingConfig, worker: &WorkerConfig) -> Result<Self> {
        self.classifier = FeedbackClassifier::new(ranking.feedback.clone())?;
        self.engine = UpdateEngine::new(ranking.update.clone())?
            .with_max_write_attempts(worker.max_write_attempts);
        self.embed_timeout = worker.embed_timeout();
        self.norm_tolerance = ranking.scorer.norm_tolerance;
        Ok(self)
    }

    /// Log of `NOT_NOW` events.
    pub fn deferred(&self) -> &Arc<DeferredFeedbackLog> {
        &self.deferred
    }

    /// Classify `event` and apply it to the user's stored profile.
    pub async fn process(&self, event: &FeedbackEvent) -> Result<ProcessOutcome> {
        if event.feedback_type == FeedbackType::NotNow {
            self.deferred.record(event).await;
            debug!(
                user_id = %event.user_id,
                content_id = %event.content_id,
                "recorded NOT_NOW deferral"
            );
            return Ok(ProcessOutcome::Deferred);
        }

        let item = self
            .catalog
            .get(&event.content_id)
            .await?
            .ok_or_else(|| FeedbackError::ContentNotFound(event.content_id.clone()))?;

        let embedding = self.item_embedding(&item).await?;
        let instruction = self.classifier.classify(
            &item.id,
            event.feedback_type,
            &embedding,
            item.topic_prototype.as_deref(),
        )?;

        let outcome = self
            .engine
            .apply_to_store(self.profiles.as_ref(), &event.user_id, &instruction)
            .await?;

        Ok(match outcome {
            UpdateOutcome::Unchanged => ProcessOutcome::Unchanged,
            UpdateOutcome::Updated {
                profile,
                angular_shift,
            } => ProcessOutcome::Updated {
                version: profile.version,
                angular_shift,
            },
        })
    }

    /// The item's stored embedding if it is unit length, otherwise a fresh
    /// normalized embedding of its text.
    async fn item_embedding(&self, item: &ContentItem) -> Result<Embedding> {
        let stored = item.signals.embedding.as_deref();
        if let Some(embedding) = stored {
            if vector::is_unit(embedding, self.norm_tolerance) {
                return Ok(embedding.to_vec());
            }
        }

        let (Some(text), Some(embedder)) = (item.text.as_deref(), self.embedder.as_ref()) else {
            return Err(match stored {
                Some(embedding) => FeedbackError::InvalidEmbedding {
                    content_id: item.id.clone(),
                    norm: vector::norm(embedding),
                },
                None => FeedbackError::NotEmbeddable(item.id.clone()),
            });
        };

        if let Some(embedding) = stored {
            warn!(
                content_id = %item.id,
                norm = vector::norm(embedding),
                "stored embedding is not unit length; re-embedding item text"
            );
        }

        let response = tokio::time::timeout(
            self.embed_timeout,
            embedder.embed(EmbeddingRequest::new(text)),
        )
        .await
        .map_err(|_| FeedbackError::EmbeddingTimeout(self.embed_timeout))??;

        let embedding = vector::normalize(&response.embedding);
        if !vector::is_unit(&embedding, self.norm_tolerance) {
            return Err(FeedbackError::InvalidEmbedding {
                content_id: item.id.clone(),
                norm: vector::norm(&embedding),
            });
        }
        Ok(embedding)
    }
}

/// Counters reported by [`WorkerPool::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    /// Events that finished successfully.
    pub processed: u64,

    /// Events that rewrote a profile.
    pub updated: u64,

    /// Events that left the profile as it was.
    pub unchanged: u64,

    /// `NOT_NOW` events recorded.
    pub deferred: u64,

    /// Retries after transient failures.
    pub retried: u64,

    /// Events sent to the dead-letter sink.
    pub dead_lettered: u64,
}

#[derive(Default)]
struct StatsCounters {
    processed: AtomicU64,
    updated: AtomicU64,
    unchanged: AtomicU64,
    deferred: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
}

impl StatsCounters {
    fn record(&self, outcome: &ProcessOutcome) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            ProcessOutcome::Updated { .. } => &self.updated,
            ProcessOutcome::Unchanged => &self.unchanged,
            ProcessOutcome::Deferred => &self.deferred,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            processed: self.processed.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
        }
    }
}

/// One consumer task per queue partition.
pub struct WorkerPool {
    queue: FeedbackQueue,
    handles: Vec<JoinHandle<()>>,
    counters: Arc<StatsCounters>,
}

impl WorkerPool {
    /// Create the queue and spawn one consumer per partition.
    pub fn start(
        config: &WorkerConfig,
        processor: Arc<FeedbackProcessor>,
        dead_letters: Arc<dyn DeadLetterSink>,
    ) -> Self {
        let (queue, receivers) = FeedbackQueue::bounded(config.partitions, config.queue_capacity);
        let counters = Arc::new(StatsCounters::default());

        let handles = receivers
            .into_iter()
            .enumerate()
            .map(|(index, receiver)| {
                let partition = Partition {
                    index,
                    processor: processor.clone(),
                    dead_letters: dead_letters.clone(),
                    counters: counters.clone(),
                    config: config.clone(),
                };
                tokio::spawn(partition.run(receiver))
            })
            .collect();

        info!(
            partitions = queue.partitions(),
            capacity = config.queue_capacity,
            "Feedback worker pool started"
        );

        Self {
            queue,
            handles,
            counters,
        }
    }

    /// Producer handle for the pool's queue.
    pub fn queue(&self) -> FeedbackQueue {
        self.queue.clone()
    }

    /// Current counters.
    pub fn stats(&self) -> WorkerStats {
        self.counters.snapshot()
    }

    /// Close the queue, wait for every partition to drain, and return the
    /// final counters.
    pub async fn shutdown(self) -> WorkerStats {
        self.queue.close().await;
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("feedback partition task failed: {e}");
            }
        }
        let stats = self.counters.snapshot();
        info!(
            processed = stats.processed,
            dead_lettered = stats.dead_lettered,
            "Feedback worker pool stopped"
        );
        stats
    }
}

struct Partition {
    index: usize,
    processor: Arc<FeedbackProcessor>,
    dead_letters: Arc<dyn DeadLetterSink>,
    counters: Arc<StatsCounters>,
    config: WorkerConfig,
}

impl Partition {
    async fn run(self, mut receiver: mpsc::Receiver<FeedbackEvent>) {
        debug!(partition = self.index, "partition started");
        while let Some(event) = receiver.recv().await {
            self.handle(event).await;
        }
        debug!(partition = self.index, "partition drained");
    }

    async fn handle(&self, event: FeedbackEvent) {
        let mut attempt: u32 = 1;
        loop {
            match self.processor.process(&event).await {
                Ok(outcome) => {
                    debug!(
                        partition = self.index,
                        feedback_id = %event.feedback_id,
                        user_id = %event.user_id,
                        feedback_type = %event.feedback_type,
                        ?outcome,
                        "feedback applied"
                    );
                    self.counters.record(&outcome);
                    return;
                }
                Err(e) if e.is_transient() && attempt <= self.config.max_retries => {
                    let delay = self.retry_delay(&e, attempt);
                    warn!(
                        partition = self.index,
                        feedback_id = %event.feedback_id,
                        user_id = %event.user_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, retrying: {e}"
                    );
                    self.counters.retried.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    self.dead_letter(event, &e, attempt).await;
                    return;
                }
            }
        }
    }

    /// Backoff for `attempt`, stretched to honor a gateway's retry-after.
    fn retry_delay(&self, error: &FeedbackError, attempt: u32) -> Duration {
        let backoff = self.config.backoff(attempt);
        match error {
            FeedbackError::Embedding(EmbeddingError::RateLimited { retry_after_secs }) => backoff
                .max(Duration::from_secs(*retry_after_secs))
                .min(Duration::from_millis(self.config.backoff_cap_ms)),
            _ => backoff,
        }
    }

    async fn dead_letter(&self, event: FeedbackEvent, error: &FeedbackError, attempts: u32) {
        error!(
            partition = self.index,
            feedback_id = %event.feedback_id,
            user_id = %event.user_id,
            content_id = %event.content_id,
            attempts,
            transient = error.is_transient(),
            "dead-lettering feedback event: {error}"
        );
        self.counters.dead_lettered.fetch_add(1, Ordering::Relaxed);

        let letter = DeadLetter::new(event, error, attempts);
        if let Err(e) = self.dead_letters.send(letter).await {
            error!(partition = self.index, "failed to write dead letter: {e}");
        }
    }
}
