//! Configuration for the feedback pipeline and server.
//!
//! Everything can be loaded from one TOML file; every field is optional.
//!
//! ```toml
//! [worker]
//! partitions = 8
//! max_retries = 3
//!
//! [ranking.update]
//! max_weight = 0.15
//!
//! [server]
//! bind = "0.0.0.0:8080"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use insight_ranking::RankingConfig;

use crate::error::{FeedbackError, Result};

/// Aggregate configuration for the pipeline binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Scoring and update tuning.
    pub ranking: RankingConfig,

    /// Worker pool settings.
    pub worker: WorkerConfig,

    /// HTTP server and storage locations.
    pub server: ServerConfig,
}

impl PipelineConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        info!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.ranking.validate()?;
        self.worker.validate()?;
        Ok(())
    }
}

/// Feedback worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of partitions; each has one consumer task.
    pub partitions: usize,

    /// Bounded capacity of each partition's queue.
    pub queue_capacity: usize,

    /// Timeout for one embedding gateway call, in milliseconds.
    pub embed_timeout_ms: u64,

    /// Retries for a transient failure before dead-lettering.
    pub max_retries: u32,

    /// First retry delay, in milliseconds.
    pub backoff_base_ms: u64,

    /// Largest retry delay, in milliseconds.
    pub backoff_cap_ms: u64,

    /// Compare-and-swap attempts per profile update.
    pub max_write_attempts: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            partitions: 4,
            queue_capacity: 1024,
            embed_timeout_ms: 5_000,
            max_retries: 5,
            backoff_base_ms: 200,
            backoff_cap_ms: 30_000,
            max_write_attempts: 8,
        }
    }
}

impl WorkerConfig {
    /// Set the number of partitions.
    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions;
        self
    }

    /// Set the per-partition queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the embedding gateway timeout.
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the retry budget and backoff bounds.
    pub fn with_retries(mut self, max_retries: u32, base: Duration, cap: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = base.as_millis() as u64;
        self.backoff_cap_ms = cap.as_millis() as u64;
        self
    }

    /// Embedding gateway timeout.
    pub fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }

    /// Delay before retry number `attempt` (1-based):
    /// `min(base * 2^(attempt - 1), cap)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let delay = self.backoff_base_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.backoff_cap_ms))
    }

    /// Reject settings the pool cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.partitions == 0 {
            return Err(FeedbackError::Config(
                "worker.partitions must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(FeedbackError::Config(
                "worker.queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.embed_timeout_ms == 0 {
            return Err(FeedbackError::Config(
                "worker.embed_timeout_ms must be positive".to_string(),
            ));
        }
        if self.max_write_attempts == 0 {
            return Err(FeedbackError::Config(
                "worker.max_write_attempts must be at least 1".to_string(),
            ));
        }
        if self.backoff_base_ms > self.backoff_cap_ms {
            return Err(FeedbackError::Config(
                "worker.backoff_base_ms exceeds worker.backoff_cap_ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP server and storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind (host:port).
    pub bind: String,

    /// JSON file backing the profile store.
    pub profile_store_path: PathBuf,

    /// JSON array of content items.
    pub catalog_path: PathBuf,

    /// JSON-lines file receiving dead-lettered events.
    pub dead_letter_path: PathBuf,

    /// Embedding gateway settings.
    pub embedding: EmbeddingSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            profile_store_path: PathBuf::from("data/profiles.json"),
            catalog_path: PathBuf::from("data/catalog.json"),
            dead_letter_path: PathBuf::from("data/dead_letters.jsonl"),
            embedding: EmbeddingSettings::default(),
        }
    }
}

/// Embedding gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Whether to embed item text when no embedding is stored.
    pub enabled: bool,

    /// OpenAI-compatible base URL.
    pub base_url: String,

    /// Embedding model.
    pub model: String,

    /// Requested output dimension.
    pub dimensions: Option<usize>,

    /// Longest accepted input, in characters.
    pub max_input_chars: usize,

    /// Entries kept in the embedding cache.
    pub cache_capacity: usize,

    /// Optional file persisting the cache.
    pub cache_path: Option<PathBuf>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: None,
            max_input_chars: insight_embeddings::provider::DEFAULT_MAX_INPUT_CHARS,
            cache_capacity: 10_000,
            cache_path: None,
        }
    }
}
