//! Error types for feedback ingestion and processing.

use std::time::Duration;

use thiserror::Error;

use insight_embeddings::EmbeddingError;
use insight_ranking::RankingError;

/// Result type alias for feedback operations.
pub type Result<T> = std::result::Result<T, FeedbackError>;

/// Errors that can occur while ingesting or applying feedback.
#[derive(Error, Debug)]
pub enum FeedbackError {
    /// Request body failed validation.
    #[error("invalid feedback: {0}")]
    Validation(String),

    /// Feedback type outside the closed set.
    #[error("unknown feedback type: {0}")]
    UnknownFeedbackType(String),

    /// No profile exists for the user.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// Content item is not in the catalog.
    #[error("content not found: {0}")]
    ContentNotFound(String),

    /// The queue is full or shut down.
    #[error("feedback queue unavailable: {0}")]
    QueueUnavailable(String),

    /// The embedding gateway did not answer in time.
    #[error("embedding gateway timed out after {0:?}")]
    EmbeddingTimeout(Duration),

    /// The item has neither a usable embedding nor text to embed.
    #[error("content {0} has no usable embedding and no text to embed")]
    NotEmbeddable(String),

    /// The item's stored embedding is not unit length.
    #[error("content {content_id} has a non-unit embedding (norm {norm})")]
    InvalidEmbedding { content_id: String, norm: f32 },

    /// Ranking engine error.
    #[error("ranking error: {0}")]
    Ranking(#[from] RankingError),

    /// Embedding gateway error.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// TOML parse error.
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FeedbackError {
    /// Whether retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::QueueUnavailable(_) | Self::EmbeddingTimeout(_) | Self::Io(_) => true,
            Self::Ranking(e) => e.is_transient(),
            Self::Embedding(e) => e.is_transient(),
            Self::Validation(_)
            | Self::UnknownFeedbackType(_)
            | Self::UserNotFound(_)
            | Self::ContentNotFound(_)
            | Self::NotEmbeddable(_)
            | Self::InvalidEmbedding { .. }
            | Self::Config(_)
            | Self::Toml(_)
            | Self::Serialization(_) => false,
        }
    }

    /// Whether retrying can never succeed.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Short machine-readable kind, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::UnknownFeedbackType(_) => "validation_error",
            Self::UserNotFound(_) | Self::ContentNotFound(_) => "not_found",
            Self::QueueUnavailable(_) => "queue_unavailable",
            Self::EmbeddingTimeout(_) | Self::Embedding(_) => "embedding_error",
            Self::NotEmbeddable(_) | Self::InvalidEmbedding { .. } => "invalid_content",
            Self::Ranking(_) => "ranking_error",
            Self::Config(_) | Self::Toml(_) => "config_error",
            Self::Io(_) | Self::Serialization(_) => "internal_error",
        }
    }
}
