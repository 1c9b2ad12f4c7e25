//! Error types for ranking and profile updates.

use thiserror::Error;

/// Result type alias for ranking operations.
pub type Result<T> = std::result::Result<T, RankingError>;

/// Errors that can occur while ranking content or updating profiles.
#[derive(Error, Debug)]
pub enum RankingError {
    /// Vector math or embedding gateway error.
    #[error("embedding error: {0}")]
    Embedding(#[from] insight_embeddings::EmbeddingError),

    /// Scoring error for a single item.
    #[error("scoring error: {0}")]
    Scoring(#[from] ScoringError),

    /// No profile vector exists for the user.
    #[error("profile not found for user: {0}")]
    ProfileNotFound(String),

    /// Content item is not in the catalog.
    #[error("content not found: {0}")]
    ContentNotFound(String),

    /// A vector that must be unit length or non-zero is not.
    #[error("invalid profile vector for user {user_id}: {reason}")]
    InvalidProfile { user_id: String, reason: String },

    /// Applying the update would leave a zero vector.
    #[error("update would cancel the profile vector to zero")]
    DegenerateUpdate,

    /// Compare-and-swap writes kept losing to concurrent writers.
    #[error("write conflict for user {user_id} after {attempts} attempts")]
    WriteConflict { user_id: String, attempts: u32 },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RankingError {
    /// Whether retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Embedding(e) => e.is_transient(),
            Self::WriteConflict { .. } | Self::Io(_) => true,
            Self::Scoring(_)
            | Self::ProfileNotFound(_)
            | Self::ContentNotFound(_)
            | Self::InvalidProfile { .. }
            | Self::DegenerateUpdate
            | Self::Config(_)
            | Self::Serialization(_) => false,
        }
    }
}

/// Why a single content item could not be scored.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    /// A vector presented to the scorer is not unit length.
    #[error("invalid {which} vector: norm {norm} deviates from 1 by more than {tolerance}")]
    InvalidVector {
        which: &'static str,
        norm: f32,
        tolerance: f32,
    },

    /// A required signal is absent.
    #[error("missing signal: {0}")]
    MissingSignal(&'static str),

    /// A signal is present but outside its documented range.
    #[error("signal {name} out of range: {value}")]
    InvalidSignal { name: &'static str, value: f32 },

    /// Profile and item embeddings have different dimensions.
    #[error("dimension mismatch: profile {profile}, item {item}")]
    DimensionMismatch { profile: usize, item: usize },
}
