//! # Embeddings
//!
//! Vector math and the embedding gateway used by the InsightHub
//! personalization engine.
//!
//! ## Features
//!
//! - **Vector Utilities**: normalization, projection and weighted updates,
//!   the single place where vector arithmetic happens
//! - **Embedding Gateway**: text to fixed-length vectors via an
//!   OpenAI-compatible API
//! - **Caching**: avoid re-embedding the same text
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings                                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► vector::{normalize, ...}  │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  OpenAIProvider ◄── CachedProvider ──► EmbeddingCache          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod provider;
pub mod vector;

pub use cache::{CachedProvider, EmbeddingCache};
pub use error::{EmbeddingError, Result};
pub use provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OpenAIProvider};
pub use vector::{cosine_similarity, normalize, project, weighted_add};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings (varies by model).
pub const DEFAULT_DIMENSION: usize = 1536; // OpenAI text-embedding-3-small
