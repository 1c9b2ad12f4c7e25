//! # Ranking Engine
//!
//! Scores content against per-user interest vectors and evolves those
//! vectors from explicit feedback.
//!
//! - **Content Scorer**: relevance gated blend of quality, freshness and
//!   interaction
//! - **Ranker**: orders a candidate list for one user, isolating bad items
//! - **Feedback Classifier**: maps a feedback type to an update direction
//! - **Update Engine**: bounded, normalized profile updates
//! - **Profile Store**: compare-and-swap persistence of profile vectors
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Ranking Engine                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  scoring path                      update path                   │
//! │                                                                  │
//! │  ┌──────────────┐                  ┌──────────────┐              │
//! │  │    Ranker    │                  │   Feedback   │              │
//! │  └──────────────┘                  │  Classifier  │              │
//! │     │       │                      └──────────────┘              │
//! │     ▼       ▼                             │                      │
//! │  ┌──────┐ ┌──────────┐                    ▼                      │
//! │  │Scorer│ │ Content  │             ┌──────────────┐              │
//! │  └──────┘ │ Catalog  │             │    Update    │              │
//! │           └──────────┘             │    Engine    │              │
//! │     │                              └──────────────┘              │
//! │     │        ┌──────────────┐             │                      │
//! │     └──────► │   Profile    │ ◄───────────┘                      │
//! │      read    │    Store     │   compare-and-swap write           │
//! │              └──────────────┘                                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use insight_ranking::Ranker;
//!
//! let ranker = Ranker::builder()
//!     .with_profile_store(profiles)
//!     .with_catalog(catalog)
//!     .build()?;
//!
//! let outcome = ranker.rank("user-1", &candidates, Utc::now()).await?;
//! ```

pub mod config;
pub mod content;
pub mod error;
pub mod feedback;
pub mod profile;
pub mod ranker;
pub mod scorer;
pub mod update;

pub use config::{FeedbackWeights, RankingConfig, ScorerConfig, UpdateConfig};
pub use content::{
    ContentCatalog, ContentItem, ContentSignals, InMemoryContentCatalog, JsonContentCatalog,
};
pub use error::{RankingError, Result, ScoringError};
pub use feedback::{FeedbackClassifier, FeedbackType, UpdateInstruction, UpdateStrategy};
pub use profile::{
    InMemoryProfileStore, JsonFileProfileStore, ProfileStore, ProfileVector, WriteOutcome,
};
pub use ranker::{Ranker, RankerBuilder, RankingFailure, RankingOutcome};
pub use scorer::{ContentScorer, RankingResult, ScoreBreakdown};
pub use update::{UpdateEngine, UpdateOutcome};

// Re-export from dependencies for convenience
pub use insight_embeddings::Embedding;
