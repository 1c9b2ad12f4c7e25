//! Feedback types and the update policy for each.
//!
//! | Type              | Direction                              | Default weight |
//! |-------------------|----------------------------------------|----------------|
//! | `LIKE`            | toward the item                        | +0.10          |
//! | `NOT_RELEVANT`    | away from the item                     | -0.15          |
//! | `NOT_NOW`         | none                                   | 0              |
//! | `TOO_SUPERFICIAL` | away from the item's generic component | -0.08          |
//! | `TOO_ADVANCED`    | away from the item's specific residual | -0.08          |
//!
//! The graded types split the item embedding against its topic prototype:
//! `generic = project(item, prototype)`, `specific = item - generic`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use insight_embeddings::{Embedding, vector};

use crate::config::FeedbackWeights;
use crate::error::Result;

/// Closed set of feedback a user can give on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackType {
    Like,
    NotRelevant,
    NotNow,
    TooSuperficial,
    TooAdvanced,
}

impl FeedbackType {
    /// Every variant, in declaration order.
    pub const ALL: [FeedbackType; 5] = [
        Self::Like,
        Self::NotRelevant,
        Self::NotNow,
        Self::TooSuperficial,
        Self::TooAdvanced,
    ];

    /// Wire name of the variant.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Like => "LIKE",
            Self::NotRelevant => "NOT_RELEVANT",
            Self::NotNow => "NOT_NOW",
            Self::TooSuperficial => "TOO_SUPERFICIAL",
            Self::TooAdvanced => "TOO_ADVANCED",
        }
    }

    /// Whether this type needs a topic prototype to decompose the item.
    pub fn is_graded(self) -> bool {
        matches!(self, Self::TooSuperficial | Self::TooAdvanced)
    }
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown feedback type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFeedbackType(pub String);

impl fmt::Display for UnknownFeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown feedback type: {}", self.0)
    }
}

impl std::error::Error for UnknownFeedbackType {}

impl FromStr for FeedbackType {
    type Err = UnknownFeedbackType;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownFeedbackType(s.to_string()))
    }
}

/// Which part of the item the update moves along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStrategy {
    /// The full item embedding.
    FullItem,
    /// The projection of the item onto its topic prototype.
    GenericComponent,
    /// The item minus its generic component.
    SpecificComponent,
    /// Graded feedback without a prototype, treated as reduced `NOT_RELEVANT`.
    PrototypeFallback,
}

/// What the update engine should do for one event.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateInstruction {
    /// Leave the profile untouched.
    NoUpdate { feedback_type: FeedbackType },

    /// Move the profile by `weight` along `direction`.
    Shift {
        direction: Embedding,
        weight: f32,
        strategy: UpdateStrategy,
    },
}

/// Maps feedback to update instructions.
#[derive(Debug, Clone, Default)]
pub struct FeedbackClassifier {
    weights: FeedbackWeights,
}

impl FeedbackClassifier {
    /// Create a classifier with the given weights.
    pub fn new(weights: FeedbackWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    /// Configured weights.
    pub fn weights(&self) -> &FeedbackWeights {
        &self.weights
    }

    /// Decide how feedback on `item_embedding` should move a profile.
    pub fn classify(
        &self,
        content_id: &str,
        feedback_type: FeedbackType,
        item_embedding: &[f32],
        topic_prototype: Option<&[f32]>,
    ) -> Result<UpdateInstruction> {
        let weight = match feedback_type {
            FeedbackType::Like => self.weights.like,
            FeedbackType::NotRelevant => self.weights.not_relevant,
            FeedbackType::NotNow => self.weights.not_now,
            FeedbackType::TooSuperficial => self.weights.too_superficial,
            FeedbackType::TooAdvanced => self.weights.too_advanced,
        };

        let (direction, strategy) = match feedback_type {
            FeedbackType::NotNow => {
                return Ok(UpdateInstruction::NoUpdate { feedback_type });
            }
            FeedbackType::Like | FeedbackType::NotRelevant => {
                (item_embedding.to_vec(), UpdateStrategy::FullItem)
            }
            FeedbackType::TooSuperficial | FeedbackType::TooAdvanced => {
                let Some(prototype) = topic_prototype else {
                    warn!(
                        content_id,
                        feedback_type = %feedback_type,
                        "no topic prototype for graded feedback; applying reduced NOT_RELEVANT update"
                    );
                    return Ok(UpdateInstruction::Shift {
                        direction: item_embedding.to_vec(),
                        weight: self.weights.not_relevant * self.weights.prototype_fallback_factor,
                        strategy: UpdateStrategy::PrototypeFallback,
                    });
                };

                let generic = vector::project(item_embedding, prototype)?;
                if feedback_type == FeedbackType::TooSuperficial {
                    (generic, UpdateStrategy::GenericComponent)
                } else {
                    let specific = vector::subtract(item_embedding, &generic)?;
                    (specific, UpdateStrategy::SpecificComponent)
                }
            }
        };

        if weight == 0.0 {
            return Ok(UpdateInstruction::NoUpdate { feedback_type });
        }

        Ok(UpdateInstruction::Shift {
            direction,
            weight,
            strategy,
        })
    }
}
