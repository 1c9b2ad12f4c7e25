//! Tuning constants for scoring and profile updates.
//!
//! The defaults come from planning documents and have not been validated
//! against real data, so every one of them is configuration.

use serde::{Deserialize, Serialize};

use crate::error::{RankingError, Result};

/// Aggregate configuration for the ranking engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Content scorer configuration.
    pub scorer: ScorerConfig,

    /// Per-feedback-type update weights.
    pub feedback: FeedbackWeights,

    /// Update engine bounds.
    pub update: UpdateConfig,
}

impl RankingConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.scorer.validate()?;
        self.feedback.validate()?;
        self.update.validate()
    }

    /// Set the scorer configuration.
    pub fn with_scorer(mut self, config: ScorerConfig) -> Self {
        self.scorer = config;
        self
    }

    /// Set the feedback weights.
    pub fn with_feedback(mut self, weights: FeedbackWeights) -> Self {
        self.feedback = weights;
        self
    }

    /// Set the update configuration.
    pub fn with_update(mut self, config: UpdateConfig) -> Self {
        self.update = config;
        self
    }
}

/// Configuration for the content scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Freshness decay constant in hours.
    pub half_life_hours: f64,

    /// Weight for the quality signal.
    pub quality_weight: f32,

    /// Weight for the freshness signal.
    pub freshness_weight: f32,

    /// Weight for the interaction signal.
    pub interaction_weight: f32,

    /// Constant floor so relevance alone still counts.
    pub base_weight: f32,

    /// Allowed deviation from unit length for input vectors.
    pub norm_tolerance: f32,

    /// Whether to attach a component breakdown to each result.
    pub explain: bool,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            half_life_hours: 72.0,
            quality_weight: 0.4,
            freshness_weight: 0.3,
            interaction_weight: 0.2,
            base_weight: 0.1,
            norm_tolerance: insight_embeddings::vector::UNIT_TOLERANCE,
            explain: true,
        }
    }
}

impl ScorerConfig {
    /// Set the freshness half-life.
    pub fn with_half_life_hours(mut self, hours: f64) -> Self {
        self.half_life_hours = hours;
        self
    }

    /// Set the blend weights (quality, freshness, interaction, base).
    pub fn with_weights(mut self, quality: f32, freshness: f32, interaction: f32, base: f32) -> Self {
        self.quality_weight = quality;
        self.freshness_weight = freshness;
        self.interaction_weight = interaction;
        self.base_weight = base;
        self
    }

    /// Enable or disable explanations.
    pub fn with_explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    /// Blend weights must be non-negative and sum to one.
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("quality_weight", self.quality_weight),
            ("freshness_weight", self.freshness_weight),
            ("interaction_weight", self.interaction_weight),
            ("base_weight", self.base_weight),
        ];

        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RankingError::Config(format!(
                    "{name} must be a non-negative number, got {weight}"
                )));
            }
        }

        let sum: f32 = weights.iter().map(|(_, w)| w).sum();
        if (sum - 1.0).abs() > 1e-4 {
            return Err(RankingError::Config(format!(
                "scorer weights must sum to 1, got {sum}"
            )));
        }

        if !self.half_life_hours.is_finite() || self.half_life_hours <= 0.0 {
            return Err(RankingError::Config(format!(
                "half_life_hours must be positive, got {}",
                self.half_life_hours
            )));
        }

        if !self.norm_tolerance.is_finite() || self.norm_tolerance < 0.0 {
            return Err(RankingError::Config(format!(
                "norm_tolerance must be non-negative, got {}",
                self.norm_tolerance
            )));
        }

        Ok(())
    }
}

/// Signed update weight per feedback type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackWeights {
    pub like: f32,
    pub not_relevant: f32,
    pub not_now: f32,
    pub too_superficial: f32,
    pub too_advanced: f32,

    /// Factor applied to the `not_relevant` weight when a graded type has no
    /// topic prototype to decompose against.
    pub prototype_fallback_factor: f32,
}

impl Default for FeedbackWeights {
    fn default() -> Self {
        Self {
            like: 0.10,
            not_relevant: -0.15,
            not_now: 0.0,
            too_superficial: -0.08,
            too_advanced: -0.08,
            prototype_fallback_factor: 0.5,
        }
    }
}

impl FeedbackWeights {
    /// Every weight must be finite; the fallback factor must lie in [0, 1].
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("like", self.like),
            ("not_relevant", self.not_relevant),
            ("not_now", self.not_now),
            ("too_superficial", self.too_superficial),
            ("too_advanced", self.too_advanced),
        ];
        if let Some((name, weight)) = weights.iter().find(|(_, w)| !w.is_finite()) {
            return Err(RankingError::Config(format!(
                "feedback weight {name} must be finite, got {weight}"
            )));
        }
        if !(0.0..=1.0).contains(&self.prototype_fallback_factor) {
            return Err(RankingError::Config(format!(
                "prototype_fallback_factor must lie in [0, 1], got {}",
                self.prototype_fallback_factor
            )));
        }
        Ok(())
    }
}

/// Bounds enforced by the update engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Largest weight magnitude a single event may apply.
    pub max_weight: f32,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self { max_weight: 0.2 }
    }
}

impl UpdateConfig {
    /// The clamp must be a positive number below one.
    pub fn validate(&self) -> Result<()> {
        if !self.max_weight.is_finite() || self.max_weight <= 0.0 || self.max_weight >= 1.0 {
            return Err(RankingError::Config(format!(
                "max_weight must lie in (0, 1), got {}",
                self.max_weight
            )));
        }
        Ok(())
    }
}
