//! Multi-signal content scoring.
//!
//! `score = relevance * (w_q*quality + w_f*freshness + w_i*interaction + w_base)`
//!
//! Relevance gates the secondary signals multiplicatively, so an item with
//! zero or negative relevance can never outrank a relevant one on freshness
//! or popularity alone.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use insight_embeddings::vector;

use crate::config::ScorerConfig;
use crate::content::ContentSignals;
use crate::error::{Result, ScoringError};

/// Component sub-scores behind a ranking score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Cosine similarity between profile and item, in [-1, 1].
    pub relevance: f32,

    /// Exponential age decay, in (0, 1].
    pub freshness: f32,

    /// Quality estimate, in [0, 1].
    pub quality: f32,

    /// Interaction estimate, in [0, 1].
    pub interaction: f32,

    /// Weighted blend of the secondary signals, in [0, 1].
    pub secondary: f32,
}

/// Score for one (user, content item) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingResult {
    /// Item identifier.
    pub content_id: String,

    /// Final score, in [-1, 1].
    pub score: f32,

    /// Publication time, used to break ties.
    pub published_at: DateTime<Utc>,

    /// Sub-scores, when explanations are enabled.
    pub explanation: Option<ScoreBreakdown>,
}

/// Ordering used for ranked output: higher score first, then more recent,
/// then lexicographically smaller id.
pub fn compare_results(a: &RankingResult, b: &RankingResult) -> Ordering {
    OrderedFloat(b.score)
        .cmp(&OrderedFloat(a.score))
        .then_with(|| b.published_at.cmp(&a.published_at))
        .then_with(|| a.content_id.cmp(&b.content_id))
}

/// Pure scoring function over a profile vector and one item's signals.
#[derive(Debug, Clone, Default)]
pub struct ContentScorer {
    config: ScorerConfig,
}

impl ContentScorer {
    /// Create a scorer, rejecting invalid weights.
    pub fn new(config: ScorerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// `exp(-age_hours / half_life_hours)`. Items dated in the future count
    /// as brand new.
    pub fn freshness(&self, age_hours: f64) -> f32 {
        (-age_hours.max(0.0) / self.config.half_life_hours).exp() as f32
    }

    /// Check that a vector is unit length within the configured tolerance.
    pub fn check_unit(&self, which: &'static str, v: &[f32]) -> std::result::Result<(), ScoringError> {
        let tolerance = self.config.norm_tolerance;
        if vector::is_unit(v, tolerance) {
            Ok(())
        } else {
            Err(ScoringError::InvalidVector {
                which,
                norm: vector::norm(v),
                tolerance,
            })
        }
    }

    /// Score one item for a profile at time `now`.
    ///
    /// Neither vector is re-normalized: a non-unit input means something
    /// upstream is broken and is reported as [`ScoringError::InvalidVector`].
    pub fn score(
        &self,
        profile: &[f32],
        content_id: &str,
        signals: &ContentSignals,
        now: DateTime<Utc>,
    ) -> std::result::Result<RankingResult, ScoringError> {
        let embedding = signals
            .embedding
            .as_deref()
            .ok_or(ScoringError::MissingSignal("embedding"))?;
        let published_at = signals
            .published_at
            .ok_or(ScoringError::MissingSignal("published_at"))?;
        let quality = signals
            .quality
            .ok_or(ScoringError::MissingSignal("quality"))?;
        let interaction = signals
            .interaction
            .ok_or(ScoringError::MissingSignal("interaction"))?;

        check_unit_range("quality", quality)?;
        check_unit_range("interaction", interaction)?;

        if profile.len() != embedding.len() {
            return Err(ScoringError::DimensionMismatch {
                profile: profile.len(),
                item: embedding.len(),
            });
        }
        self.check_unit("profile", profile)?;
        self.check_unit("item", embedding)?;

        let relevance = vector::dot(profile, embedding)
            .map_err(|_| ScoringError::DimensionMismatch {
                profile: profile.len(),
                item: embedding.len(),
            })?
            .clamp(-1.0, 1.0);

        let age_hours = (now - published_at).num_milliseconds() as f64 / 3_600_000.0;
        let freshness = self.freshness(age_hours);

        let secondary = (self.config.quality_weight * quality
            + self.config.freshness_weight * freshness
            + self.config.interaction_weight * interaction
            + self.config.base_weight)
            .clamp(0.0, 1.0);

        let score = relevance * secondary;

        let explanation = self.config.explain.then_some(ScoreBreakdown {
            relevance,
            freshness,
            quality,
            interaction,
            secondary,
        });

        Ok(RankingResult {
            content_id: content_id.to_string(),
            score,
            published_at,
            explanation,
        })
    }
}

fn check_unit_range(name: &'static str, value: f32) -> std::result::Result<(), ScoringError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ScoringError::InvalidSignal { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn signals(embedding: Vec<f32>, age_hours: i64, quality: f32, interaction: f32) -> ContentSignals {
        ContentSignals::new(
            embedding,
            now() - Duration::hours(age_hours),
            quality,
            interaction,
        )
    }

    #[test]
    fn test_freshness_two_half_lives() {
        let scorer = ContentScorer::default();
        let freshness = scorer.freshness(144.0);
        assert!((freshness - (-2.0f32).exp()).abs() < 1e-6);
        assert!((freshness - 0.135).abs() < 1e-3);
    }

    #[test]
    fn test_future_items_are_fully_fresh() {
        let scorer = ContentScorer::default();
        assert_eq!(scorer.freshness(-5.0), 1.0);
    }

    #[test]
    fn test_score_formula() {
        let scorer = ContentScorer::default();
        let result = scorer
            .score(&[1.0, 0.0], "a", &signals(vec![1.0, 0.0], 0, 0.5, 0.5), now())
            .unwrap();

        // 1.0 * (0.4*0.5 + 0.3*1.0 + 0.2*0.5 + 0.1)
        assert!((result.score - 0.7).abs() < 1e-6);
        let breakdown = result.explanation.unwrap();
        assert_eq!(breakdown.relevance, 1.0);
        assert_eq!(breakdown.freshness, 1.0);
    }

    #[test]
    fn test_negative_relevance_never_beats_relevant_item() {
        let scorer = ContentScorer::default();
        let stale_relevant = scorer
            .score(&[1.0, 0.0], "a", &signals(vec![0.6, 0.8], 2000, 0.0, 0.0), now())
            .unwrap();
        let fresh_irrelevant = scorer
            .score(&[1.0, 0.0], "b", &signals(vec![-0.6, 0.8], 0, 1.0, 1.0), now())
            .unwrap();

        assert!(stale_relevant.score > fresh_irrelevant.score);
        assert!(fresh_irrelevant.score < 0.0);
    }

    #[test]
    fn test_monotonic_in_freshness() {
        let scorer = ContentScorer::default();
        let mut previous = f32::MIN;
        for age in [500, 200, 100, 50, 10, 0] {
            let score = scorer
                .score(&[0.6, 0.8], "a", &signals(vec![0.8, 0.6], age, 0.3, 0.7), now())
                .unwrap()
                .score;
            assert!(score >= previous, "score dropped as item got newer");
            previous = score;
        }
    }

    #[test]
    fn test_score_bounded() {
        let scorer = ContentScorer::default();
        for (embedding, quality, interaction) in [
            (vec![1.0, 0.0], 1.0, 1.0),
            (vec![-1.0, 0.0], 1.0, 1.0),
            (vec![0.0, 1.0], 0.0, 0.0),
        ] {
            let score = scorer
                .score(&[1.0, 0.0], "a", &signals(embedding, 0, quality, interaction), now())
                .unwrap()
                .score;
            assert!((-1.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn test_non_unit_item_rejected() {
        let scorer = ContentScorer::default();
        let err = scorer
            .score(&[1.0, 0.0], "a", &signals(vec![2.0, 0.0], 0, 0.5, 0.5), now())
            .unwrap_err();
        assert!(matches!(err, ScoringError::InvalidVector { which: "item", .. }));
    }

    #[test]
    fn test_non_unit_profile_rejected() {
        let scorer = ContentScorer::default();
        let err = scorer
            .score(&[0.5, 0.0], "a", &signals(vec![1.0, 0.0], 0, 0.5, 0.5), now())
            .unwrap_err();
        assert!(matches!(
            err,
            ScoringError::InvalidVector {
                which: "profile",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_signal_reported() {
        let scorer = ContentScorer::default();
        let mut partial = signals(vec![1.0, 0.0], 0, 0.5, 0.5);
        partial.interaction = None;

        let err = scorer.score(&[1.0, 0.0], "a", &partial, now()).unwrap_err();
        assert_eq!(err, ScoringError::MissingSignal("interaction"));
    }

    #[test]
    fn test_out_of_range_signal_reported() {
        let scorer = ContentScorer::default();
        let err = scorer
            .score(&[1.0, 0.0], "a", &signals(vec![1.0, 0.0], 0, 1.5, 0.5), now())
            .unwrap_err();
        assert!(matches!(
            err,
            ScoringError::InvalidSignal {
                name: "quality",
                ..
            }
        ));
    }

    #[test]
    fn test_dimension_mismatch_reported() {
        let scorer = ContentScorer::default();
        let err = scorer
            .score(&[1.0, 0.0], "a", &signals(vec![1.0, 0.0, 0.0], 0, 0.5, 0.5), now())
            .unwrap_err();
        assert_eq!(err, ScoringError::DimensionMismatch { profile: 2, item: 3 });
    }

    #[test]
    fn test_explanations_can_be_disabled() {
        let scorer = ContentScorer::new(ScorerConfig::default().with_explain(false)).unwrap();
        let result = scorer
            .score(&[1.0, 0.0], "a", &signals(vec![1.0, 0.0], 0, 0.5, 0.5), now())
            .unwrap();
        assert!(result.explanation.is_none());
    }

    #[test]
    fn test_tie_break_by_recency_then_id() {
        let older = RankingResult {
            content_id: "a".into(),
            score: 0.5,
            published_at: now() - Duration::hours(3),
            explanation: None,
        };
        let newer = RankingResult {
            content_id: "b".into(),
            score: 0.5,
            published_at: now(),
            explanation: None,
        };
        let newer_twin = RankingResult {
            content_id: "c".into(),
            ..newer.clone()
        };

        let mut results = vec![older.clone(), newer_twin.clone(), newer.clone()];
        results.sort_by(compare_results);

        let order: Vec<&str> = results.iter().map(|r| r.content_id.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }
}
