//! Profile vector update engine.
//!
//! `v_new = normalize(v_old + w * direction)` with `|w|` clamped to the
//! configured maximum, so a single event moves a profile by a bounded angle
//! no matter what the classifier asked for.

use tracing::{debug, warn};

use insight_embeddings::{Embedding, vector};

use crate::config::UpdateConfig;
use crate::error::{RankingError, Result};
use crate::feedback::UpdateInstruction;
use crate::profile::{ProfileStore, ProfileVector, WriteOutcome};

/// Default number of compare-and-swap attempts before giving up.
pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 8;

/// Result of applying one instruction to a stored profile.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The instruction did not call for a change.
    Unchanged,

    /// The profile was rewritten.
    Updated {
        /// The stored profile after the write.
        profile: ProfileVector,

        /// Angle in radians between the old and new vectors.
        angular_shift: f32,
    },
}

/// Arithmetic kernel plus bounds enforcement for profile updates.
#[derive(Debug, Clone)]
pub struct UpdateEngine {
    config: UpdateConfig,
    max_write_attempts: u32,
}

impl UpdateEngine {
    /// Create an engine, rejecting an invalid clamp.
    pub fn new(config: UpdateConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        })
    }

    /// Set how many compare-and-swap attempts to make per update.
    pub fn with_max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts.max(1);
        self
    }

    /// Largest weight magnitude applied.
    pub fn max_weight(&self) -> f32 {
        self.config.max_weight
    }

    /// Clamp `weight` into `[-max_weight, max_weight]`.
    pub fn clamp_weight(&self, weight: f32) -> f32 {
        if weight.is_nan() {
            return 0.0;
        }
        weight.clamp(-self.config.max_weight, self.config.max_weight)
    }

    /// Compute the new profile vector.
    pub fn apply(&self, profile: &[f32], direction: &[f32], weight: f32) -> Result<Embedding> {
        let clamped = self.clamp_weight(weight);
        if clamped != weight {
            warn!(
                requested = weight,
                applied = clamped,
                "update weight clamped"
            );
        }

        let updated = vector::weighted_add(profile, direction, clamped)?;
        if vector::norm(&updated) == 0.0 {
            return Err(RankingError::DegenerateUpdate);
        }
        Ok(updated)
    }

    /// Read-modify-write `instruction` against the stored profile for
    /// `user_id`, retrying on compare-and-swap conflicts.
    pub async fn apply_to_store(
        &self,
        store: &dyn ProfileStore,
        user_id: &str,
        instruction: &UpdateInstruction,
    ) -> Result<UpdateOutcome> {
        let (direction, weight) = match instruction {
            UpdateInstruction::NoUpdate { .. } => return Ok(UpdateOutcome::Unchanged),
            UpdateInstruction::Shift {
                direction, weight, ..
            } => (direction, *weight),
        };

        for attempt in 1..=self.max_write_attempts {
            let current = store
                .read(user_id)
                .await?
                .ok_or_else(|| RankingError::ProfileNotFound(user_id.to_string()))?;

            let updated = self.apply(&current.values, direction, weight)?;
            let angular_shift = vector::angular_distance(&current.values, &updated)?;

            match store.write(user_id, updated, &current).await? {
                WriteOutcome::Written(profile) => {
                    debug!(
                        user_id,
                        version = profile.version,
                        angular_shift,
                        "profile updated"
                    );
                    return Ok(UpdateOutcome::Updated {
                        profile,
                        angular_shift,
                    });
                }
                WriteOutcome::Conflict => {
                    debug!(user_id, attempt, "profile write conflict, re-reading");
                }
            }
        }

        Err(RankingError::WriteConflict {
            user_id: user_id.to_string(),
            attempts: self.max_write_attempts,
        })
    }
}

impl Default for UpdateEngine {
    fn default() -> Self {
        Self {
            config: UpdateConfig::default(),
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::feedback::{FeedbackClassifier, FeedbackType, UpdateStrategy};
    use crate::profile::InMemoryProfileStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_like_scenario() {
        let engine = UpdateEngine::default();
        let updated = engine.apply(&[1.0, 0.0], &[0.0, 1.0], 0.10).unwrap();
        assert!((updated[0] - 0.995).abs() < 1e-3);
        assert!((updated[1] - 0.0995).abs() < 1e-3);
    }

    #[test]
    fn test_weight_is_clamped() {
        let engine = UpdateEngine::default();
        assert_eq!(engine.clamp_weight(5.0), 0.2);
        assert_eq!(engine.clamp_weight(-5.0), -0.2);
        assert_eq!(engine.clamp_weight(f32::NAN), 0.0);

        let huge = engine.apply(&[1.0, 0.0], &[0.0, 1.0], 100.0).unwrap();
        let bounded = engine.apply(&[1.0, 0.0], &[0.0, 1.0], 0.2).unwrap();
        assert_eq!(huge, bounded);
    }

    #[test]
    fn test_angular_shift_is_bounded() {
        let engine = UpdateEngine::default();
        let limit = (1.0f32 - engine.max_weight()).acos();
        let directions = [
            vec![0.0, 1.0, 0.0],
            vec![-1.0, 0.0, 0.0],
            vec![-0.6, 0.8, 0.0],
            vec![0.0, 0.0, 1.0],
        ];

        let mut profile = vec![1.0, 0.0, 0.0];
        for step in 0..200 {
            let direction = &directions[step % directions.len()];
            let weight = if step % 3 == 0 { 0.9 } else { -0.9 };
            let next = engine.apply(&profile, direction, weight).unwrap();
            let shift = vector::angular_distance(&profile, &next).unwrap();
            assert!(shift <= limit, "step {step} moved {shift} rad");
            assert!(vector::is_unit(&next, 1e-6));
            profile = next;
        }
    }

    #[test]
    fn test_repeated_event_is_bounded_perturbation() {
        let engine = UpdateEngine::default();
        let profile = [0.6, 0.8];
        for (direction, weight) in [([-0.8, 0.6], 0.10), ([0.6, 0.8], -0.15), ([0.0, 1.0], -0.08)] {
            let once = engine.apply(&profile, &direction, weight).unwrap();
            let twice = engine.apply(&once, &direction, weight).unwrap();
            let similarity = vector::cosine_similarity(&once, &twice).unwrap();
            assert!(similarity > 0.95);
        }
    }

    #[tokio::test]
    async fn test_too_superficial_matches_not_relevant_at_same_weight() {
        let engine = UpdateEngine::default();
        let classifier = FeedbackClassifier::default();
        let profile = [0.6, 0.8];
        let item = [1.0, 0.0];

        let instruction = classifier
            .classify("c", FeedbackType::TooSuperficial, &item, Some(item.as_slice()))
            .unwrap();
        let UpdateInstruction::Shift {
            direction, weight, ..
        } = &instruction
        else {
            panic!("expected a shift");
        };

        let graded = engine.apply(&profile, direction, *weight).unwrap();
        let plain = engine.apply(&profile, &item, -0.08).unwrap();
        for (g, p) in graded.iter().zip(plain.iter()) {
            assert!((g - p).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_apply_to_store_updates_version() {
        let store = InMemoryProfileStore::new();
        store.initialize("u1", &[1.0, 0.0]).await.unwrap();

        let engine = UpdateEngine::default();
        let instruction = UpdateInstruction::Shift {
            direction: vec![0.0, 1.0],
            weight: 0.10,
            strategy: UpdateStrategy::FullItem,
        };

        let outcome = engine.apply_to_store(&store, "u1", &instruction).await.unwrap();
        let UpdateOutcome::Updated { profile, .. } = outcome else {
            panic!("expected an update");
        };
        assert_eq!(profile.version, 2);
        assert!((profile.values[1] - 0.0995).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_apply_to_store_noop() {
        let store = InMemoryProfileStore::new();
        store.initialize("u1", &[1.0, 0.0]).await.unwrap();
        let outcome = UpdateEngine::default()
            .apply_to_store(
                &store,
                "u1",
                &UpdateInstruction::NoUpdate {
                    feedback_type: FeedbackType::NotNow,
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Unchanged);
        assert_eq!(store.read("u1").await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_apply_to_store_unknown_user() {
        let store = InMemoryProfileStore::new();
        let instruction = UpdateInstruction::Shift {
            direction: vec![0.0, 1.0],
            weight: 0.10,
            strategy: UpdateStrategy::FullItem,
        };
        let err = UpdateEngine::default()
            .apply_to_store(&store, "nobody", &instruction)
            .await
            .unwrap_err();
        assert!(matches!(err, RankingError::ProfileNotFound(_)));
        assert!(!err.is_transient());
    }

    /// Store that reports a conflict for the first `conflicts` writes.
    struct ContendedStore {
        inner: InMemoryProfileStore,
        conflicts: AtomicU32,
    }

    #[async_trait]
    impl ProfileStore for ContendedStore {
        async fn read(&self, user_id: &str) -> Result<Option<ProfileVector>> {
            self.inner.read(user_id).await
        }

        async fn write(
            &self,
            user_id: &str,
            values: Embedding,
            expected_previous: &ProfileVector,
        ) -> Result<WriteOutcome> {
            if self.conflicts.load(Ordering::SeqCst) > 0 {
                self.conflicts.fetch_sub(1, Ordering::SeqCst);
                return Ok(WriteOutcome::Conflict);
            }
            self.inner.write(user_id, values, expected_previous).await
        }
    }

    #[tokio::test]
    async fn test_conflicts_are_retried_then_reported() {
        let instruction = UpdateInstruction::Shift {
            direction: vec![0.0, 1.0],
            weight: 0.10,
            strategy: UpdateStrategy::FullItem,
        };

        let store = ContendedStore {
            inner: InMemoryProfileStore::new(),
            conflicts: AtomicU32::new(2),
        };
        store.inner.initialize("u1", &[1.0, 0.0]).await.unwrap();
        let engine = UpdateEngine::default().with_max_write_attempts(3);
        assert!(matches!(
            engine.apply_to_store(&store, "u1", &instruction).await.unwrap(),
            UpdateOutcome::Updated { .. }
        ));

        store.conflicts.store(5, Ordering::SeqCst);
        let err = engine
            .apply_to_store(&store, "u1", &instruction)
            .await
            .unwrap_err();
        assert!(matches!(err, RankingError::WriteConflict { attempts: 3, .. }));
        assert!(err.is_transient());
    }
}
